mod cli;
mod error;
mod pipeline;
mod run_context;
mod vbi;
mod video;

#[cfg(test)]
mod testing;

use cli::Args;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let args = Args::parse_args();

    // stdout may carry the output TBC, so logs go to stderr
    let level = if args.debug {
        tracing::Level::DEBUG
    } else if args.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run_context::run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
