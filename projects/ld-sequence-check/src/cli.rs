use clap::Parser;
use std::path::PathBuf;

/// Re-stamps laserdisc TBC captures with a continuous VBI timecode, detecting
/// repeated and skipped frames from the chroma burst phase.
#[derive(Parser, Debug)]
#[command(name = "ld-sequence-check", author, version, about, long_about = None)]
pub struct Args {
    /// Input TBC files followed by the output TBC file (- for piped I/O)
    #[arg(required = true, num_args = 2.., value_name = "INPUTS... OUTPUT")]
    pub files: Vec<String>,

    /// Input JSON file for the first input (default: <input>.json)
    #[arg(long, value_name = "FILE")]
    pub input_json: Option<PathBuf>,

    /// Output JSON file (default: <output>.json)
    #[arg(long, value_name = "FILE")]
    pub output_json: Option<PathBuf>,

    /// Expect second/first field order instead of first/second
    #[arg(short, long)]
    pub reverse: bool,

    /// Encode CAV picture numbers instead of CLV programme time
    #[arg(long)]
    pub cav: bool,

    /// Disable chroma phase analysis (number frames sequentially)
    #[arg(long)]
    pub no_phase: bool,

    /// Blank existing VBI data before encoding
    #[arg(long)]
    pub blank: bool,

    /// Offset added to every frame number before encoding
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    pub offset: i64,

    /// Number of sequencer threads (default: logical CPU count)
    #[arg(
        short,
        long,
        env = "LD_SEQUENCE_CHECK_THREADS",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub threads: Option<u32>,

    /// Show debug output
    #[arg(short, long, conflicts_with = "quiet")]
    pub debug: bool,

    /// Only show warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Every positional except the last.
    pub fn inputs(&self) -> &[String] {
        &self.files[..self.files.len().saturating_sub(1)]
    }

    pub fn output(&self) -> &str {
        self.files.last().map(String::as_str).unwrap_or("-")
    }
}
