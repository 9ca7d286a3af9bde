// Resolves command-line arguments into opened sources, a sink and a pool
// configuration, then runs the pool.

use crate::cli::Args;
use crate::pipeline::orchestrator::{PoolConfig, SequencingPool};
use crate::vbi::TimecodeMode;
use crate::video::metadata::LdDecodeMetadata;
use crate::video::tbc_reader::TbcReader;
use crate::video::tbc_writer::TbcWriter;
use crate::video::{FieldSink, FieldSource};
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const MAX_INPUTS: usize = 32;
const PIPE: &str = "-";

/// Rejects argument combinations that cannot work before anything is opened.
pub fn validate(args: &Args) -> Result<()> {
    let inputs = args.inputs();
    let output = args.output();

    if inputs.is_empty() {
        bail!("At least one input and one output TBC file are required");
    }
    if inputs.len() > MAX_INPUTS {
        bail!("A maximum of {} input TBC files are supported", MAX_INPUTS);
    }
    if inputs[0] == PIPE && args.input_json.is_none() {
        bail!("With piped input, the input JSON file must be given with --input-json");
    }
    if inputs.iter().skip(1).any(|input| input == PIPE) {
        bail!("Only the first input can be piped");
    }
    if output == PIPE && args.output_json.is_none() {
        bail!("With piped output, the output JSON file must be given with --output-json");
    }
    if inputs.iter().any(|input| input == output) {
        bail!("Input and output files cannot have the same filename");
    }
    let mut seen = HashSet::new();
    if !inputs.iter().all(|input| seen.insert(input)) {
        bail!("Each input file should only be given once");
    }
    if output != PIPE && Path::new(output).exists() {
        bail!("Output file {} already exists, will not overwrite", output);
    }
    Ok(())
}

/// JSON sidecar of input `index`.
pub fn metadata_path(args: &Args, index: usize) -> PathBuf {
    match (&args.input_json, index) {
        (Some(path), 0) => path.clone(),
        _ => PathBuf::from(format!("{}.json", args.inputs()[index])),
    }
}

pub fn output_metadata_path(args: &Args) -> PathBuf {
    args.output_json
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.json", args.output())))
}

pub fn load_metadata(args: &Args) -> Result<Vec<LdDecodeMetadata>> {
    (0..args.inputs().len())
        .map(|index| {
            let path = metadata_path(args, index);
            tracing::info!("Reading input #{} JSON metadata from {:?}", index, path);
            LdDecodeMetadata::read(&path)
                .with_context(|| format!("Unable to read metadata for input #{}", index))
        })
        .collect()
}

pub fn open_sources(
    args: &Args,
    metadata: &[LdDecodeMetadata],
) -> Result<Vec<Box<dyn FieldSource>>> {
    args.inputs()
        .iter()
        .zip(metadata)
        .enumerate()
        .map(|(index, (input, metadata))| {
            let params = metadata.video_parameters();
            tracing::info!(
                "Opening input #{}: {}x{} - {}",
                index,
                params.field_width,
                params.field_height,
                input
            );
            let reader = TbcReader::open(input, params.field_length(), metadata.field_count())
                .with_context(|| format!("Unable to open input #{} ({})", index, input))?;
            Ok(Box::new(reader) as Box<dyn FieldSource>)
        })
        .collect()
}

pub fn open_sink(args: &Args) -> Result<Box<dyn FieldSink>> {
    let writer = TbcWriter::create(args.output())
        .with_context(|| format!("Unable to create output {}", args.output()))?;
    Ok(Box::new(writer))
}

pub fn pool_config(args: &Args) -> PoolConfig {
    let threads = args.threads.map(|t| t as usize).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    });

    PoolConfig {
        threads,
        mode: if args.cav {
            TimecodeMode::Cav
        } else {
            TimecodeMode::Clv
        },
        phase_check: !args.no_phase,
        blank_vbi: args.blank,
        frame_offset: args.offset,
        reverse_field_order: args.reverse,
        output_json: Some(output_metadata_path(args)),
        show_progress: !args.quiet && args.output() != PIPE,
    }
}

pub fn run(args: &Args) -> Result<()> {
    validate(args)?;

    let metadata = load_metadata(args)?;
    if args.reverse {
        tracing::info!("Expected field order is reversed to second field/first field");
    }
    let sources = open_sources(args, &metadata)?;
    let config = pool_config(args);

    // The output is only created once the sources are known to fit together
    SequencingPool::check_sources(&config, &metadata, &sources)
        .context("Input sources cannot be processed together")?;
    let sink = open_sink(args)?;

    let pool = SequencingPool::new(config, metadata, sources, sink)
        .context("Input sources cannot be processed together")?;
    pool.process().context("Sequencing failed")?;
    Ok(())
}
