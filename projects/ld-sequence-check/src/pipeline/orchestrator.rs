// Sequencing pool: owns the input cursor, the running number, the ordering
// handshake and the reorder buffer, and drives the worker threads.

use super::finalize::OutputState;
use super::handshake::OrderingRing;
use super::reader::{InputState, SourceInput};
use super::sequencer::{sequencer_worker, StampSettings};
use super::types::{Batch, PendingOutputFrame, ProcessingState, ProcessingStats};
use crate::error::{PipelineError, PipelineResult};
use crate::vbi::TimecodeMode;
use crate::video::metadata::{LdDecodeMetadata, VideoParameters, VideoSystem};
use crate::video::{FieldSink, FieldSource};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub threads: usize,
    pub mode: TimecodeMode,
    pub phase_check: bool,
    pub blank_vbi: bool,
    /// Added to every corrected number before encoding.
    pub frame_offset: i64,
    pub reverse_field_order: bool,
    pub output_json: Option<PathBuf>,
    pub show_progress: bool,
}

pub struct SequencingPool {
    config: PoolConfig,
    system: VideoSystem,
    primary: Arc<LdDecodeMetadata>,
    input: Mutex<InputState>,
    output: Mutex<OutputState>,
    /// One past the last corrected number handed out.
    running: Mutex<i64>,
    ordering: OrderingRing,
    state: Arc<ProcessingState>,
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> PipelineResult<MutexGuard<'a, T>> {
    mutex
        .lock()
        .map_err(|_| PipelineError::ordering(format!("{} lock poisoned", what)))
}

impl SequencingPool {
    /// Checks that the sources can be processed together and returns their
    /// video system. `metadata[i]` describes `sources[i]`; index 0 is the
    /// primary. Nothing is opened or written.
    pub fn check_sources(
        config: &PoolConfig,
        metadata: &[LdDecodeMetadata],
        sources: &[Box<dyn FieldSource>],
    ) -> PipelineResult<VideoSystem> {
        if sources.is_empty() || metadata.is_empty() {
            return Err(PipelineError::configuration("No input sources"));
        }
        if sources.len() != metadata.len() {
            return Err(PipelineError::configuration(format!(
                "{} sources but {} metadata files",
                sources.len(),
                metadata.len()
            )));
        }
        if config.threads == 0 {
            return Err(PipelineError::configuration("Thread count must be at least 1"));
        }

        let primary_params = metadata[0].video_parameters();
        let system = primary_params.video_system()?;
        for (index, other) in metadata.iter().enumerate().skip(1) {
            let params = other.video_parameters();
            if params.video_system()? != system {
                return Err(PipelineError::configuration(format!(
                    "Source #{} is not {} like the primary source",
                    index,
                    system.description()
                )));
            }
            if params.field_length() != primary_params.field_length() {
                return Err(PipelineError::configuration(format!(
                    "Source #{} has {} samples per field, the primary has {}",
                    index,
                    params.field_length(),
                    primary_params.field_length()
                )));
            }
        }
        Ok(system)
    }

    /// Runs [`Self::check_sources`], then sets up the pool.
    pub fn new(
        config: PoolConfig,
        metadata: Vec<LdDecodeMetadata>,
        sources: Vec<Box<dyn FieldSource>>,
        sink: Box<dyn FieldSink>,
    ) -> PipelineResult<Self> {
        let system = Self::check_sources(&config, &metadata, &sources)?;

        let json_fields = metadata[0].field_count();
        let tbc_fields = sources[0].field_count();
        if json_fields != tbc_fields {
            tracing::warn!(
                "Primary metadata lists {} fields but the TBC holds {}; some fields will be ignored",
                json_fields,
                tbc_fields
            );
        }
        let frame_count = metadata[0].frame_count().min(tbc_fields / 2);

        let inputs: Vec<SourceInput> = metadata
            .into_iter()
            .zip(sources)
            .map(|(metadata, reader)| SourceInput {
                metadata: Arc::new(metadata),
                reader,
            })
            .collect();
        let primary = inputs[0].metadata.clone();

        tracing::info!(
            "{} source(s), {} frames, {} {} timecode, phase check {}",
            inputs.len(),
            frame_count,
            system.description(),
            config.mode.name(),
            if config.phase_check { "on" } else { "off" }
        );

        Ok(Self {
            system,
            primary,
            input: Mutex::new(InputState::new(
                inputs,
                frame_count,
                config.reverse_field_order,
            )),
            output: Mutex::new(OutputState::new(sink, frame_count, config.show_progress)),
            running: Mutex::new(1),
            ordering: OrderingRing::new(config.threads),
            state: Arc::new(ProcessingState::new(frame_count)),
            config,
        })
    }

    pub fn state(&self) -> &Arc<ProcessingState> {
        &self.state
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn system(&self) -> VideoSystem {
        self.system
    }

    pub fn params(&self) -> &VideoParameters {
        self.primary.video_parameters()
    }

    pub fn stamp_settings(&self) -> StampSettings {
        StampSettings {
            mode: self.config.mode,
            system: self.system,
            blank_vbi: self.config.blank_vbi,
            frame_offset: self.config.frame_offset,
        }
    }

    pub fn abort(&self, reason: impl Into<String>) {
        self.state.abort(reason);
    }

    pub fn claim_next_batch(&self) -> PipelineResult<Option<Batch>> {
        lock(&self.input, "input")?.claim_next_batch(&self.state)
    }

    pub fn running_number(&self) -> PipelineResult<i64> {
        Ok(*lock(&self.running, "running number")?)
    }

    pub fn set_running_number(&self, value: i64) -> PipelineResult<()> {
        *lock(&self.running, "running number")? = value;
        Ok(())
    }

    /// Runs `analyze` against the running number once every earlier batch
    /// has done so, then lets the next batch through.
    pub fn sequence_batch<R>(
        &self,
        ticket: usize,
        analyze: impl FnOnce(&mut i64) -> R,
    ) -> PipelineResult<R> {
        self.ordering.wait_for_predecessor(ticket, &self.state)?;
        let mut running = self.running_number()?;
        let result = analyze(&mut running);
        self.set_running_number(running)?;
        self.ordering.publish(ticket)?;
        Ok(result)
    }

    /// Hands a finished frame to the reorder buffer. Any failure other than
    /// an abort raised elsewhere aborts the pool.
    pub fn submit_frame(&self, position: usize, frame: PendingOutputFrame) -> PipelineResult<()> {
        let result = lock(&self.output, "output")
            .and_then(|mut output| output.submit(position, frame, &self.state));
        if let Err(e) = &result {
            if !e.is_abort() {
                self.abort(e.to_string());
            }
        }
        result
    }

    /// Runs the workers to completion, then flushes the output and writes the
    /// corrected metadata.
    pub fn process(self) -> PipelineResult<ProcessingStats> {
        let threads = self.config.threads;
        tracing::info!("Starting {} sequencer threads", threads);

        let pool = &self;
        let results = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(threads);
            for id in 0..threads {
                let spawned = thread::Builder::new()
                    .name(format!("sequencer-{}", id))
                    .spawn_scoped(scope, move || sequencer_worker(id, pool));
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        pool.abort("could not start sequencer thread");
                        return Err(PipelineError::io("spawning sequencer thread", e));
                    }
                }
            }
            Ok(handles
                .into_iter()
                .map(|handle| {
                    handle.join().unwrap_or_else(|_| {
                        Err(PipelineError::ordering("sequencer thread panicked"))
                    })
                })
                .collect::<Vec<_>>())
        })?;

        if self.state.is_aborted() {
            let cause = results
                .into_iter()
                .filter_map(Result::err)
                .find(|e| !e.is_abort());
            if let Some(reason) = self.state.error() {
                tracing::error!("Sequencing failed: {}", reason);
            }
            return Err(cause.unwrap_or(PipelineError::Aborted));
        }

        let mut output = lock(&self.output, "output")?;
        output.finish()?;

        let stats = self.state.stats();
        tracing::info!(
            "Wrote {} frames in {:.1}s ({:.1} fps): {} repeated, {} dropped",
            stats.written_frames,
            stats.duration.as_secs_f64(),
            stats.frames_per_second(),
            stats.repeated_frames,
            stats.dropped_frames
        );
        for line in self.state.stage_summary() {
            tracing::info!("{}", line);
        }

        if let Some(path) = &self.config.output_json {
            output.corrected_metadata(&self.primary).write(path)?;
            tracing::info!("Wrote corrected metadata to {:?}", path);
        }

        Ok(stats)
    }
}
