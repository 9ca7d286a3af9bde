// Sequencer worker: claims batches, numbers them, stamps the timecode and
// hands the frames back to the pool.

use super::analyzer::{FrameObservation, SequenceAnalyzer, Step};
use super::orchestrator::SequencingPool;
use super::phase::{classify, PhaseState};
use super::types::{Batch, PendingOutputFrame, SourceFrame};
use crate::error::PipelineResult;
use crate::vbi::{self, TimecodeMode, VbiCodeword};
use crate::video::metadata::{VideoParameters, VideoSystem};
use std::sync::atomic::Ordering;
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct StampSettings {
    pub mode: TimecodeMode,
    pub system: VideoSystem,
    pub blank_vbi: bool,
    pub frame_offset: i64,
}

/// Worker thread body. An error other than an abort raised elsewhere aborts
/// the whole pool.
pub fn sequencer_worker(id: usize, pool: &SequencingPool) -> PipelineResult<()> {
    let state = pool.state();
    state.active_workers.fetch_add(1, Ordering::Relaxed);
    tracing::debug!("Sequencer {} started", id);

    let result = run(pool);

    state.active_workers.fetch_sub(1, Ordering::Relaxed);
    match &result {
        Ok(()) => tracing::debug!("Sequencer {} finished gracefully", id),
        Err(e) if e.is_abort() => tracing::debug!("Sequencer {} stopped by abort", id),
        Err(e) => {
            tracing::error!("Sequencer {} failed: {}", id, e);
            pool.abort(e.to_string());
        }
    }
    result
}

fn run(pool: &SequencingPool) -> PipelineResult<()> {
    let analyzer = SequenceAnalyzer::new(pool.system(), pool.config().phase_check);
    let settings = pool.stamp_settings();

    while !pool.state().is_aborted() {
        let Some(batch) = pool.claim_next_batch()? else {
            break;
        };
        process_batch(pool, &analyzer, &settings, batch)?;
    }
    Ok(())
}

fn process_batch(
    pool: &SequencingPool,
    analyzer: &SequenceAnalyzer,
    settings: &StampSettings,
    batch: Batch,
) -> PipelineResult<()> {
    let state = pool.state();
    let params = pool.params();
    let phase_check = pool.config().phase_check;
    let Batch {
        ticket,
        reference,
        frames,
    } = batch;

    let start_inst = Instant::now();
    let observe = |samples: &[u16], padded: bool| FrameObservation {
        phase: if phase_check && !padded {
            classify(samples, settings.system, params)
        } else {
            PhaseState::UNDETERMINED
        },
        padded,
    };
    let reference = reference.map(|probe| observe(&probe.samples, probe.padded));
    let observations: Vec<FrameObservation> = frames
        .iter()
        .map(|frame| {
            observe(
                &frame.first.samples,
                frame.first.is_padded() || frame.second.is_padded(),
            )
        })
        .collect();

    let assignments = pool.sequence_batch(ticket, |running| {
        analyzer.assign(reference.as_ref(), &observations, running)
    })?;
    state.update_stage("analyze", frames.len(), start_inst.elapsed());

    for ((frame, assignment), observation) in
        frames.into_iter().zip(assignments).zip(&observations)
    {
        match assignment.step {
            Step::Repeat => {
                state.repeated_frames.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "Frame {} (phase {}) repeats number {}",
                    frame.number,
                    observation.phase.value(),
                    assignment.number
                );
            }
            Step::Dropped(missing) => {
                state
                    .dropped_frames
                    .fetch_add(usize::from(missing), Ordering::Relaxed);
                tracing::debug!(
                    "Frame {} (phase {}): {} frame(s) missing before number {}",
                    frame.number,
                    observation.phase.value(),
                    missing,
                    assignment.number
                );
            }
            Step::Advance | Step::Undetermined => {}
        }

        let start_inst = Instant::now();
        let SourceFrame {
            number,
            mut first,
            mut second,
        } = frame;
        let codeword = stamp_frame(
            [&mut first.samples, &mut second.samples],
            assignment.number,
            settings,
            params,
        );
        state.update_stage("encode", 1, start_inst.elapsed());

        pool.submit_frame(
            number,
            PendingOutputFrame {
                first,
                second,
                corrected_number: assignment.number,
                codeword,
            },
        )?;
    }
    Ok(())
}

/// Blanks (when enabled) and encodes the timecode for `number` into both
/// fields. Codec failures are logged and leave both fields as they were.
pub fn stamp_frame(
    fields: [&mut Vec<u16>; 2],
    number: i64,
    settings: &StampSettings,
    params: &VideoParameters,
) -> Option<VbiCodeword> {
    let value = number + settings.frame_offset;
    let codeword = match vbi::build(value, settings.mode, settings.system) {
        Ok(codeword) => codeword,
        Err(e) => {
            tracing::warn!("Frame number {}: {}; VBI left untouched", number, e);
            return None;
        }
    };

    for field in &fields {
        let fits = vbi::check_fits(field.len(), settings.system, settings.blank_vbi, params);
        if let Err(e) = fits {
            tracing::warn!("Frame number {}: {}; VBI left untouched", number, e);
            return None;
        }
    }

    for field in fields {
        if settings.blank_vbi {
            if let Err(e) = vbi::blank(field, settings.system, params) {
                tracing::warn!("Frame number {}: {}", number, e);
                return None;
            }
        }
        if let Err(e) = vbi::modulate(field, &codeword, settings.mode, params) {
            tracing::warn!("Frame number {}: {}", number, e);
            return None;
        }
    }
    Some(codeword)
}
