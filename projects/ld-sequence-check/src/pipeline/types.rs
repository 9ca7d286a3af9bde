use crate::vbi::VbiCodeword;
use crate::video::metadata::FieldMetadata;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Stage names, in pipeline order.
pub const STAGES: [&str; 4] = ["read", "analyze", "encode", "write"];

#[derive(Debug, Clone, Default)]
pub struct StageProgress {
    pub current: usize,
    pub ms_per_frame: f64,
}

/// State shared by every sequencer worker
#[derive(Debug)]
pub struct ProcessingState {
    pub total_frames: usize,
    aborted: AtomicBool,
    pub error: RwLock<Option<String>>,
    /// Progress per stage (see [`STAGES`])
    pub stages: RwLock<BTreeMap<&'static str, StageProgress>>,
    pub active_workers: AtomicUsize,
    pub repeated_frames: AtomicUsize,
    pub dropped_frames: AtomicUsize,
    pub start_time: Instant,
}

impl ProcessingState {
    pub fn new(total_frames: usize) -> Self {
        let stages = STAGES
            .iter()
            .map(|&stage| (stage, StageProgress::default()))
            .collect();

        Self {
            total_frames,
            aborted: AtomicBool::new(false),
            error: RwLock::new(None),
            stages: RwLock::new(stages),
            active_workers: AtomicUsize::new(0),
            repeated_frames: AtomicUsize::new(0),
            dropped_frames: AtomicUsize::new(0),
            start_time: Instant::now(),
        }
    }

    /// Adds `frames` to a stage counter and folds the per-frame time into its
    /// moving average.
    pub fn update_stage(&self, stage: &str, frames: usize, elapsed: Duration) {
        if frames == 0 {
            return;
        }
        let ms_per_frame = elapsed.as_secs_f64() * 1000.0 / frames as f64;
        if let Ok(mut stages) = self.stages.write() {
            if let Some(progress) = stages.get_mut(stage) {
                progress.current += frames;
                // Simple exponential moving average for smoothing durations
                if progress.ms_per_frame == 0.0 {
                    progress.ms_per_frame = ms_per_frame;
                } else {
                    progress.ms_per_frame = progress.ms_per_frame * 0.9 + ms_per_frame * 0.1;
                }
            }
        }
    }

    /// Raises the abort flag. Only the first reason is kept.
    pub fn abort(&self, reason: impl Into<String>) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            let reason = reason.into();
            tracing::error!("Aborting: {}", reason);
            if let Ok(mut error) = self.error.write() {
                *error = Some(reason);
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn error(&self) -> Option<String> {
        self.error.read().ok().and_then(|e| e.clone())
    }

    /// One line per stage: frames handled and smoothed cost.
    pub fn stage_summary(&self) -> Vec<String> {
        let Ok(stages) = self.stages.read() else {
            return Vec::new();
        };
        STAGES
            .iter()
            .filter_map(|&name| stages.get(name).map(|p| (name, p)))
            .map(|(name, p)| {
                let fps = if p.ms_per_frame > 0.0 {
                    1000.0 / p.ms_per_frame
                } else {
                    0.0
                };
                format!(
                    "{:>8}: {:>7} frames, {:8.3} ms/frame ({:.1} fps)",
                    name, p.current, p.ms_per_frame, fps
                )
            })
            .collect()
    }

    pub fn stats(&self) -> ProcessingStats {
        let written_frames = self
            .stages
            .read()
            .ok()
            .and_then(|s| s.get("write").map(|p| p.current))
            .unwrap_or(0);
        ProcessingStats {
            written_frames,
            repeated_frames: self.repeated_frames.load(Ordering::Relaxed),
            dropped_frames: self.dropped_frames.load(Ordering::Relaxed),
            duration: self.start_time.elapsed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingStats {
    pub written_frames: usize,
    pub repeated_frames: usize,
    pub dropped_frames: usize,
    pub duration: Duration,
}

impl ProcessingStats {
    pub fn frames_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.written_frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// One source field, moved from the reader to the output sink.
#[derive(Debug, Clone)]
pub struct Field {
    pub seq_no: usize,
    pub samples: Vec<u16>,
    pub metadata: FieldMetadata,
}

impl Field {
    pub fn is_padded(&self) -> bool {
        self.metadata.pad
    }
}

/// A frame as claimed from the input, `number` being its 1-based position.
#[derive(Debug)]
pub struct SourceFrame {
    pub number: usize,
    pub first: Field,
    pub second: Field,
}

/// What a batch keeps of the frame just before it: enough to compare phase.
#[derive(Debug, Clone)]
pub struct FrameProbe {
    pub number: usize,
    pub samples: Vec<u16>,
    pub padded: bool,
}

impl FrameProbe {
    pub fn of(frame: &SourceFrame) -> Self {
        Self {
            number: frame.number,
            samples: frame.first.samples.clone(),
            padded: frame.first.is_padded() || frame.second.is_padded(),
        }
    }
}

/// A run of consecutive frames handed to one worker.
#[derive(Debug)]
pub struct Batch {
    /// Claim order, used to serialise numbering.
    pub ticket: usize,
    /// Last frame of the previous batch; `None` only for the first batch.
    pub reference: Option<FrameProbe>,
    pub frames: Vec<SourceFrame>,
}

/// A processed frame waiting in the reorder buffer.
#[derive(Debug)]
pub struct PendingOutputFrame {
    pub first: Field,
    pub second: Field,
    pub corrected_number: i64,
    pub codeword: Option<VbiCodeword>,
}
