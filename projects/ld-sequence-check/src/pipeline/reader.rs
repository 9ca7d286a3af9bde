// Input side of the sequencing pool: hands out overlapping batches of frames
//
// Fields are read in ascending sequence order, exactly once, so piped input
// works. The last frame of every batch is kept as a probe for the next one.

use super::types::{Batch, Field, FrameProbe, ProcessingState, SourceFrame};
use crate::error::{PipelineError, PipelineResult};
use crate::video::metadata::LdDecodeMetadata;
use crate::video::FieldSource;
use std::sync::Arc;
use std::time::Instant;

/// Frames spanned by one batch, counting the overlap frame.
pub const BATCH_FRAMES: usize = 5;
/// Frames the input cursor moves per batch.
pub const BATCH_STRIDE: usize = BATCH_FRAMES - 1;

/// One capture of the disc: its sidecar and its field store.
pub struct SourceInput {
    pub metadata: Arc<LdDecodeMetadata>,
    pub reader: Box<dyn FieldSource>,
}

pub struct InputState {
    /// Primary source first; the rest only fill padded fields.
    sources: Vec<SourceInput>,
    next_input_frame: usize,
    frame_count: usize,
    next_ticket: usize,
    reference: Option<FrameProbe>,
    reverse: bool,
}

impl InputState {
    pub fn new(sources: Vec<SourceInput>, frame_count: usize, reverse: bool) -> Self {
        Self {
            sources,
            next_input_frame: 1,
            frame_count,
            next_ticket: 0,
            reference: None,
            reverse,
        }
    }

    /// Claims the next batch, or `None` once only the overlap frame (or
    /// nothing) is left.
    pub fn claim_next_batch(&mut self, state: &ProcessingState) -> PipelineResult<Option<Batch>> {
        let start = self.next_input_frame;
        let first_batch = self.next_ticket == 0;
        if start > self.frame_count || (!first_batch && start >= self.frame_count) {
            return Ok(None);
        }

        let start_inst = Instant::now();
        let end = (start + BATCH_FRAMES - 1).min(self.frame_count);
        let first_owned = if first_batch { start } else { start + 1 };
        let frames = (first_owned..=end)
            .map(|number| self.read_frame(number))
            .collect::<PipelineResult<Vec<_>>>()?;
        state.update_stage("read", frames.len(), start_inst.elapsed());

        let reference = self.reference.take();
        self.reference = frames.last().map(FrameProbe::of);
        self.next_input_frame += BATCH_STRIDE;
        let ticket = self.next_ticket;
        self.next_ticket += 1;

        tracing::debug!(
            "Batch {}: frames {}..={} (reference {:?})",
            ticket,
            first_owned,
            end,
            reference.as_ref().map(|r| r.number)
        );

        Ok(Some(Batch {
            ticket,
            reference,
            frames,
        }))
    }

    fn primary(&self) -> &LdDecodeMetadata {
        &self.sources[0].metadata
    }

    fn read_frame(&mut self, number: usize) -> PipelineResult<SourceFrame> {
        let (first_seq, second_seq) = self
            .primary()
            .frame_fields(number, self.reverse)
            .ok_or_else(|| {
                PipelineError::configuration(format!("Frame {} has no field records", number))
            })?;

        // Lower sequence number first keeps the reads sequential
        let (first, second) = if first_seq < second_seq {
            let first = self.read_field(first_seq)?;
            (first, self.read_field(second_seq)?)
        } else {
            let second = self.read_field(second_seq)?;
            (self.read_field(first_seq)?, second)
        };

        Ok(SourceFrame {
            number,
            first,
            second,
        })
    }

    /// Reads a field from the primary, or from the first secondary source
    /// with real data when the primary field is padding.
    fn read_field(&mut self, seq_no: usize) -> PipelineResult<Field> {
        let metadata = self
            .primary()
            .field(seq_no)
            .cloned()
            .ok_or_else(|| {
                PipelineError::configuration(format!("Field {} has no metadata record", seq_no))
            })?;

        if metadata.pad {
            for (index, source) in self.sources.iter_mut().enumerate().skip(1) {
                let Some(candidate) = source.metadata.field(seq_no) else {
                    continue;
                };
                if candidate.pad || seq_no > source.reader.field_count() {
                    continue;
                }
                let mut metadata = candidate.clone();
                metadata.seq_no = seq_no;
                tracing::debug!("Field {} is padded, using source #{}", seq_no, index);
                return Ok(Field {
                    seq_no,
                    samples: source.reader.read_field(seq_no)?,
                    metadata,
                });
            }
        }

        Ok(Field {
            seq_no,
            samples: self.sources[0].reader.read_field(seq_no)?,
            metadata,
        })
    }
}
