// Output side of the sequencing pool: reorder buffer, field writes and the
// corrected metadata record.

use super::types::{Field, PendingOutputFrame, ProcessingState};
use crate::error::{PipelineError, PipelineResult};
use crate::video::metadata::{FieldMetadata, LdDecodeMetadata, Vbi};
use crate::video::FieldSink;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::time::Instant;

const LOG_INTERVAL: usize = 100;

pub struct OutputState {
    /// Input position of the next frame to write.
    next_output_frame: usize,
    pending: BTreeMap<usize, PendingOutputFrame>,
    sink: Box<dyn FieldSink>,
    /// Metadata of every written field, in output order.
    written_fields: Vec<FieldMetadata>,
    pb: ProgressBar,
}

impl OutputState {
    pub fn new(sink: Box<dyn FieldSink>, total_frames: usize, show_progress: bool) -> Self {
        let pb = if show_progress {
            let pb = ProgressBar::new(total_frames as u64);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec:.1.yellow}, {eta})",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        } else {
            ProgressBar::hidden()
        };

        Self {
            next_output_frame: 1,
            pending: BTreeMap::new(),
            sink,
            written_fields: Vec::with_capacity(total_frames * 2),
            pb,
        }
    }

    /// Queues the frame at input position `position` and writes every frame
    /// that is now contiguous with the output.
    pub fn submit(
        &mut self,
        position: usize,
        frame: PendingOutputFrame,
        state: &ProcessingState,
    ) -> PipelineResult<()> {
        if state.is_aborted() {
            return Err(PipelineError::Aborted);
        }
        if position < self.next_output_frame || self.pending.contains_key(&position) {
            return Err(PipelineError::ordering(format!(
                "frame {} submitted twice",
                position
            )));
        }
        self.pending.insert(position, frame);

        while let Some(frame) = self.pending.remove(&self.next_output_frame) {
            let start_inst = Instant::now();
            self.write_frame(frame, state)?;
            state.update_stage("write", 1, start_inst.elapsed());

            self.pb.inc(1);
            if self.next_output_frame % LOG_INTERVAL == 0 {
                tracing::info!(
                    "Wrote {} of {} frames ({} sequencers active)",
                    self.next_output_frame,
                    state.total_frames,
                    state.active_workers.load(Ordering::Relaxed)
                );
            }
            self.next_output_frame += 1;
        }
        Ok(())
    }

    fn write_frame(
        &mut self,
        frame: PendingOutputFrame,
        state: &ProcessingState,
    ) -> PipelineResult<()> {
        let PendingOutputFrame {
            first,
            second,
            corrected_number,
            codeword,
        } = frame;
        tracing::debug!(
            "Writing frame {} as {} (fields {}/{})",
            self.next_output_frame,
            corrected_number,
            first.seq_no,
            second.seq_no
        );

        let (earlier, later) = if first.seq_no <= second.seq_no {
            (first, second)
        } else {
            (second, first)
        };
        let vbi_data: Option<Vec<i64>> =
            codeword.map(|c| c.words().iter().map(|&w| i64::from(w)).collect());

        // A frame is written whole or not at all
        if state.is_aborted() {
            return Err(PipelineError::Aborted);
        }
        for field in [earlier, later] {
            self.sink.write_field(&field.samples)?;
            self.record(field, vbi_data.clone());
        }
        Ok(())
    }

    fn record(&mut self, field: Field, vbi_data: Option<Vec<i64>>) {
        let mut metadata = field.metadata;
        if let Some(vbi_data) = vbi_data {
            metadata.vbi.get_or_insert_with(Vbi::default).vbi_data = vbi_data;
        }
        self.written_fields.push(metadata);
    }

    /// Flushes the sink. Frames still waiting behind a gap are reported and
    /// dropped.
    pub fn finish(&mut self) -> PipelineResult<()> {
        if !self.pending.is_empty() {
            tracing::warn!(
                "{} frames never became contiguous with the output and were dropped",
                self.pending.len()
            );
            self.pending.clear();
        }
        self.pb.finish_and_clear();
        self.sink.finish()
    }

    /// The primary metadata rewritten to describe the output stream.
    pub fn corrected_metadata(&self, primary: &LdDecodeMetadata) -> LdDecodeMetadata {
        let mut metadata = primary.clone();
        metadata.fields = self
            .written_fields
            .iter()
            .enumerate()
            .map(|(index, field)| FieldMetadata {
                seq_no: index + 1,
                ..field.clone()
            })
            .collect();
        metadata.video_parameters.number_of_sequential_fields = metadata.fields.len();
        metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{metadata_for, pal_params, MemorySink};
    use crate::vbi::{build, TimecodeMode};
    use crate::video::metadata::VideoSystem;

    fn field(seq_no: usize) -> Field {
        Field {
            seq_no,
            samples: vec![seq_no as u16; 4],
            metadata: FieldMetadata {
                seq_no,
                is_first_field: seq_no % 2 == 1,
                ..Default::default()
            },
        }
    }

    fn frame(position: usize, number: i64) -> PendingOutputFrame {
        PendingOutputFrame {
            first: field(position * 2 - 1),
            second: field(position * 2),
            corrected_number: number,
            codeword: build(number, TimecodeMode::Cav, VideoSystem::Pal).ok(),
        }
    }

    fn written(sink: &MemorySink) -> Vec<u16> {
        sink.fields.lock().unwrap().iter().map(|f| f[0]).collect()
    }

    #[test]
    fn test_out_of_order_submits_are_written_in_order() {
        let state = ProcessingState::new(3);
        let sink = MemorySink::default();
        let mut output = OutputState::new(Box::new(sink.clone()), 3, false);

        output.submit(3, frame(3, 3), &state).unwrap();
        assert!(written(&sink).is_empty());
        output.submit(1, frame(1, 1), &state).unwrap();
        assert_eq!(written(&sink), vec![1, 2]);
        output.submit(2, frame(2, 2), &state).unwrap();
        assert_eq!(written(&sink), vec![1, 2, 3, 4, 5, 6]);
        output.finish().unwrap();
        assert_eq!(state.stats().written_frames, 3);
    }

    #[test]
    fn test_lower_sequence_number_is_written_first() {
        let state = ProcessingState::new(1);
        let sink = MemorySink::default();
        let mut output = OutputState::new(Box::new(sink.clone()), 1, false);

        let mut pending = frame(1, 1);
        std::mem::swap(&mut pending.first, &mut pending.second);
        output.submit(1, pending, &state).unwrap();
        assert_eq!(written(&sink), vec![1, 2]);
    }

    #[test]
    fn test_duplicate_submit_is_an_ordering_error() {
        let state = ProcessingState::new(2);
        let mut output = OutputState::new(Box::new(MemorySink::default()), 2, false);
        output.submit(2, frame(2, 2), &state).unwrap();
        assert!(matches!(
            output.submit(2, frame(2, 2), &state),
            Err(PipelineError::Ordering(_))
        ));
        output.submit(1, frame(1, 1), &state).unwrap();
        assert!(matches!(
            output.submit(1, frame(1, 1), &state),
            Err(PipelineError::Ordering(_))
        ));
    }

    #[test]
    fn test_write_failure_is_returned() {
        let state = ProcessingState::new(2);
        let sink = MemorySink {
            fail_after: Some(3),
            ..Default::default()
        };
        let mut output = OutputState::new(Box::new(sink.clone()), 2, false);
        output.submit(1, frame(1, 1), &state).unwrap();
        assert!(matches!(
            output.submit(2, frame(2, 2), &state),
            Err(PipelineError::Io { .. })
        ));
        assert_eq!(written(&sink), vec![1, 2, 3]);
    }

    #[test]
    fn test_aborted_state_stops_submits() {
        let state = ProcessingState::new(1);
        let sink = MemorySink::default();
        let mut output = OutputState::new(Box::new(sink.clone()), 1, false);
        state.abort("test");
        assert!(output.submit(1, frame(1, 1), &state).is_err());
        assert!(written(&sink).is_empty());
    }

    #[test]
    fn test_corrected_metadata_renumbers_and_records_codes() {
        let state = ProcessingState::new(2);
        let mut output = OutputState::new(Box::new(MemorySink::default()), 2, false);
        let mut second = frame(2, 7);
        second.codeword = None;
        output.submit(1, frame(1, 1), &state).unwrap();
        output.submit(2, second, &state).unwrap();

        let primary = metadata_for(&pal_params(), 6);
        let corrected = output.corrected_metadata(&primary);
        assert_eq!(corrected.field_count(), 4);
        assert_eq!(corrected.video_parameters.number_of_sequential_fields, 4);
        let seq: Vec<usize> = corrected.fields.iter().map(|f| f.seq_no).collect();
        assert_eq!(seq, vec![1, 2, 3, 4]);
        assert_eq!(
            corrected.fields[1].vbi.as_ref().unwrap().vbi_data,
            vec![0, 0xF00001, 0xF00001]
        );
        assert!(corrected.fields[2].vbi.is_none());
    }
}
