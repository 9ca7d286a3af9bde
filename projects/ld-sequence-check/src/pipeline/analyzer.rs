// Frame numbering from phase continuity

use super::phase::{offset, PhaseState};
use crate::video::metadata::VideoSystem;

/// How one frame relates to the frame before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Next frame in sequence.
    Advance,
    /// Same picture as the previous frame.
    Repeat,
    /// This many frames are missing before this one.
    Dropped(u8),
    /// Phase could not be compared; numbered as if sequential.
    Undetermined,
}

impl Step {
    /// Number for the frame and the new running number, given the running
    /// number (always one past the last number handed out).
    pub fn apply(self, running: i64) -> (i64, i64) {
        match self {
            Step::Advance | Step::Undetermined => (running, running + 1),
            Step::Repeat => (running - 1, running),
            Step::Dropped(missing) => {
                let number = running + i64::from(missing);
                (number, number + 1)
            }
        }
    }
}

/// What the analyzer needs to know about one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameObservation {
    pub phase: PhaseState,
    pub padded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub number: i64,
    pub step: Step,
}

pub struct SequenceAnalyzer {
    system: VideoSystem,
    phase_check: bool,
}

impl SequenceAnalyzer {
    pub fn new(system: VideoSystem, phase_check: bool) -> Self {
        Self {
            system,
            phase_check,
        }
    }

    /// Classifies the step between two consecutive frames.
    pub fn step(&self, previous: &FrameObservation, current: &FrameObservation) -> Step {
        if !self.phase_check
            || previous.padded
            || current.padded
            || !previous.phase.is_determined()
            || !current.phase.is_determined()
        {
            return Step::Undetermined;
        }

        match (self.system, offset(self.system, previous.phase, current.phase)) {
            (VideoSystem::Pal, 0) => Step::Repeat,
            (VideoSystem::Pal, 1) => Step::Advance,
            (VideoSystem::Pal, 2) => Step::Dropped(1),
            (VideoSystem::Pal, 3) => Step::Dropped(2),
            (VideoSystem::Ntsc, 0) => Step::Dropped(1),
            (VideoSystem::Ntsc, _) => Step::Advance,
            (VideoSystem::Pal, _) => Step::Undetermined,
        }
    }

    /// Numbers the frames of one batch.
    ///
    /// `reference` is the frame just before the batch (already numbered by
    /// the previous batch); the very first batch has none and its first frame
    /// takes the running number as is.
    pub fn assign(
        &self,
        reference: Option<&FrameObservation>,
        frames: &[FrameObservation],
        running: &mut i64,
    ) -> Vec<Assignment> {
        let mut previous = reference;
        let mut assignments = Vec::with_capacity(frames.len());
        for frame in frames {
            let step = match previous {
                Some(previous) => self.step(previous, frame),
                None => Step::Advance,
            };
            let (number, next) = step.apply(*running);
            *running = next;
            assignments.push(Assignment { number, step });
            previous = Some(frame);
        }
        assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pal(states: &[u8]) -> Vec<FrameObservation> {
        states
            .iter()
            .map(|&s| FrameObservation {
                phase: PhaseState::new(s),
                padded: false,
            })
            .collect()
    }

    fn numbers(assignments: &[Assignment]) -> Vec<i64> {
        assignments.iter().map(|a| a.number).collect()
    }

    #[test]
    fn test_consecutive_frames_advance_by_one() {
        let analyzer = SequenceAnalyzer::new(VideoSystem::Pal, true);
        let reference = pal(&[4])[0];
        let frames = pal(&[1, 2, 3, 4]);
        let mut running = 11;
        let out = analyzer.assign(Some(&reference), &frames, &mut running);
        // Reference was numbered 10
        assert_eq!(numbers(&out), vec![11, 12, 13, 14]);
        assert_eq!(running, 15);
        assert!(out.iter().all(|a| a.step == Step::Advance));
    }

    #[test]
    fn test_repeat_reuses_previous_number() {
        let analyzer = SequenceAnalyzer::new(VideoSystem::Pal, true);
        let reference = pal(&[1])[0];
        // Offsets 1, 0, 1, 1
        let frames = pal(&[2, 2, 3, 4]);
        let mut running = 6;
        let out = analyzer.assign(Some(&reference), &frames, &mut running);
        assert_eq!(numbers(&out), vec![6, 6, 7, 8]);
        assert_eq!(out[1].step, Step::Repeat);
        assert_eq!(running, 9);
    }

    #[test]
    fn test_pal_drops_skip_numbers() {
        let analyzer = SequenceAnalyzer::new(VideoSystem::Pal, true);
        let reference = pal(&[1])[0];
        // Offsets 2 then 3
        let frames = pal(&[3, 2]);
        let mut running = 2;
        let out = analyzer.assign(Some(&reference), &frames, &mut running);
        assert_eq!(numbers(&out), vec![3, 6]);
        assert_eq!(out[0].step, Step::Dropped(1));
        assert_eq!(out[1].step, Step::Dropped(2));
        assert_eq!(running, 7);
    }

    #[test]
    fn test_ntsc_same_phase_is_a_drop() {
        let analyzer = SequenceAnalyzer::new(VideoSystem::Ntsc, true);
        let frames = pal(&[1, 2, 2, 1]);
        let mut running = 1;
        let out = analyzer.assign(None, &frames, &mut running);
        assert_eq!(numbers(&out), vec![1, 2, 4, 5]);
        assert_eq!(out[2].step, Step::Dropped(1));
        assert_eq!(running, 6);
    }

    #[test]
    fn test_undetermined_and_padded_frames_are_sequential() {
        let analyzer = SequenceAnalyzer::new(VideoSystem::Pal, true);
        let mut frames = pal(&[1, 0, 1, 1]);
        frames[3].padded = true;
        let mut running = 1;
        let out = analyzer.assign(None, &frames, &mut running);
        assert_eq!(numbers(&out), vec![1, 2, 3, 4]);
        assert_eq!(out[1].step, Step::Undetermined);
        assert_eq!(out[2].step, Step::Undetermined);
        assert_eq!(out[3].step, Step::Undetermined);
    }

    #[test]
    fn test_phase_check_disabled_numbers_sequentially() {
        let analyzer = SequenceAnalyzer::new(VideoSystem::Pal, false);
        let frames = pal(&[1, 1, 3, 2, 2]);
        let mut running = 1;
        let out = analyzer.assign(None, &frames, &mut running);
        assert_eq!(numbers(&out), vec![1, 2, 3, 4, 5]);
        assert_eq!(running, 6);
    }
}
