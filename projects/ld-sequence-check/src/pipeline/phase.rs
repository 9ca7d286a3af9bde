// Chroma burst phase classification
//
// The subcarrier phase at the start of the burst advances by a fixed step
// every frame (a 4-frame sequence in PAL, 2 in NTSC), so comparing the phase
// of consecutive frames reveals repeated and skipped frames.

use crate::video::geometry::{black_reference, burst_tap, line};
use crate::video::metadata::{VideoParameters, VideoSystem};

/// 0-based field row sampled for the burst (PAL also reads the row below).
pub const PHASE_ROW: usize = 40;

/// PAL noise threshold, in 8-bit units.
const PAL_THRESHOLD: i32 = 15;

/// NTSC noise threshold, in 16-bit units.
const NTSC_THRESHOLD: i32 = 3840;

/// Distance between the two NTSC taps on one row.
const NTSC_TAP_SPACING: usize = 2;

const PAL_SEQUENCE: i32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhaseState(u8);

impl PhaseState {
    pub const UNDETERMINED: PhaseState = PhaseState(0);

    pub fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_determined(self) -> bool {
        self.0 != 0
    }
}

/// Classifies the burst phase of one field.
///
/// Returns [`PhaseState::UNDETERMINED`] when the field is too short or the
/// taps cannot be told apart from black or from each other.
pub fn classify(field: &[u16], system: VideoSystem, params: &VideoParameters) -> PhaseState {
    let width = params.field_width;
    let tap = burst_tap(params);
    let Some(row) = line(field, PHASE_ROW, width) else {
        return PhaseState::UNDETERMINED;
    };

    match system {
        VideoSystem::Pal => {
            let Some(next_row) = line(field, PHASE_ROW + 1, width) else {
                return PhaseState::UNDETERMINED;
            };
            let (Some(&a), Some(&b)) = (row.get(tap), next_row.get(tap)) else {
                return PhaseState::UNDETERMINED;
            };
            let black = i32::from(black_reference(row, params) >> 8);
            let a = i32::from(a >> 8);
            let b = i32::from(b >> 8);
            if (a - b).abs() < PAL_THRESHOLD {
                return PhaseState::UNDETERMINED;
            }

            let level = |x: i32| {
                if x - black >= PAL_THRESHOLD {
                    Some(true)
                } else if black - x >= PAL_THRESHOLD {
                    Some(false)
                } else {
                    None
                }
            };
            match (level(a), level(b)) {
                (Some(true), Some(true)) => PhaseState::new(1),
                (Some(true), Some(false)) => PhaseState::new(2),
                (Some(false), Some(false)) => PhaseState::new(3),
                (Some(false), Some(true)) => PhaseState::new(4),
                _ => PhaseState::UNDETERMINED,
            }
        }
        VideoSystem::Ntsc => {
            let (Some(&a), Some(&b)) = (row.get(tap), row.get(tap + NTSC_TAP_SPACING)) else {
                return PhaseState::UNDETERMINED;
            };
            let (a, b) = (i32::from(a), i32::from(b));
            if (a - b).abs() < NTSC_THRESHOLD {
                PhaseState::UNDETERMINED
            } else if a > b {
                PhaseState::new(1)
            } else {
                PhaseState::new(2)
            }
        }
    }
}

/// Signed phase step from `a` (earlier frame) to `b`.
///
/// PAL walks a ring of four states; NTSC only distinguishes same / different.
pub fn offset(system: VideoSystem, a: PhaseState, b: PhaseState) -> i32 {
    let (a, b) = (i32::from(a.0), i32::from(b.0));
    match system {
        VideoSystem::Pal => {
            if b < a {
                (b + PAL_SEQUENCE) - a
            } else {
                -(a - b)
            }
        }
        VideoSystem::Ntsc => i32::from(a != b),
    }
}
