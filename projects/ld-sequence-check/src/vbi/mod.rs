// Laserdisc VBI timecode codec
//
// Builds the 24-bit picture-number / programme-time codes and writes them into
// field samples as Manchester-coded bit cells.

pub mod codeword;
pub mod manchester;

pub use codeword::{build, VbiCodeword};
pub use manchester::{blank, check_fits, modulate};

use thiserror::Error;

/// 0-based field row carrying word 0 of a codeword (line 16).
pub const FIRST_VBI_ROW: usize = 15;

/// Rows erased before re-encoding: NTSC also carries a code on line 11.
pub const NTSC_BLANK_ROWS: [usize; 4] = [10, 15, 16, 17];
pub const PAL_BLANK_ROWS: [usize; 3] = [15, 16, 17];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimecodeMode {
    /// Absolute picture number on lines 17 and 18.
    Cav,
    /// Elapsed programme time on lines 16, 17 and 18.
    Clv,
}

impl TimecodeMode {
    /// Index of the first codeword word this mode transmits.
    pub fn first_word(self) -> usize {
        match self {
            TimecodeMode::Cav => 1,
            TimecodeMode::Clv => 0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TimecodeMode::Cav => "CAV",
            TimecodeMode::Clv => "CLV",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("frame number {frame} is outside the {mode} timecode range 0..={max}")]
    OutOfRange {
        frame: i64,
        mode: &'static str,
        max: i64,
    },

    #[error("field of {len} samples is too short for a VBI window ending at sample {end}")]
    FieldTooShort { len: usize, end: usize },

    #[error("bit cell of {samples} samples cannot hold two Manchester halves")]
    BitCellTooShort { samples: usize },
}
