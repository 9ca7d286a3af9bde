use super::{CodecError, TimecodeMode};
use crate::video::metadata::VideoSystem;

pub const BITS_PER_WORD: usize = 24;
pub const WORDS_PER_CODEWORD: usize = 3;

const CAV_MARKER: u8 = 0xF;
const CLV_TIME_MARKER: u8 = 0x8;
const CLV_HOUR_MARKER: u8 = 0xF;
const CLV_SECONDS_TAG: u8 = 0xE;
const CLV_HOUR_SEPARATOR: u8 = 0xD;
const CLV_TENS_OFFSET: u8 = 0xA;

/// The three 24-bit words transmitted on lines 16, 17 and 18 of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VbiCodeword {
    words: [u32; WORDS_PER_CODEWORD],
}

impl VbiCodeword {
    pub fn words(&self) -> [u32; WORDS_PER_CODEWORD] {
        self.words
    }

    /// Bits of one word in transmission order, most significant first.
    pub fn bits(&self, index: usize) -> [bool; BITS_PER_WORD] {
        let word = self.words[index];
        std::array::from_fn(|i| (word >> (BITS_PER_WORD - 1 - i)) & 1 == 1)
    }
}

/// Highest frame number the format can represent.
pub fn max_frame_number(mode: TimecodeMode, system: VideoSystem) -> i64 {
    match (mode, system) {
        (TimecodeMode::Cav, VideoSystem::Ntsc) => 79_999,
        (TimecodeMode::Cav, VideoSystem::Pal) => 99_999,
        (TimecodeMode::Clv, VideoSystem::Ntsc) => 1_079_999,
        (TimecodeMode::Clv, VideoSystem::Pal) => 899_975,
    }
}

/// Builds the codeword for `frame_number`.
///
/// CAV puts the five picture-number digits behind an `F` marker on lines 17
/// and 18 (line 16 stays zero). CLV splits the number into programme time:
/// seconds and frames go on line 16, hours and minutes on lines 17 and 18.
pub fn build(
    frame_number: i64,
    mode: TimecodeMode,
    system: VideoSystem,
) -> Result<VbiCodeword, CodecError> {
    let max = max_frame_number(mode, system);
    if !(0..=max).contains(&frame_number) {
        return Err(CodecError::OutOfRange {
            frame: frame_number,
            mode: mode.name(),
            max,
        });
    }
    let frame = frame_number as u32;

    let words = match mode {
        TimecodeMode::Cav => {
            let picture = pack(CAV_MARKER, decimal_digits(frame));
            [0, picture, picture]
        }
        TimecodeMode::Clv => {
            let time = ClvTime::from_frame_number(frame, system.frame_rate());
            let seconds = pack(
                CLV_TIME_MARKER,
                [
                    time.seconds / 10 + CLV_TENS_OFFSET,
                    CLV_SECONDS_TAG,
                    time.seconds % 10,
                    time.frames / 10,
                    time.frames % 10,
                ],
            );
            let hours = pack(
                CLV_HOUR_MARKER,
                [
                    time.hours,
                    CLV_HOUR_SEPARATOR,
                    CLV_HOUR_SEPARATOR,
                    time.minutes / 10,
                    time.minutes % 10,
                ],
            );
            [seconds, hours, hours]
        }
    };

    Ok(VbiCodeword { words })
}

/// Programme time of a CLV frame number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClvTime {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
}

impl ClvTime {
    pub fn from_frame_number(frame_number: u32, frame_rate: u32) -> Self {
        let per_minute = frame_rate * 60;
        let per_hour = per_minute * 60;

        let mut remaining = frame_number;
        let hours = remaining / per_hour;
        remaining %= per_hour;
        let minutes = remaining / per_minute;
        remaining %= per_minute;
        let seconds = remaining / frame_rate;
        let frames = remaining % frame_rate;

        Self {
            hours: hours as u8,
            minutes: minutes as u8,
            seconds: seconds as u8,
            frames: frames as u8,
        }
    }
}

/// Five decimal digits, most significant first.
fn decimal_digits(value: u32) -> [u8; 5] {
    let mut digits = [0u8; 5];
    let mut rest = value;
    for digit in digits.iter_mut().rev() {
        *digit = (rest % 10) as u8;
        rest /= 10;
    }
    digits
}

fn pack(marker: u8, nibbles: [u8; 5]) -> u32 {
    nibbles
        .iter()
        .fold(u32::from(marker & 0xF), |word, &n| (word << 4) | u32::from(n & 0xF))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cav_packs_digits_behind_marker() {
        let code = build(12345, TimecodeMode::Cav, VideoSystem::Pal).unwrap();
        assert_eq!(code.words(), [0, 0xF12345, 0xF12345]);

        let code = build(7, TimecodeMode::Cav, VideoSystem::Ntsc).unwrap();
        assert_eq!(code.words(), [0, 0xF00007, 0xF00007]);
    }

    #[test]
    fn test_cav_range_depends_on_system() {
        assert!(build(79_999, TimecodeMode::Cav, VideoSystem::Ntsc).is_ok());
        assert_eq!(
            build(80_000, TimecodeMode::Cav, VideoSystem::Ntsc),
            Err(CodecError::OutOfRange {
                frame: 80_000,
                mode: "CAV",
                max: 79_999
            })
        );
        assert!(build(99_999, TimecodeMode::Cav, VideoSystem::Pal).is_ok());
        assert!(build(100_000, TimecodeMode::Cav, VideoSystem::Pal).is_err());
        assert!(build(-1, TimecodeMode::Cav, VideoSystem::Pal).is_err());
    }

    #[test]
    fn test_clv_pal_time_layout() {
        // 1h 02m 03s + 4 frames at 25 fps
        let frame = 90_000 + 2 * 1_500 + 3 * 25 + 4;
        let code = build(frame, TimecodeMode::Clv, VideoSystem::Pal).unwrap();
        assert_eq!(code.words(), [0x8AE304, 0xF1DD02, 0xF1DD02]);
    }

    #[test]
    fn test_clv_ntsc_time_layout() {
        // 1h 02m 13s + 27 frames at 30 fps
        let frame = 108_000 + 2 * 1_800 + 13 * 30 + 27;
        let code = build(frame, TimecodeMode::Clv, VideoSystem::Ntsc).unwrap();
        assert_eq!(code.words(), [0x8BE327, 0xF1DD02, 0xF1DD02]);
    }

    #[test]
    fn test_clv_range_limits() {
        let code = build(1_079_999, TimecodeMode::Clv, VideoSystem::Ntsc).unwrap();
        assert_eq!(code.words()[0], 0x8FE929);
        assert_eq!(code.words()[1], 0xF9DD59);
        assert!(build(1_080_000, TimecodeMode::Clv, VideoSystem::Ntsc).is_err());

        assert!(build(899_975, TimecodeMode::Clv, VideoSystem::Pal).is_ok());
        assert!(build(899_976, TimecodeMode::Clv, VideoSystem::Pal).is_err());
    }

    #[test]
    fn test_clv_time_split() {
        assert_eq!(
            ClvTime::from_frame_number(0, 25),
            ClvTime {
                hours: 0,
                minutes: 0,
                seconds: 0,
                frames: 0
            }
        );
        assert_eq!(
            ClvTime::from_frame_number(899_975, 25),
            ClvTime {
                hours: 9,
                minutes: 59,
                seconds: 59,
                frames: 0
            }
        );
    }

    #[test]
    fn test_bits_are_msb_first() {
        let code = build(1, TimecodeMode::Cav, VideoSystem::Pal).unwrap();
        let bits = code.bits(1);
        assert_eq!(&bits[..4], &[true, true, true, true]);
        assert!(bits[4..23].iter().all(|b| !b));
        assert!(bits[23]);
        assert!(code.bits(0).iter().all(|b| !b));
    }
}
