use super::codeword::{BITS_PER_WORD, WORDS_PER_CODEWORD};
use super::{
    CodecError, TimecodeMode, VbiCodeword, FIRST_VBI_ROW, NTSC_BLANK_ROWS, PAL_BLANK_ROWS,
};
use crate::video::geometry::black_reference;
use crate::video::metadata::{VideoParameters, VideoSystem};

/// Samples in one 2 µs bit cell.
pub fn bit_cell_samples(params: &VideoParameters) -> usize {
    params.samples_per_microsecond() * 2
}

/// First sample of bit `bit` of codeword word `word`.
pub fn bit_cell_start(word: usize, bit: usize, params: &VideoParameters) -> usize {
    (FIRST_VBI_ROW + word) * params.field_width
        + bit * bit_cell_samples(params)
        + params.active_video_start
}

/// Writes the codeword into `field` as Manchester-coded bit cells.
///
/// Each cell is split in two halves: a 0 bit is white then black, a 1 bit is
/// black then white. CAV only transmits words 1 and 2, so row 15 is left
/// alone. Nothing is written unless every cell fits inside the field.
pub fn modulate(
    field: &mut [u16],
    codeword: &VbiCodeword,
    mode: TimecodeMode,
    params: &VideoParameters,
) -> Result<(), CodecError> {
    check_code_window(field.len(), params)?;

    let cell = bit_cell_samples(params);
    let half = cell / 2;
    let white = params.white_16b_ire;
    let black = params.black_16b_ire;

    for word in mode.first_word()..WORDS_PER_CODEWORD {
        for (bit, &value) in codeword.bits(word).iter().enumerate() {
            let start = bit_cell_start(word, bit, params);
            let (leading, trailing) = if value { (black, white) } else { (white, black) };
            field[start..start + half].fill(leading);
            field[start + half..start + cell].fill(trailing);
        }
    }

    Ok(())
}

/// Erases old VBI codes by flattening the active part of each code row to the
/// black level measured on that row.
pub fn blank(
    field: &mut [u16],
    system: VideoSystem,
    params: &VideoParameters,
) -> Result<(), CodecError> {
    let rows = blank_rows(system);
    check_blank_rows(field.len(), rows, params)?;

    let width = params.field_width;
    let active_end = params.active_video_end.min(width);
    let active_start = params.active_video_start.min(active_end);

    for &row in rows {
        let line = &mut field[row * width..(row + 1) * width];
        let level = black_reference(line, params);
        line[active_start..active_end].fill(level);
    }

    Ok(())
}

/// Checks that a field of `len` samples can take a codeword and, with
/// `blanking`, the blanked rows, without writing anything.
pub fn check_fits(
    len: usize,
    system: VideoSystem,
    blanking: bool,
    params: &VideoParameters,
) -> Result<(), CodecError> {
    if blanking {
        check_blank_rows(len, blank_rows(system), params)?;
    }
    check_code_window(len, params)
}

fn blank_rows(system: VideoSystem) -> &'static [usize] {
    if system.is_pal() {
        &PAL_BLANK_ROWS
    } else {
        &NTSC_BLANK_ROWS
    }
}

fn check_code_window(len: usize, params: &VideoParameters) -> Result<(), CodecError> {
    let cell = bit_cell_samples(params);
    if cell < 2 {
        return Err(CodecError::BitCellTooShort { samples: cell });
    }
    let end = bit_cell_start(WORDS_PER_CODEWORD - 1, BITS_PER_WORD, params);
    if end > len {
        return Err(CodecError::FieldTooShort { len, end });
    }
    Ok(())
}

fn check_blank_rows(
    len: usize,
    rows: &[usize],
    params: &VideoParameters,
) -> Result<(), CodecError> {
    let last_row = rows.iter().copied().max().unwrap_or(0);
    let end = (last_row + 1) * params.field_width;
    if end > len {
        return Err(CodecError::FieldTooShort { len, end });
    }
    Ok(())
}
