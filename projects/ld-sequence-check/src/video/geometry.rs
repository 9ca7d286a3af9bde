// Sample positions inside a TBC field
//
// Shared by the phase classifier and the VBI blanker, which both need a local
// black level taken from the blanking interval just ahead of the colour burst.

use super::metadata::VideoParameters;

/// Samples between the black-level tap and the start of the colour burst.
pub const BLACK_TAP_LEAD: usize = 8;

/// Offset of the first phase tap from the start of the colour burst.
pub const BURST_TAP_OFFSET: usize = 8;

/// One row of a field, or `None` if the field is too short.
pub fn line(field: &[u16], row: usize, width: usize) -> Option<&[u16]> {
    field.get(row * width..(row + 1) * width)
}

pub fn black_tap(params: &VideoParameters) -> usize {
    params.colour_burst_start.saturating_sub(BLACK_TAP_LEAD)
}

pub fn burst_tap(params: &VideoParameters) -> usize {
    params.colour_burst_start + BURST_TAP_OFFSET
}

/// Black level measured on `line`, falling back to the nominal level.
pub fn black_reference(line: &[u16], params: &VideoParameters) -> u16 {
    line.get(black_tap(params))
        .copied()
        .unwrap_or(params.black_16b_ire)
}
