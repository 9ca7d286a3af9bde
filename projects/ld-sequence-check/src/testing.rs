// Synthetic fields and in-memory collaborators shared by unit tests.

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::phase::PHASE_ROW;
use crate::vbi::manchester::{bit_cell_samples, bit_cell_start};
use crate::video::geometry::{black_tap, burst_tap};
use crate::video::metadata::{FieldMetadata, LdDecodeMetadata, VideoParameters, VideoSystem};
use crate::video::{FieldSink, FieldSource};
use serde_json::Map;
use std::io;
use std::sync::{Arc, Mutex};

fn params(
    system: &str,
    width: usize,
    rate: f64,
    active: (usize, usize),
    burst: (usize, usize),
    levels: (u16, u16),
) -> VideoParameters {
    VideoParameters {
        number_of_sequential_fields: 0,
        system: Some(system.to_string()),
        is_source_pal: None,
        field_width: width,
        field_height: 64,
        sample_rate: rate,
        active_video_start: active.0,
        active_video_end: active.1,
        colour_burst_start: burst.0,
        colour_burst_end: burst.1,
        white_16b_ire: levels.0,
        black_16b_ire: levels.1,
        extra: Map::new(),
    }
}

/// PAL 4fsc geometry, cut down to 64 rows.
pub fn pal_params() -> VideoParameters {
    params("PAL", 1135, 17_734_375.0, (185, 1107), (98, 138), (54_016, 16_384))
}

/// NTSC 4fsc geometry, cut down to 64 rows.
pub fn ntsc_params() -> VideoParameters {
    params("NTSC", 910, 14_318_181.0, (134, 894), (78, 110), (51_200, 15_360))
}

pub fn flat_field(params: &VideoParameters, level: u16) -> Vec<u16> {
    vec![level; params.field_length()]
}

/// Draws a burst that the classifier reads as `state` (0 leaves the field
/// flat). Black is set to 0x4000 on the phase rows.
pub fn with_phase(
    mut field: Vec<u16>,
    system: VideoSystem,
    params: &VideoParameters,
    state: u8,
) -> Vec<u16> {
    let width = params.field_width;
    let black = 0x4000u16;
    let tap = burst_tap(params);
    for row in [PHASE_ROW, PHASE_ROW + 1] {
        field[row * width + black_tap(params)] = black;
    }
    match system {
        VideoSystem::Pal => {
            let (a, b): (u16, u16) = match state {
                1 => (124, 84),
                2 => (94, 34),
                3 => (44, 4),
                4 => (34, 94),
                _ => (64, 64),
            };
            field[PHASE_ROW * width + tap] = a << 8;
            field[(PHASE_ROW + 1) * width + tap] = b << 8;
        }
        VideoSystem::Ntsc => {
            let (a, b) = match state {
                1 => (black + 8_000, black - 8_000),
                2 => (black - 8_000, black + 8_000),
                _ => (black, black),
            };
            field[PHASE_ROW * width + tap] = a;
            field[PHASE_ROW * width + tap + 2] = b;
        }
    }
    field
}

/// Recovers one codeword word by sampling the second half of each bit cell.
pub fn read_vbi_word(field: &[u16], word: usize, params: &VideoParameters) -> u32 {
    let cell = bit_cell_samples(params);
    let mid = (u32::from(params.white_16b_ire) + u32::from(params.black_16b_ire)) / 2;
    (0..24).fold(0u32, |acc, bit| {
        let sample = field[bit_cell_start(word, bit, params) + cell * 3 / 4];
        (acc << 1) | u32::from(u32::from(sample) > mid)
    })
}

/// Metadata for `field_count` fields, odd sequence numbers first.
pub fn metadata_for(params: &VideoParameters, field_count: usize) -> LdDecodeMetadata {
    let mut video_parameters = params.clone();
    video_parameters.number_of_sequential_fields = field_count;
    LdDecodeMetadata {
        video_parameters,
        fields: (1..=field_count)
            .map(|seq_no| FieldMetadata {
                seq_no,
                is_first_field: seq_no % 2 == 1,
                ..Default::default()
            })
            .collect(),
        extra: Map::new(),
    }
}

/// Field store backed by vectors; logs every read.
pub struct MemorySource {
    fields: Vec<Vec<u16>>,
    pub reads: Arc<Mutex<Vec<usize>>>,
}

impl MemorySource {
    pub fn new(fields: Vec<Vec<u16>>) -> Self {
        Self {
            fields,
            reads: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FieldSource for MemorySource {
    fn field_count(&self) -> usize {
        self.fields.len()
    }

    fn read_field(&mut self, seq_no: usize) -> PipelineResult<Vec<u16>> {
        self.reads.lock().unwrap().push(seq_no);
        seq_no
            .checked_sub(1)
            .and_then(|i| self.fields.get(i))
            .cloned()
            .ok_or_else(|| {
                PipelineError::io(
                    format!("reading field {}", seq_no),
                    io::ErrorKind::UnexpectedEof.into(),
                )
            })
    }
}

/// Sink collecting fields in memory; optionally fails after some writes.
#[derive(Clone, Default)]
pub struct MemorySink {
    pub fields: Arc<Mutex<Vec<Vec<u16>>>>,
    pub fail_after: Option<usize>,
}

impl FieldSink for MemorySink {
    fn write_field(&mut self, samples: &[u16]) -> PipelineResult<()> {
        let mut fields = self.fields.lock().unwrap();
        if self.fail_after.is_some_and(|limit| fields.len() >= limit) {
            return Err(PipelineError::io(
                "writing output field",
                io::ErrorKind::BrokenPipe.into(),
            ));
        }
        fields.push(samples.to_vec());
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<()> {
        Ok(())
    }
}
