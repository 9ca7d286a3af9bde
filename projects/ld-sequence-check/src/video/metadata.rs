// ld-decode JSON sidecar
//
// Struct definitions for the metadata persisted next to every TBC file.
// Keys this tool does not interpret are carried through untouched.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSystem {
    Pal,
    Ntsc,
}

impl VideoSystem {
    pub fn is_pal(self) -> bool {
        self == VideoSystem::Pal
    }

    /// Nominal frames per second (NTSC is counted non-drop).
    pub fn frame_rate(self) -> u32 {
        match self {
            VideoSystem::Pal => 25,
            VideoSystem::Ntsc => 30,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            VideoSystem::Pal => "PAL",
            VideoSystem::Ntsc => "NTSC",
        }
    }
}

/// Geometry and timing of one TBC source.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VideoParameters {
    #[serde(default)]
    pub number_of_sequential_fields: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_source_pal: Option<bool>,
    pub field_width: usize,
    pub field_height: usize,
    pub sample_rate: f64,
    pub active_video_start: usize,
    pub active_video_end: usize,
    pub colour_burst_start: usize,
    pub colour_burst_end: usize,
    #[serde(rename = "white16bIre")]
    pub white_16b_ire: u16,
    #[serde(rename = "black16bIre")]
    pub black_16b_ire: u16,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VideoParameters {
    /// Resolves the video system, accepting both the `system` string and the
    /// older `isSourcePal` flag.
    pub fn video_system(&self) -> PipelineResult<VideoSystem> {
        match (self.system.as_deref(), self.is_source_pal) {
            (Some("PAL"), _) => Ok(VideoSystem::Pal),
            (Some("NTSC"), _) => Ok(VideoSystem::Ntsc),
            (Some(other), _) => Err(PipelineError::configuration(format!(
                "Unsupported video system: {}",
                other
            ))),
            (None, Some(true)) => Ok(VideoSystem::Pal),
            (None, Some(false)) => Ok(VideoSystem::Ntsc),
            (None, None) => Err(PipelineError::configuration(
                "Video parameters do not name a video system",
            )),
        }
    }

    /// Number of samples in one field.
    pub fn field_length(&self) -> usize {
        self.field_width * self.field_height
    }

    /// Whole samples per microsecond (truncated).
    pub fn samples_per_microsecond(&self) -> usize {
        (self.sample_rate / 1_000_000.0).floor() as usize
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vbi {
    #[serde(default)]
    pub vbi_data: Vec<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-field record. `seq_no` is 1-based.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub seq_no: usize,
    pub is_first_field: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pad: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vbi: Option<Vbi>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LdDecodeMetadata {
    pub video_parameters: VideoParameters,
    #[serde(default)]
    pub fields: Vec<FieldMetadata>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LdDecodeMetadata {
    pub fn read(path: &Path) -> PipelineResult<Self> {
        let file = File::open(path)
            .map_err(|e| PipelineError::io(format!("opening metadata {:?}", path), e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| PipelineError::Metadata {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> PipelineResult<()> {
        let file = File::create(path)
            .map_err(|e| PipelineError::io(format!("creating metadata {:?}", path), e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|source| PipelineError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;
        writer
            .flush()
            .map_err(|e| PipelineError::io(format!("writing metadata {:?}", path), e))
    }

    pub fn video_parameters(&self) -> &VideoParameters {
        &self.video_parameters
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn frame_count(&self) -> usize {
        self.fields.len() / 2
    }

    /// Field record by 1-based sequence number.
    pub fn field(&self, seq_no: usize) -> Option<&FieldMetadata> {
        seq_no.checked_sub(1).and_then(|i| self.fields.get(i))
    }

    /// Sequence numbers of the (first, second) fields of a 1-based frame.
    ///
    /// Frame `n` is built from fields `2n-1` and `2n`; `isFirstField` decides
    /// which of the two comes first. With `reverse` the expected order is
    /// second/first.
    pub fn frame_fields(&self, frame_number: usize, reverse: bool) -> Option<(usize, usize)> {
        let a = frame_number.checked_mul(2)?.checked_sub(1)?;
        let b = a + 1;
        let a_first = self.field(a)?.is_first_field != reverse;
        self.field(b)?;
        Some(if a_first { (a, b) } else { (b, a) })
    }
}
