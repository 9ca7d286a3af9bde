pub mod geometry;
pub mod metadata;
pub mod tbc_reader;
pub mod tbc_writer;

use crate::error::PipelineResult;

/// Random-access store of raw TBC fields.
pub trait FieldSource: Send {
    /// Number of complete fields the source can deliver.
    fn field_count(&self) -> usize;
    /// Reads a field by 1-based sequence number.
    fn read_field(&mut self, seq_no: usize) -> PipelineResult<Vec<u16>>;
}

/// Append-only destination for output fields.
pub trait FieldSink: Send {
    fn write_field(&mut self, samples: &[u16]) -> PipelineResult<()>;
    fn finish(&mut self) -> PipelineResult<()>;
}
