use super::FieldSink;
use crate::error::{PipelineError, PipelineResult};
use std::fs::File;
use std::io::{self, BufWriter, Write};

/// Writes fields as raw little-endian `u16` samples.
pub struct TbcWriter<W: Write + Send> {
    output: BufWriter<W>,
    bytes: Vec<u8>,
    fields_written: usize,
}

impl TbcWriter<Box<dyn Write + Send>> {
    /// Creates the output file, or writes to stdout for `-`.
    pub fn create(path: &str) -> PipelineResult<Self> {
        let output: Box<dyn Write + Send> = if path == "-" {
            Box::new(io::stdout())
        } else {
            Box::new(
                File::create(path)
                    .map_err(|e| PipelineError::io(format!("creating output {}", path), e))?,
            )
        };
        Ok(Self::new(output))
    }
}

impl<W: Write + Send> TbcWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            output: BufWriter::new(output),
            bytes: Vec::new(),
            fields_written: 0,
        }
    }
}

impl<W: Write + Send> FieldSink for TbcWriter<W> {
    fn write_field(&mut self, samples: &[u16]) -> PipelineResult<()> {
        self.bytes.clear();
        self.bytes.reserve(samples.len() * 2);
        for sample in samples {
            self.bytes.extend_from_slice(&sample.to_le_bytes());
        }
        self.output.write_all(&self.bytes).map_err(|e| {
            PipelineError::io(format!("writing output field {}", self.fields_written + 1), e)
        })?;
        self.fields_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> PipelineResult<()> {
        self.output
            .flush()
            .map_err(|e| PipelineError::io("flushing output", e))?;
        tracing::debug!("TbcWriter: flushed {} fields", self.fields_written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_little_endian_samples() {
        let mut bytes = Vec::new();
        {
            let mut writer = TbcWriter::new(&mut bytes);
            writer.write_field(&[0x0102, 0xFF00]).unwrap();
            writer.write_field(&[7]).unwrap();
            writer.finish().unwrap();
        }
        assert_eq!(bytes, vec![0x02, 0x01, 0x00, 0xFF, 0x07, 0x00]);
    }
}
