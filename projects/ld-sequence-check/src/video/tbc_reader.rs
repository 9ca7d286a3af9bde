use super::FieldSource;
use crate::error::{PipelineError, PipelineResult};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Stdin};

enum TbcInput {
    File(BufReader<File>),
    Stdin(BufReader<Stdin>),
}

/// Reader for raw TBC files: fields of little-endian `u16` samples, back to back.
///
/// Reads are expected in increasing sequence order. Files can seek anywhere;
/// piped input can only skip forward.
pub struct TbcReader {
    input: TbcInput,
    field_length: usize,
    field_count: usize,
    next_seq: usize,
    buffer: Vec<u8>,
}

impl TbcReader {
    /// Opens `path` (or stdin for `-`). For piped input the field count cannot
    /// be measured, so `expected_fields` from the metadata is trusted.
    pub fn open(path: &str, field_length: usize, expected_fields: usize) -> PipelineResult<Self> {
        if field_length == 0 {
            return Err(PipelineError::configuration(format!(
                "Field length for {} is zero",
                path
            )));
        }

        let (input, field_count) = if path == "-" {
            (TbcInput::Stdin(BufReader::new(io::stdin())), expected_fields)
        } else {
            let file = File::open(path)
                .map_err(|e| PipelineError::io(format!("opening input {}", path), e))?;
            let bytes = file
                .metadata()
                .map_err(|e| PipelineError::io(format!("reading size of {}", path), e))?
                .len() as usize;
            (
                TbcInput::File(BufReader::new(file)),
                bytes / (field_length * 2),
            )
        };

        tracing::info!(
            "TbcReader: opened {}, {} fields of {} samples",
            path,
            field_count,
            field_length
        );

        Ok(Self {
            input,
            field_length,
            field_count,
            next_seq: 1,
            buffer: vec![0; field_length * 2],
        })
    }

    fn position_at(&mut self, seq_no: usize) -> io::Result<()> {
        if seq_no == self.next_seq {
            return Ok(());
        }
        let field_bytes = (self.field_length * 2) as u64;
        match &mut self.input {
            TbcInput::File(file) => {
                file.seek(SeekFrom::Start((seq_no as u64 - 1) * field_bytes))?;
            }
            TbcInput::Stdin(stdin) if seq_no > self.next_seq => {
                let skip = (seq_no - self.next_seq) as u64 * field_bytes;
                let skipped = io::copy(&mut stdin.by_ref().take(skip), &mut io::sink())?;
                if skipped < skip {
                    return Err(io::ErrorKind::UnexpectedEof.into());
                }
            }
            TbcInput::Stdin(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "cannot seek backwards in piped input",
                ));
            }
        }
        Ok(())
    }
}

impl FieldSource for TbcReader {
    fn field_count(&self) -> usize {
        self.field_count
    }

    fn read_field(&mut self, seq_no: usize) -> PipelineResult<Vec<u16>> {
        let context = || format!("reading field {}", seq_no);
        if seq_no == 0 || seq_no > self.field_count {
            return Err(PipelineError::io(
                context(),
                io::Error::new(io::ErrorKind::UnexpectedEof, "field is beyond end of input"),
            ));
        }

        self.position_at(seq_no)
            .map_err(|e| PipelineError::io(context(), e))?;
        let result = match &mut self.input {
            TbcInput::File(file) => file.read_exact(&mut self.buffer),
            TbcInput::Stdin(stdin) => stdin.read_exact(&mut self.buffer),
        };
        result.map_err(|e| PipelineError::io(context(), e))?;
        self.next_seq = seq_no + 1;

        Ok(self
            .buffer
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect())
    }
}
