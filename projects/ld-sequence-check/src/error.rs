// Error types for the sequencing pipeline
//
// Codec errors are local to a frame and never stop the pipeline. Everything
// here is fatal once the workers are running.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Reading a source field or writing the output stream failed.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The inputs cannot be processed together; detected before workers start.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The JSON sidecar could not be parsed or serialised.
    #[error("Metadata error for {path:?}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Numbering decisions could not be serialised in claim order.
    #[error("Sequencing order broken: {0}")]
    Ordering(String),

    /// Another worker (or the caller) aborted the run.
    #[error("Processing aborted")]
    Aborted,
}

impl PipelineError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn ordering(message: impl Into<String>) -> Self {
        Self::Ordering(message.into())
    }

    /// Whether this error only reflects an abort raised somewhere else.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_context() {
        let err = PipelineError::io(
            "writing field 12",
            io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"),
        );
        let msg = err.to_string();
        assert!(msg.contains("writing field 12"));
        assert!(msg.contains("pipe closed"));
        assert!(!err.is_abort());
        assert!(PipelineError::Aborted.is_abort());
    }
}
