use std::path::PathBuf;

use crate::transform::TransformError;

/// The primary error type for all operations in the `blockpipe` crate.
#[derive(Debug)]
pub enum PipelineError {
    /// Failed to open a source or target file before the pipeline started.
    /// Includes the path where the error happened.
    Open { source: std::io::Error, path: PathBuf },

    /// An I/O error occurred while reading from the source stream.
    Read(std::io::Error),

    /// An I/O error occurred while writing to (or flushing) the target stream.
    Write(std::io::Error),

    /// A per-block transform failed. The sequence index identifies the block.
    Transform { seq: u64, source: TransformError },

    /// A length-prefixed record ended before its declared payload was read.
    TruncatedRecord { seq: u64 },

    /// A reader, writer or transform worker panicked.
    WorkerPanic,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Open { source, path } => {
                write!(f, "Cannot open '{}': {}", path.display(), source)
            }
            PipelineError::Read(e) => write!(f, "Source read error: {}", e),
            PipelineError::Write(e) => write!(f, "Target write error: {}", e),
            PipelineError::Transform { seq, source } => {
                write!(f, "Transform failed on block {}: {}", seq, source)
            }
            PipelineError::TruncatedRecord { seq } => {
                write!(f, "Record {} is truncated; the input ends mid-block", seq)
            }
            PipelineError::WorkerPanic => write!(f, "A pipeline worker thread panicked"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Open { source, .. } => Some(source),
            PipelineError::Read(e) => Some(e),
            PipelineError::Write(e) => Some(e),
            PipelineError::Transform { source, .. } => Some(source),
            _ => None,
        }
    }
}
