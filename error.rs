//! Error types for paired-end dereplication
//!
//! Every error is fatal for the run: a malformed record invalidates the
//! offset bookkeeping for everything after it, so there is no per-record
//! recovery.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the dereplication engine
#[derive(Error, Debug)]
pub enum DerepError {
    /// A header or separator line failed validation
    #[error("Malformed FASTQ in {stream}: {}", String::from_utf8_lossy(.line).trim_end())]
    Format { stream: String, line: Vec<u8> },

    /// FASTA input found where FASTQ was expected
    #[error("FASTA input is not supported ({stream})")]
    UnsupportedFormat { stream: String },

    /// The two passes disagreed about record boundaries
    #[error("Internal scanner state violated: {0}")]
    State(String),

    /// The output naming scheme would overwrite an input file
    #[error("Output path would overwrite input file: {}", .0.display())]
    OutputClobbersInput(PathBuf),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DerepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_shows_stream_and_line() {
        let err = DerepError::Format {
            stream: "R1.fastq".to_string(),
            line: b"read1\n".to_vec(),
        };
        assert_eq!(err.to_string(), "Malformed FASTQ in R1.fastq: read1");
    }

    #[test]
    fn io_errors_convert() {
        let err: DerepError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, DerepError::Io(_)));
    }
}
