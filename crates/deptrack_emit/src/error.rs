//! Error types for record emission and loading.

use std::path::PathBuf;

/// Errors that can occur while writing or reading records and manifests.
///
/// A failed write is never fatal for the batch: the coordinator marks the
/// file's record unavailable instead.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// An I/O error occurred while writing or reading a record.
    #[error("record I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A record file is not valid JSON or has malformed fields.
    #[error("failed to parse record {path}: {reason}")]
    Parse {
        /// The record file path.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// The record was written by an incompatible format version.
    #[error("version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The record file path.
        path: PathBuf,
        /// The format version this build reads.
        expected: u32,
        /// The format version found in the file.
        actual: u32,
    },
}
