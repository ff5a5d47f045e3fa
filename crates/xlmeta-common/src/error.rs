//! Error types for xlmeta
//!
//! This module defines the common error type used by the codec's callers
//! and the diagnostic tooling.

use thiserror::Error;

/// Common result type for xlmeta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for xlmeta
#[derive(Debug, Error)]
pub enum Error {
    #[error("disk I/O error: {0}")]
    DiskIo(#[from] std::io::Error),

    #[error("metadata record too large: {size} bytes (limit {limit})")]
    RecordTooLarge { size: u64, limit: u64 },

    // Format errors
    #[error("corrupt metadata record: {0}")]
    Corrupt(String),

    #[error("unsupported metadata format: {0}")]
    Unsupported(String),

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("encoding error: {0}")]
    Encoding(String),

    // Tooling errors
    #[error("export target already exists: {0}")]
    ExportExists(String),

    #[error("export stopped after writing {written:?}: {source}")]
    ExportIncomplete {
        written: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create a corruption error
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if the record on this drive should be repaired from its peers
    ///
    /// Unsupported formats are not corruption: a newer writer produced them
    /// and rewriting would lose data.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupt(_) | Self::ChecksumMismatch { .. })
    }

    /// Process exit code used by the command line tooling
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Corrupt(_) | Self::ChecksumMismatch { .. } => 2,
            Self::Unsupported(_) => 3,
            Self::InvalidArgument(_) | Self::Configuration(_) => 64,
            Self::DiskIo(_)
            | Self::RecordTooLarge { .. }
            | Self::Encoding(_)
            | Self::ExportExists(_)
            | Self::ExportIncomplete { .. } => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_corruption() {
        assert!(Error::corrupt("bad").is_corruption());
        assert!(
            Error::ChecksumMismatch {
                expected: 1,
                actual: 2
            }
            .is_corruption()
        );
        assert!(!Error::Unsupported("major 2".into()).is_corruption());
        assert!(!Error::invalid_argument("x").is_corruption());
    }

    #[test]
    fn test_error_exit_code() {
        assert_eq!(Error::corrupt("bad").exit_code(), 2);
        assert_eq!(Error::Unsupported("minor 9".into()).exit_code(), 3);
        assert_eq!(Error::configuration("x").exit_code(), 64);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(Error::from(io).exit_code(), 1);
    }

    #[test]
    fn test_export_incomplete_names_written_files() {
        let err = Error::ExportIncomplete {
            written: vec!["out/part.1".into()],
            source: std::io::Error::other("is a directory"),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(!err.is_corruption());
        assert_eq!(
            err.to_string(),
            "export stopped after writing [\"out/part.1\"]: is a directory"
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::ChecksumMismatch {
            expected: 0xdead_beef,
            actual: 0x1,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch: expected 0xdeadbeef, got 0x00000001"
        );
    }
}
