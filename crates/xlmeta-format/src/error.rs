//! Decode errors for metadata records
//!
//! Every variant is terminal for the decode call that raised it. The only
//! condition absorbed silently is a missing trailing checksum.

use crate::msgp::MsgpError;
use thiserror::Error;
use xlmeta_common::Error as CommonError;

/// Errors raised while decoding a metadata record or one of its parts
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("record too short: {len} bytes, header needs more than 8")]
    TooShort { len: usize },

    #[error("bad magic {found:02x?}")]
    BadMagic { found: [u8; 4] },

    #[error("unsupported major version {major} (highest known {max})")]
    UnsupportedMajor { major: u16, max: u16 },

    #[error("unsupported minor version {0}")]
    UnsupportedMinor(u16),

    #[error("malformed metadata: {0}")]
    MalformedMetadata(MsgpError),

    #[error("malformed version index: {0}")]
    MalformedVersionIndex(MsgpError),

    #[error("unknown version header version {found} (highest known {max})")]
    UnknownHeaderVersion { found: u64, max: u64 },

    #[error("unknown version metadata version {found} (highest known {max})")]
    UnknownMetaVersion { found: u64, max: u64 },

    #[error("negative version count {0}")]
    NegativeVersionCount(i64),

    #[error("version header has {found} fields, expected {expected}")]
    ArityMismatch { expected: u32, found: u32 },

    #[error("version header truncated at {field}: {source}")]
    TruncatedHeader {
        field: &'static str,
        source: MsgpError,
    },

    #[error("malformed inline data: {0}")]
    MalformedInlineData(MsgpError),

    #[error("inline data entry {index} has an empty key")]
    EmptyInlineKey { index: usize },

    #[error("unknown inline data version {0}")]
    UnknownInlineVersion(u8),
}

impl DecodeError {
    /// True when the record was written by a newer format revision rather
    /// than damaged
    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMajor { .. }
                | Self::UnsupportedMinor(_)
                | Self::UnknownHeaderVersion { .. }
                | Self::UnknownMetaVersion { .. }
                | Self::UnknownInlineVersion(_)
        )
    }
}

impl From<DecodeError> for CommonError {
    fn from(e: DecodeError) -> Self {
        if e.is_unsupported() {
            CommonError::Unsupported(e.to_string())
        } else {
            CommonError::Corrupt(e.to_string())
        }
    }
}
