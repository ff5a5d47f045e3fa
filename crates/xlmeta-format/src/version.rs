//! Per-version header records
//!
//! Each entry of a version index starts with a compact header that lets
//! readers list, sort and compare versions without decoding the full
//! version metadata. On the wire it is a MessagePack array of exactly five
//! fields:
//!
//! ```text
//! [ versionID bin(16), modTime int64 (ns), signature bin(4), type u8, flags u8 ]
//! ```
//!
//! New fields require a new arity, never a silent append.

use crate::error::DecodeError;
use crate::msgp::{self, MsgpError, Reader};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Number of fields in an encoded version header
pub const VERSION_HEADER_ARITY: u32 = 5;

/// Kind of object version a header describes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum VersionType {
    Invalid,
    Object,
    DeleteMarker,
    Legacy,
}

impl VersionType {
    /// Interpret the raw discriminant, `None` for values this build does
    /// not know
    #[must_use]
    pub const fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Invalid),
            1 => Some(Self::Object),
            2 => Some(Self::DeleteMarker),
            3 => Some(Self::Legacy),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Object => 1,
            Self::DeleteMarker => 2,
            Self::Legacy => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Object => "object",
            Self::DeleteMarker => "delete-marker",
            Self::Legacy => "legacy",
        }
    }
}

/// Version header flag bits
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct VersionFlags(pub u8);

impl VersionFlags {
    /// Version kept only to track space of a tiered (freed) object
    pub const FREE_VERSION: u8 = 1 << 0;
    /// Object data lives in a data directory next to the record
    pub const USES_DATA_DIR: u8 = 1 << 1;
    /// Object data is stored in the record's inline data
    pub const INLINE_DATA: u8 = 1 << 2;

    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, bit: u8) -> bool {
        self.0 & bit == bit
    }

    #[must_use]
    pub const fn is_free_version(self) -> bool {
        self.contains(Self::FREE_VERSION)
    }

    #[must_use]
    pub const fn uses_data_dir(self) -> bool {
        self.contains(Self::USES_DATA_DIR)
    }

    #[must_use]
    pub const fn has_inline_data(self) -> bool {
        self.contains(Self::INLINE_DATA)
    }
}

fn truncated(field: &'static str) -> impl FnOnce(MsgpError) -> DecodeError {
    move |source| DecodeError::TruncatedHeader { field, source }
}

/// Decoded per-version header
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VersionHeader {
    /// Unique identifier of this object version
    pub version_id: [u8; 16],
    /// Modification time, nanoseconds since the Unix epoch
    pub mod_time: i64,
    /// Content fingerprint for fast equality checks across drives
    pub signature: [u8; 4],
    /// Raw type discriminant, see [`VersionType`]
    pub version_type: u8,
    pub flags: VersionFlags,
}

impl VersionHeader {
    /// Decode a header from its encoded bytes
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(buf);
        let header = Self::read(&mut r)?;
        Ok(header)
    }

    /// Decode a header from the front of `r`, consuming it
    pub fn read(r: &mut Reader<'_>) -> Result<Self, DecodeError> {
        let arity = r.read_array_len().map_err(truncated("arity"))?;
        if arity != VERSION_HEADER_ARITY {
            return Err(DecodeError::ArityMismatch {
                expected: VERSION_HEADER_ARITY,
                found: arity,
            });
        }

        let version_id = r.read_bin_array::<16>().map_err(truncated("version_id"))?;
        let mod_time = r.read_int().map_err(truncated("mod_time"))?;
        let signature = r.read_bin_array::<4>().map_err(truncated("signature"))?;
        let version_type = r.read_u8().map_err(truncated("type"))?;
        let flags = r.read_u8().map_err(truncated("flags"))?;

        Ok(Self {
            version_id,
            mod_time,
            signature,
            version_type,
            flags: VersionFlags(flags),
        })
    }

    /// Append the encoded header to `dst`
    pub fn encode_into(&self, dst: &mut Vec<u8>) {
        msgp::write_array_len(dst, VERSION_HEADER_ARITY);
        msgp::write_bin(dst, &self.version_id);
        msgp::write_int(dst, self.mod_time);
        msgp::write_bin(dst, &self.signature);
        msgp::write_uint(dst, u64::from(self.version_type));
        msgp::write_uint(dst, u64::from(self.flags.0));
    }

    /// Encode the header into a new buffer
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        self.encode_into(&mut buf);
        buf
    }

    /// Interpreted version type, `None` when the discriminant is unknown
    #[must_use]
    pub const fn kind(&self) -> Option<VersionType> {
        VersionType::from_u8(self.version_type)
    }

    /// True for a version whose ID is all zeroes (the "null" version)
    #[must_use]
    pub fn is_null_version(&self) -> bool {
        self.version_id == [0u8; 16]
    }

    /// Modification time as a calendar timestamp
    #[must_use]
    pub fn mod_time_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_nanos(self.mod_time)
    }

    /// Whether this version is ordered before `other` in a version index
    ///
    /// Newest first; equal times fall back to the version ID so that every
    /// drive derives the same order.
    #[must_use]
    pub fn sorts_before(&self, other: &Self) -> bool {
        self.index_order(other) == Ordering::Less
    }

    pub(crate) fn index_order(&self, other: &Self) -> Ordering {
        other
            .mod_time
            .cmp(&self.mod_time)
            .then_with(|| other.version_id.cmp(&self.version_id))
    }

    /// Human-readable projection for diagnostics
    #[must_use]
    pub fn summary(&self) -> VersionHeaderSummary {
        VersionHeaderSummary {
            version_id: hex::encode(self.version_id),
            mod_time: self
                .mod_time_utc()
                .to_rfc3339_opts(SecondsFormat::Nanos, true),
            signature: hex::encode(self.signature),
            version_type: self.version_type,
            type_name: self.kind().map_or("unknown", VersionType::as_str),
            flags: self.flags.0,
        }
    }
}

impl fmt::Display for VersionHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}",
            hex::encode(self.version_id),
            self.mod_time_utc().to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.kind().map_or("unknown", VersionType::as_str)
        )
    }
}

/// Rendered form of a [`VersionHeader`]
///
/// Regenerated from the header whenever it is displayed; never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VersionHeaderSummary {
    #[serde(rename = "VersionID")]
    pub version_id: String,
    pub mod_time: String,
    pub signature: String,
    #[serde(rename = "Type")]
    pub version_type: u8,
    #[serde(rename = "TypeName")]
    pub type_name: &'static str,
    pub flags: u8,
}
