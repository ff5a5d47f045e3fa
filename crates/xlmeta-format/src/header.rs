//! Record header
//!
//! ```text
//! +-------+-------+-------+---------------------+
//! | Magic | Major | Minor | Payload             |
//! | 4B    | u16LE | u16LE | layout set by minor |
//! +-------+-------+-------+---------------------+
//! ```
//!
//! Records written before numeric versioning carry the ASCII sentinel
//! `"1   "` in place of the two version fields; it always means (1, 0).

use crate::error::DecodeError;
use serde::Serialize;
use std::fmt;
use tracing::trace;

/// Magic bytes identifying a metadata record
pub const XL_MAGIC: [u8; 4] = *b"XL2 ";

/// Version bytes written before major/minor numbering existed
pub const XL_LEGACY_VERSION: [u8; 4] = *b"1   ";

/// Highest major version this implementation decodes
pub const XL_VERSION_MAJOR: u16 = 1;

/// Minor version written by this implementation
pub const XL_VERSION_MINOR: u16 = 3;

/// Size of the magic + version prefix
pub const XL_HEADER_LEN: usize = 8;

/// Major/minor pair read from a record header
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FormatVersion {
    pub major: u16,
    pub minor: u16,
}

impl FormatVersion {
    /// The version this implementation writes
    pub const CURRENT: Self = Self {
        major: XL_VERSION_MAJOR,
        minor: XL_VERSION_MINOR,
    };

    /// The version implied by the legacy sentinel
    pub const LEGACY: Self = Self { major: 1, minor: 0 };

    #[must_use]
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Encode as the 8-byte record prefix
    #[must_use]
    pub fn to_header_bytes(self) -> [u8; XL_HEADER_LEN] {
        let mut out = [0u8; XL_HEADER_LEN];
        out[..4].copy_from_slice(&XL_MAGIC);
        out[4..6].copy_from_slice(&self.major.to_le_bytes());
        out[6..8].copy_from_slice(&self.minor.to_le_bytes());
        out
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A recognised record prefix and the payload following it
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader<'a> {
    pub version: FormatVersion,
    pub payload: &'a [u8],
}

impl<'a> RecordHeader<'a> {
    /// Recognise the prefix without judging the major version
    ///
    /// Diagnostics use this to show the version and size of records written
    /// by a newer major revision, which [`validate`] refuses.
    pub fn parse(buf: &'a [u8]) -> Result<Self, DecodeError> {
        if buf.len() <= XL_HEADER_LEN {
            return Err(DecodeError::TooShort { len: buf.len() });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[..4]);
        if magic != XL_MAGIC {
            return Err(DecodeError::BadMagic { found: magic });
        }

        let version = if buf[4..8] == XL_LEGACY_VERSION {
            trace!("legacy version sentinel, treating as 1.0");
            FormatVersion::LEGACY
        } else {
            FormatVersion {
                major: u16::from_le_bytes([buf[4], buf[5]]),
                minor: u16::from_le_bytes([buf[6], buf[7]]),
            }
        };

        Ok(Self {
            version,
            payload: &buf[XL_HEADER_LEN..],
        })
    }

    /// Reject major versions newer than this implementation understands
    pub fn check_major(&self) -> Result<(), DecodeError> {
        if self.version.major > XL_VERSION_MAJOR {
            return Err(DecodeError::UnsupportedMajor {
                major: self.version.major,
                max: XL_VERSION_MAJOR,
            });
        }
        Ok(())
    }
}

/// Validate a record prefix and return the payload with its version
///
/// A major version newer than [`XL_VERSION_MAJOR`] fails with
/// [`DecodeError::UnsupportedMajor`] and the payload is not handed out here.
/// Diagnostics that still want it call [`RecordHeader::parse`], which returns
/// the same header and payload without judging the major version.
pub fn validate(buf: &[u8]) -> Result<RecordHeader<'_>, DecodeError> {
    let header = RecordHeader::parse(buf)?;
    header.check_major()?;
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: [u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut buf = XL_MAGIC.to_vec();
        buf.extend_from_slice(&version);
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_validate_returns_payload() {
        for minor in 0..=3u16 {
            let mut buf = FormatVersion::new(1, minor).to_header_bytes().to_vec();
            buf.extend_from_slice(b"payload bytes");

            let header = validate(&buf).unwrap();
            assert_eq!(header.version, FormatVersion::new(1, minor));
            assert_eq!(header.payload, b"payload bytes");
        }
    }

    #[test]
    fn test_too_short() {
        for len in 0..=XL_HEADER_LEN {
            let buf = FormatVersion::CURRENT.to_header_bytes();
            assert_eq!(
                validate(&buf[..len]),
                Err(DecodeError::TooShort { len }),
                "length {len}"
            );
        }
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = record([1, 0, 3, 0], b"x");
        buf[0] = b'Y';
        assert_eq!(
            validate(&buf),
            Err(DecodeError::BadMagic { found: *b"YL2 " })
        );
    }

    #[test]
    fn test_legacy_sentinel() {
        let buf = record(XL_LEGACY_VERSION, b"\x80");
        let header = validate(&buf).unwrap();
        assert_eq!(header.version, FormatVersion::LEGACY);
        assert_eq!(header.payload, b"\x80");
    }

    #[test]
    fn test_little_endian_fields() {
        let buf = record([0x01, 0x00, 0x02, 0x01], b"x");
        let header = RecordHeader::parse(&buf).unwrap();
        assert_eq!(header.version, FormatVersion::new(1, 0x0102));
    }

    #[test]
    fn test_unsupported_major() {
        let buf = record([2, 0, 0, 0], b"future");
        assert_eq!(
            validate(&buf),
            Err(DecodeError::UnsupportedMajor { major: 2, max: 1 })
        );

        // The payload stays reachable for diagnostics.
        let header = RecordHeader::parse(&buf).unwrap();
        assert_eq!(header.payload, b"future");
        assert!(header.check_major().is_err());
    }

    #[test]
    fn test_unsupported_major_payload_via_parse() {
        let buf = record([7, 0, 3, 0], b"newer layout");
        let err = validate(&buf).unwrap_err();
        assert!(err.is_unsupported());

        let header = RecordHeader::parse(&buf).unwrap();
        assert_eq!(header.version, FormatVersion::new(7, 3));
        assert_eq!(header.payload, b"newer layout");
        assert_eq!(
            header.check_major(),
            Err(DecodeError::UnsupportedMajor { major: 7, max: 1 })
        );
    }

    #[test]
    fn test_header_bytes() {
        assert_eq!(
            &FormatVersion::CURRENT.to_header_bytes(),
            b"XL2 \x01\x00\x03\x00"
        );
        assert_eq!(FormatVersion::CURRENT.to_string(), "1.3");
    }
}
