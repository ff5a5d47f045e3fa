//! Metadata records
//!
//! A record is the 8-byte header followed by a payload whose layout is
//! picked by the minor version:
//!
//! | Minor | Payload                                               |
//! |-------|-------------------------------------------------------|
//! | 0     | one self-describing object                            |
//! | 1, 2  | bin(metadata), optional checksum, inline store        |
//! | 3     | bin(version index), optional checksum, inline store   |
//!
//! Decoding borrows the input buffer. [`MetadataRecord::into_owned`] detaches
//! a decoded record from it. Only the minor 3 layout is written.

use crate::error::DecodeError;
use crate::header::{self, FormatVersion, XL_HEADER_LEN};
use crate::index::{VersionEntry, VersionIndex};
use crate::inline::InlineData;
use crate::msgp::{self, Reader};
use crate::version::VersionHeader;
use std::borrow::Cow;
use tracing::{debug, trace};
use xlmeta_common::{ChecksumStatus, metadata_checksum};

/// Payload layout selected by a minor version
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadLayout {
    /// Minor 0
    Legacy,
    /// Minors 1 and 2
    SingleVersion,
    /// Minor 3
    MultiVersion,
}

impl PayloadLayout {
    pub const fn from_minor(minor: u16) -> Result<Self, DecodeError> {
        match minor {
            0 => Ok(Self::Legacy),
            1 | 2 => Ok(Self::SingleVersion),
            3 => Ok(Self::MultiVersion),
            other => Err(DecodeError::UnsupportedMinor(other)),
        }
    }
}

/// Decoded payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload<'a> {
    Legacy {
        metadata: Cow<'a, [u8]>,
    },
    SingleVersion {
        metadata: Cow<'a, [u8]>,
        checksum: Option<u32>,
        inline: InlineData<'a>,
    },
    MultiVersion {
        index: VersionIndex<'a>,
        index_blob: Cow<'a, [u8]>,
        checksum: Option<u32>,
        inline: InlineData<'a>,
    },
}

impl Payload<'_> {
    #[must_use]
    pub const fn layout(&self) -> PayloadLayout {
        match self {
            Self::Legacy { .. } => PayloadLayout::Legacy,
            Self::SingleVersion { .. } => PayloadLayout::SingleVersion,
            Self::MultiVersion { .. } => PayloadLayout::MultiVersion,
        }
    }

    #[must_use]
    pub fn into_owned(self) -> Payload<'static> {
        match self {
            Self::Legacy { metadata } => Payload::Legacy {
                metadata: Cow::Owned(metadata.into_owned()),
            },
            Self::SingleVersion {
                metadata,
                checksum,
                inline,
            } => Payload::SingleVersion {
                metadata: Cow::Owned(metadata.into_owned()),
                checksum,
                inline: inline.into_owned(),
            },
            Self::MultiVersion {
                index,
                index_blob,
                checksum,
                inline,
            } => Payload::MultiVersion {
                index: index.into_owned(),
                index_blob: Cow::Owned(index_blob.into_owned()),
                checksum,
                inline: inline.into_owned(),
            },
        }
    }
}

/// Decode a payload whose minor version is already known
pub fn decode_payload(payload: &[u8], minor: u16) -> Result<Payload<'_>, DecodeError> {
    let layout = PayloadLayout::from_minor(minor)?;
    trace!(minor, ?layout, len = payload.len(), "decoding payload");
    match layout {
        PayloadLayout::Legacy => decode_legacy(payload),
        PayloadLayout::SingleVersion => decode_single_version(payload, minor),
        PayloadLayout::MultiVersion => decode_multi_version(payload, minor),
    }
}

fn decode_legacy(payload: &[u8]) -> Result<Payload<'_>, DecodeError> {
    let mut r = Reader::new(payload);
    r.skip().map_err(DecodeError::MalformedMetadata)?;
    if !r.is_empty() {
        debug!(trailing = r.len(), "bytes after legacy metadata object");
    }
    Ok(Payload::Legacy {
        metadata: Cow::Borrowed(payload),
    })
}

/// First minor whose payload may carry a checksum after the leading blob
pub const CHECKSUM_MIN_MINOR: u16 = 2;

/// Read the leading blob and, when `minor` allows one, the optional checksum
/// after it
fn split_blob(payload: &[u8], minor: u16) -> Result<(&[u8], Option<u32>, &[u8]), DecodeError> {
    let mut r = Reader::new(payload);
    let blob = r.read_bin().map_err(DecodeError::MalformedMetadata)?;
    if minor < CHECKSUM_MIN_MINOR {
        return Ok((blob, None, r.remaining()));
    }
    let checksum = r.try_read_u32();
    if checksum.is_none() {
        debug!(minor, "no metadata checksum");
    }
    Ok((blob, checksum, r.remaining()))
}

fn decode_single_version(payload: &[u8], minor: u16) -> Result<Payload<'_>, DecodeError> {
    let (metadata, checksum, rest) = split_blob(payload, minor)?;
    let inline = InlineData::parse(rest)?;
    Ok(Payload::SingleVersion {
        metadata: Cow::Borrowed(metadata),
        checksum,
        inline,
    })
}

fn decode_multi_version(payload: &[u8], minor: u16) -> Result<Payload<'_>, DecodeError> {
    let (index_blob, checksum, rest) = split_blob(payload, minor)?;
    let inline = InlineData::parse(rest)?;
    let index = VersionIndex::decode(index_blob)?;
    Ok(Payload::MultiVersion {
        index,
        index_blob: Cow::Borrowed(index_blob),
        checksum,
        inline,
    })
}

/// A decoded metadata record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataRecord<'a> {
    pub version: FormatVersion,
    pub payload: Payload<'a>,
}

impl<'a> MetadataRecord<'a> {
    /// Validate the header and decode the payload
    pub fn decode(buf: &'a [u8]) -> Result<Self, DecodeError> {
        let header = header::validate(buf)?;
        let payload = decode_payload(header.payload, header.version.minor)?;
        let record = Self {
            version: header.version,
            payload,
        };
        if let ChecksumStatus::Mismatch { stored, computed } = record.checksum_status() {
            debug!(stored, computed, "metadata checksum mismatch");
        }
        Ok(record)
    }

    /// Stored checksum and the blob it covers
    fn checksummed(&self) -> Option<(Option<u32>, &[u8])> {
        match &self.payload {
            Payload::Legacy { .. } => None,
            Payload::SingleVersion {
                metadata, checksum, ..
            } => Some((*checksum, &**metadata)),
            Payload::MultiVersion {
                index_blob,
                checksum,
                ..
            } => Some((*checksum, &**index_blob)),
        }
    }

    /// Compare the stored checksum, if any, against the blob it covers
    #[must_use]
    pub fn checksum_status(&self) -> ChecksumStatus {
        self.checksummed()
            .map_or(ChecksumStatus::Absent, |(stored, blob)| {
                ChecksumStatus::check(stored, blob)
            })
    }

    /// Opaque metadata of a single-version record
    #[must_use]
    pub fn metadata(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Legacy { metadata } | Payload::SingleVersion { metadata, .. } => {
                Some(&**metadata)
            }
            Payload::MultiVersion { .. } => None,
        }
    }

    /// Version index of a multi-version record
    #[must_use]
    pub fn versions(&self) -> Option<&VersionIndex<'a>> {
        match &self.payload {
            Payload::MultiVersion { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Inline store; minor 0 records have none
    #[must_use]
    pub fn inline_data(&self) -> Option<&InlineData<'a>> {
        match &self.payload {
            Payload::Legacy { .. } => None,
            Payload::SingleVersion { inline, .. } | Payload::MultiVersion { inline, .. } => {
                Some(inline)
            }
        }
    }

    #[must_use]
    pub fn into_owned(self) -> MetadataRecord<'static> {
        MetadataRecord {
            version: self.version,
            payload: self.payload.into_owned(),
        }
    }

    /// Start a rewrite of a multi-version record
    ///
    /// `None` for the older layouts, which are never written back.
    #[must_use]
    pub fn to_builder(&self) -> Option<RecordBuilder> {
        match &self.payload {
            Payload::MultiVersion { index, inline, .. } => Some(RecordBuilder {
                index: index.clone().into_owned(),
                inline: inline.clone().into_owned(),
            }),
            _ => None,
        }
    }
}

/// Serialises records in the current layout
///
/// The checksum is always written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RecordBuilder {
    index: VersionIndex<'static>,
    inline: InlineData<'static>,
}

impl RecordBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a version at its sorted position, replacing one with the same ID
    pub fn add_version(&mut self, header: VersionHeader, metadata: Vec<u8>) -> &mut Self {
        self.index.insert(VersionEntry::new(header, metadata));
        self
    }

    pub fn remove_version(&mut self, version_id: &[u8; 16]) -> Option<VersionEntry<'static>> {
        self.index.remove(version_id)
    }

    pub fn set_inline(&mut self, inline: InlineData<'static>) -> &mut Self {
        self.inline = inline;
        self
    }

    #[must_use]
    pub const fn versions(&self) -> &VersionIndex<'static> {
        &self.index
    }

    #[must_use]
    pub const fn inline(&self) -> &InlineData<'static> {
        &self.inline
    }

    /// Encode the record
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let blob = self.index.encode();
        let crc = metadata_checksum(&blob);
        let inline = self.inline.as_bytes();

        let mut buf = Vec::with_capacity(XL_HEADER_LEN + blob.len() + inline.len() + 10);
        buf.extend_from_slice(&FormatVersion::CURRENT.to_header_bytes());
        msgp::write_bin(&mut buf, &blob);
        msgp::write_uint(&mut buf, u64::from(crc));
        buf.extend_from_slice(inline);
        trace!(
            versions = self.index.len(),
            inline = self.inline.len(),
            len = buf.len(),
            "encoded record"
        );
        buf
    }
}
