//! Version index
//!
//! Minor 3 records keep every retained object version (delete markers
//! included) in one index blob:
//!
//! ```text
//! headerVersion uint | metaVersion uint | count int | (header bin, meta bin) * count
//! ```
//!
//! Entries are stored newest first. Header bytes decode to a
//! [`VersionHeader`]; meta bytes are the full version metadata, opaque to
//! this module.

use crate::error::DecodeError;
use crate::msgp::{self, Reader};
use crate::version::VersionHeader;
use std::borrow::Cow;

/// Highest version header revision this implementation decodes
pub const XL_HEADER_VERSION: u64 = 2;

/// Highest version metadata envelope revision this implementation decodes
pub const XL_META_VERSION: u64 = 2;

/// Revisions found at the start of an index blob
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexRevisions {
    pub header_version: u64,
    pub meta_version: u64,
}

/// Walk an index blob, calling `f(index, header, metadata)` for each entry
/// in stored order
///
/// Entries already passed to `f` stay delivered if a later entry fails;
/// callers decide whether to keep them. An error returned by `f` aborts
/// the walk and is returned unchanged.
pub fn decode_versions<'a, F>(blob: &'a [u8], mut f: F) -> Result<IndexRevisions, DecodeError>
where
    F: FnMut(usize, &'a [u8], &'a [u8]) -> Result<(), DecodeError>,
{
    let mut r = Reader::new(blob);

    let header_version = r.read_uint().map_err(DecodeError::MalformedVersionIndex)?;
    if header_version > XL_HEADER_VERSION {
        return Err(DecodeError::UnknownHeaderVersion {
            found: header_version,
            max: XL_HEADER_VERSION,
        });
    }

    let meta_version = r.read_uint().map_err(DecodeError::MalformedVersionIndex)?;
    if meta_version > XL_META_VERSION {
        return Err(DecodeError::UnknownMetaVersion {
            found: meta_version,
            max: XL_META_VERSION,
        });
    }

    let count = r.read_int().map_err(DecodeError::MalformedVersionIndex)?;
    let count = u64::try_from(count).map_err(|_| DecodeError::NegativeVersionCount(count))?;

    for i in 0..count {
        let header = r.read_bin().map_err(DecodeError::MalformedVersionIndex)?;
        let metadata = r.read_bin().map_err(DecodeError::MalformedVersionIndex)?;
        // `i` is bounded by the entries actually present in `blob`.
        f(usize::try_from(i).unwrap_or(usize::MAX), header, metadata)?;
    }

    Ok(IndexRevisions {
        header_version,
        meta_version,
    })
}

/// One retained object version
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionEntry<'a> {
    pub header: VersionHeader,
    header_bytes: Cow<'a, [u8]>,
    metadata: Cow<'a, [u8]>,
}

impl<'a> VersionEntry<'a> {
    /// Build an owned entry for the write path
    #[must_use]
    pub fn new(header: VersionHeader, metadata: Vec<u8>) -> VersionEntry<'static> {
        VersionEntry {
            header,
            header_bytes: Cow::Owned(header.to_bytes()),
            metadata: Cow::Owned(metadata),
        }
    }

    /// Encoded header, as stored
    #[must_use]
    pub fn header_bytes(&self) -> &[u8] {
        &self.header_bytes
    }

    /// Encoded version metadata, as stored
    #[must_use]
    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    #[must_use]
    pub fn into_owned(self) -> VersionEntry<'static> {
        VersionEntry {
            header: self.header,
            header_bytes: Cow::Owned(self.header_bytes.into_owned()),
            metadata: Cow::Owned(self.metadata.into_owned()),
        }
    }
}

/// Decoded version index
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionIndex<'a> {
    pub revisions: IndexRevisions,
    entries: Vec<VersionEntry<'a>>,
}

impl Default for VersionIndex<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> VersionIndex<'a> {
    /// An empty index at the current revisions
    #[must_use]
    pub const fn new() -> Self {
        Self {
            revisions: IndexRevisions {
                header_version: XL_HEADER_VERSION,
                meta_version: XL_META_VERSION,
            },
            entries: Vec::new(),
        }
    }

    /// Decode an index blob, decoding every entry's header
    pub fn decode(blob: &'a [u8]) -> Result<Self, DecodeError> {
        let mut entries = Vec::new();
        let revisions = decode_versions(blob, |_, header_bytes, metadata| {
            let header = VersionHeader::decode(header_bytes)?;
            entries.push(VersionEntry {
                header,
                header_bytes: Cow::Borrowed(header_bytes),
                metadata: Cow::Borrowed(metadata),
            });
            Ok(())
        })?;
        Ok(Self { revisions, entries })
    }

    /// Encode the index blob (without the outer length prefix)
    ///
    /// Always written at the current revisions.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let size: usize = self
            .entries
            .iter()
            .map(|e| e.header_bytes.len() + e.metadata.len() + 10)
            .sum();
        let mut buf = Vec::with_capacity(size + 16);
        msgp::write_uint(&mut buf, XL_HEADER_VERSION);
        msgp::write_uint(&mut buf, XL_META_VERSION);
        msgp::write_int(&mut buf, i64::try_from(self.entries.len()).unwrap_or(i64::MAX));
        for entry in &self.entries {
            msgp::write_bin(&mut buf, &entry.header_bytes);
            msgp::write_bin(&mut buf, &entry.metadata);
        }
        buf
    }

    #[must_use]
    pub fn entries(&self) -> &[VersionEntry<'a>] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionEntry<'a>> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most recent version
    #[must_use]
    pub fn latest(&self) -> Option<&VersionEntry<'a>> {
        self.entries.first()
    }

    /// Version with the given ID
    #[must_use]
    pub fn find(&self, version_id: &[u8; 16]) -> Option<&VersionEntry<'a>> {
        self.entries
            .iter()
            .find(|e| &e.header.version_id == version_id)
    }

    /// Whether entries are in newest-first order
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.entries
            .windows(2)
            .all(|w| !w[1].header.sorts_before(&w[0].header))
    }

    /// Insert a version at its sorted position, replacing any version with
    /// the same ID
    pub fn insert(&mut self, entry: VersionEntry<'a>) {
        self.remove(&entry.header.version_id);
        let pos = self
            .entries
            .partition_point(|e| e.header.index_order(&entry.header).is_lt());
        self.entries.insert(pos, entry);
    }

    /// Remove the version with the given ID
    pub fn remove(&mut self, version_id: &[u8; 16]) -> Option<VersionEntry<'a>> {
        let pos = self
            .entries
            .iter()
            .position(|e| &e.header.version_id == version_id)?;
        Some(self.entries.remove(pos))
    }

    /// Restore newest-first order
    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| a.header.index_order(&b.header));
    }

    #[must_use]
    pub fn into_owned(self) -> VersionIndex<'static> {
        VersionIndex {
            revisions: self.revisions,
            entries: self
                .entries
                .into_iter()
                .map(VersionEntry::into_owned)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgp::MsgpError;
    use crate::version::{VersionFlags, VersionType};

    fn header(id: u8, mod_time: i64) -> VersionHeader {
        VersionHeader {
            version_id: [id; 16],
            mod_time,
            signature: [id; 4],
            version_type: VersionType::Object.as_u8(),
            flags: VersionFlags::default(),
        }
    }

    fn blob(header_version: u64, meta_version: u64, count: i64) -> Vec<u8> {
        let mut buf = Vec::new();
        msgp::write_uint(&mut buf, header_version);
        msgp::write_uint(&mut buf, meta_version);
        msgp::write_int(&mut buf, count);
        buf
    }

    #[test]
    fn test_index_roundtrip_preserves_order() {
        let mut index = VersionIndex::new();
        index.insert(VersionEntry::new(header(1, 100), b"meta-1".to_vec()));
        index.insert(VersionEntry::new(header(2, 300), b"meta-2".to_vec()));
        index.insert(VersionEntry::new(header(3, 200), b"meta-3".to_vec()));

        let encoded = index.encode();
        let decoded = VersionIndex::decode(&encoded).unwrap();

        let ids: Vec<u8> = decoded.iter().map(|e| e.header.version_id[0]).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(decoded.latest().unwrap().metadata(), b"meta-2");
        assert!(decoded.is_sorted());
        assert_eq!(decoded, index);
    }

    #[test]
    fn test_callback_receives_entries_in_order() {
        let mut buf = blob(XL_HEADER_VERSION, XL_META_VERSION, 2);
        msgp::write_bin(&mut buf, b"h0");
        msgp::write_bin(&mut buf, b"m0");
        msgp::write_bin(&mut buf, b"h1");
        msgp::write_bin(&mut buf, b"m1");

        let mut seen = Vec::new();
        let revisions = decode_versions(&buf, |i, h, m| {
            seen.push((i, h, m));
            Ok(())
        })
        .unwrap();

        assert_eq!(revisions.header_version, XL_HEADER_VERSION);
        assert_eq!(
            seen,
            vec![(0, &b"h0"[..], &b"m0"[..]), (1, &b"h1"[..], &b"m1"[..])]
        );
    }

    #[test]
    fn test_zero_count() {
        let buf = blob(XL_HEADER_VERSION, XL_META_VERSION, 0);
        let index = VersionIndex::decode(&buf).unwrap();
        assert!(index.is_empty());
        assert!(index.latest().is_none());
    }

    #[test]
    fn test_unknown_revisions() {
        let buf = blob(XL_HEADER_VERSION + 1, XL_META_VERSION, 0);
        assert_eq!(
            VersionIndex::decode(&buf),
            Err(DecodeError::UnknownHeaderVersion {
                found: XL_HEADER_VERSION + 1,
                max: XL_HEADER_VERSION
            })
        );

        let buf = blob(XL_HEADER_VERSION, XL_META_VERSION + 1, 0);
        assert!(matches!(
            VersionIndex::decode(&buf),
            Err(DecodeError::UnknownMetaVersion { .. })
        ));

        // Older revisions are accepted.
        assert!(VersionIndex::decode(&blob(1, 1, 0)).is_ok());
    }

    #[test]
    fn test_negative_count() {
        let buf = blob(XL_HEADER_VERSION, XL_META_VERSION, -1);
        assert_eq!(
            VersionIndex::decode(&buf),
            Err(DecodeError::NegativeVersionCount(-1))
        );
    }

    #[test]
    fn test_partial_delivery_on_truncation() {
        let mut buf = blob(XL_HEADER_VERSION, XL_META_VERSION, 3);
        msgp::write_bin(&mut buf, b"h0");
        msgp::write_bin(&mut buf, b"m0");
        msgp::write_bin(&mut buf, b"h1");

        let mut delivered = 0;
        let err = decode_versions(&buf, |_, _, _| {
            delivered += 1;
            Ok(())
        })
        .unwrap_err();

        assert_eq!(delivered, 1);
        assert!(matches!(
            err,
            DecodeError::MalformedVersionIndex(MsgpError::ShortBytes { .. })
        ));
    }

    #[test]
    fn test_missing_preamble() {
        assert!(matches!(
            VersionIndex::decode(&[]),
            Err(DecodeError::MalformedVersionIndex(_))
        ));
    }

    #[test]
    fn test_entry_header_arity_mismatch() {
        let mut bad_header = Vec::new();
        msgp::write_array_len(&mut bad_header, 4);
        msgp::write_bin(&mut bad_header, &[0u8; 16]);
        msgp::write_int(&mut bad_header, 1);
        msgp::write_bin(&mut bad_header, &[0u8; 4]);
        msgp::write_uint(&mut bad_header, 1);

        let mut buf = blob(XL_HEADER_VERSION, XL_META_VERSION, 1);
        msgp::write_bin(&mut buf, &bad_header);
        msgp::write_bin(&mut buf, b"meta");

        assert_eq!(
            VersionIndex::decode(&buf),
            Err(DecodeError::ArityMismatch {
                expected: 5,
                found: 4
            })
        );
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut index = VersionIndex::new();
        index.insert(VersionEntry::new(header(1, 100), b"old".to_vec()));
        index.insert(VersionEntry::new(header(1, 500), b"new".to_vec()));
        assert_eq!(index.len(), 1);
        assert_eq!(index.find(&[1; 16]).unwrap().metadata(), b"new");

        assert!(index.remove(&[1; 16]).is_some());
        assert!(index.remove(&[1; 16]).is_none());
    }

    #[test]
    fn test_sort_restores_order() {
        let mut index = VersionIndex::new();
        index.entries = vec![
            VersionEntry::new(header(1, 1), Vec::new()),
            VersionEntry::new(header(2, 3), Vec::new()),
            VersionEntry::new(header(3, 2), Vec::new()),
        ];
        assert!(!index.is_sorted());
        index.sort();
        assert!(index.is_sorted());
        assert_eq!(index.latest().unwrap().header.version_id, [2; 16]);
    }
}
