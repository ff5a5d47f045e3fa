//! Inline data store
//!
//! Small object bodies are kept inside the metadata record instead of in a
//! separate file, keyed by part identifier. The store is versioned on its
//! own:
//!
//! ```text
//! +---------+-----------------------------------------------+
//! | Version | map[str]bin  (count, then key/value pairs)    |
//! | 1B      |                                               |
//! +---------+-----------------------------------------------+
//! ```
//!
//! Version 0 means "no inline data" whatever follows it. An empty buffer is
//! also an empty store.
//!
//! [`InlineEntries`] walks the map in a single forward pass without copying;
//! [`InlineData`] wraps a validated store and is what records hand out.

use crate::error::DecodeError;
use crate::msgp::{self, Reader};
use std::borrow::Cow;
use std::collections::HashSet;

/// Highest inline store version this implementation decodes (and the one it
/// writes)
pub const INLINE_DATA_VERSION: u8 = 1;

/// Forward scan over an inline store's entries
///
/// Yields `(key, value)` pairs in stored order. The first error ends the
/// iteration.
#[derive(Clone, Debug)]
pub struct InlineEntries<'a> {
    reader: Reader<'a>,
    index: usize,
    remaining: u32,
    failed: bool,
}

impl<'a> InlineEntries<'a> {
    /// Check the version byte and read the map header
    pub fn new(buf: &'a [u8]) -> Result<Self, DecodeError> {
        let Some((&version, body)) = buf.split_first() else {
            return Ok(Self::empty());
        };
        match version {
            0 => Ok(Self::empty()),
            1..=INLINE_DATA_VERSION => {
                let mut reader = Reader::new(body);
                let remaining = reader
                    .read_map_len()
                    .map_err(DecodeError::MalformedInlineData)?;
                Ok(Self {
                    reader,
                    index: 0,
                    remaining,
                    failed: false,
                })
            }
            _ => Err(DecodeError::UnknownInlineVersion(version)),
        }
    }

    const fn empty() -> Self {
        Self {
            reader: Reader::new(&[]),
            index: 0,
            remaining: 0,
            failed: false,
        }
    }

    /// Number of entries not yet yielded, as declared by the map header
    #[must_use]
    pub const fn declared_remaining(&self) -> u32 {
        self.remaining
    }

    fn read_entry(&mut self) -> Result<(&'a str, &'a [u8]), DecodeError> {
        let key = self
            .reader
            .read_map_key()
            .map_err(DecodeError::MalformedInlineData)?;
        if key.is_empty() {
            return Err(DecodeError::EmptyInlineKey { index: self.index });
        }
        let key = std::str::from_utf8(key)
            .map_err(|_| DecodeError::MalformedInlineData(msgp::MsgpError::InvalidUtf8))?;
        let value = self
            .reader
            .read_bin()
            .map_err(DecodeError::MalformedInlineData)?;
        Ok((key, value))
    }
}

impl<'a> Iterator for InlineEntries<'a> {
    type Item = Result<(&'a str, &'a [u8]), DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }
        let entry = self.read_entry();
        match entry {
            Ok(_) => {
                self.remaining -= 1;
                self.index += 1;
            }
            Err(_) => self.failed = true,
        }
        Some(entry)
    }
}

/// A validated inline data store
///
/// Borrows the record buffer it was decoded from; [`InlineData::into_owned`]
/// detaches it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineData<'a> {
    raw: Cow<'a, [u8]>,
    count: usize,
}

impl<'a> InlineData<'a> {
    /// Validate `buf` as an inline store
    ///
    /// Scans every entry once: an unknown version, an empty key or a
    /// truncated value anywhere fails the whole store.
    pub fn parse(buf: &'a [u8]) -> Result<Self, DecodeError> {
        let mut count = 0usize;
        for entry in InlineEntries::new(buf)? {
            entry?;
            count += 1;
        }
        Ok(Self {
            raw: Cow::Borrowed(buf),
            count,
        })
    }

    /// A store with no entries
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            raw: Cow::Borrowed(&[]),
            count: 0,
        }
    }

    /// Serialise entries into a new store at the current version
    ///
    /// Keys must be non-empty and unique; later duplicates replace earlier
    /// ones.
    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Result<InlineData<'static>, DecodeError>
    where
        K: AsRef<str>,
        V: AsRef<[u8]>,
    {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        let mut builder = InlineDataBuilder::new();
        for (key, value) in &entries {
            builder.insert(key.as_ref(), value.as_ref())?;
        }
        Ok(builder.build())
    }

    /// Store version byte, 0 for an empty buffer
    #[must_use]
    pub fn version(&self) -> u8 {
        self.raw.first().copied().unwrap_or(0)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Encoded store bytes, exactly as found in (or written to) the record
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Full extraction: every key with its value bytes
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> + '_ {
        // Validated at construction, so the scan cannot fail here.
        InlineEntries::new(&self.raw)
            .into_iter()
            .flatten()
            .map_while(Result::ok)
    }

    /// Summary: every key with the length of its value
    pub fn sizes(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.iter().map(|(key, value)| (key, value.len()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Value stored under `key`
    #[must_use]
    pub fn find(&self, key: &str) -> Option<&[u8]> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Rewrite the store with `key` set to `value`
    ///
    /// An existing entry keeps its position; a new key is appended.
    pub fn with_entry(&self, key: &str, value: &[u8]) -> Result<InlineData<'static>, DecodeError> {
        let mut builder = InlineDataBuilder::new();
        let mut replaced = false;
        for (k, v) in self.iter() {
            if k == key {
                builder.insert(k, value)?;
                replaced = true;
            } else {
                builder.insert(k, v)?;
            }
        }
        if !replaced {
            builder.insert(key, value)?;
        }
        Ok(builder.build())
    }

    /// Rewrite the store without the given keys
    pub fn without<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> InlineData<'static> {
        let removed: HashSet<&str> = keys.into_iter().collect();
        let mut builder = InlineDataBuilder::new();
        for (k, v) in self.iter().filter(|(k, _)| !removed.contains(k)) {
            builder.push_unchecked(k, v);
        }
        builder.build()
    }

    /// Copy the store out of the source buffer
    #[must_use]
    pub fn into_owned(self) -> InlineData<'static> {
        InlineData {
            raw: Cow::Owned(self.raw.into_owned()),
            count: self.count,
        }
    }
}

impl Default for InlineData<'_> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builds an inline store at [`INLINE_DATA_VERSION`]
#[derive(Debug, Default)]
pub struct InlineDataBuilder<'b> {
    entries: Vec<(&'b str, &'b [u8])>,
}

impl<'b> InlineDataBuilder<'b> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add or replace an entry
    pub fn insert(&mut self, key: &'b str, value: &'b [u8]) -> Result<&mut Self, DecodeError> {
        if key.is_empty() {
            return Err(DecodeError::EmptyInlineKey {
                index: self.entries.len(),
            });
        }
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
        Ok(self)
    }

    fn push_unchecked(&mut self, key: &'b str, value: &'b [u8]) {
        self.entries.push((key, value));
    }

    /// Serialise the entries
    ///
    /// No entries produce an empty buffer rather than a bare version byte.
    ///
    /// # Panics
    ///
    /// Panics if there are more than `u32::MAX` entries.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(self) -> InlineData<'static> {
        if self.entries.is_empty() {
            return InlineData::empty();
        }
        let size: usize = self
            .entries
            .iter()
            .map(|(k, v)| k.len() + v.len() + 10)
            .sum();
        let mut buf = Vec::with_capacity(size + 6);
        buf.push(INLINE_DATA_VERSION);
        assert!(
            u32::try_from(self.entries.len()).is_ok(),
            "too many inline data entries"
        );
        msgp::write_map_len(&mut buf, self.entries.len() as u32);
        for (key, value) in &self.entries {
            msgp::write_str(&mut buf, key);
            msgp::write_bin(&mut buf, value);
        }
        InlineData {
            raw: Cow::Owned(buf),
            count: self.entries.len(),
        }
    }
}
