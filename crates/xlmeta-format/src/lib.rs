//! xlmeta Format - Versioned on-disk metadata records
//!
//! Every object keeps one metadata record per erasure set member. This crate
//! decodes and encodes those records:
//!
//! - Record header: magic, major and minor version
//! - Payload layouts for minors 0 through 3
//! - Version index and per-version headers
//! - Inline data store for small object bodies
//!
//! Decoding is pure and borrows the caller's buffer; call `into_owned` on a
//! decoded value to keep it past the buffer's lifetime.

pub mod document;
pub mod error;
pub mod header;
pub mod index;
pub mod inline;
pub mod msgp;
pub mod record;
pub mod version;

pub use document::{record_document, to_json};
pub use error::DecodeError;
pub use header::{FormatVersion, RecordHeader, validate};
pub use index::{VersionEntry, VersionIndex, decode_versions};
pub use inline::{InlineData, InlineDataBuilder, InlineEntries};
pub use record::{MetadataRecord, Payload, PayloadLayout, RecordBuilder, decode_payload};
pub use version::{VersionFlags, VersionHeader, VersionHeaderSummary, VersionType};
