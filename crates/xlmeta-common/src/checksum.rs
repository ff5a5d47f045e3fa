//! Checksum utilities for metadata records
//!
//! Records from minor 2 on may carry a 32-bit checksum of the metadata (or
//! version index) blob: xxHash64 with seed 0, truncated to the low 32 bits.

use serde::{Deserialize, Serialize};

/// Compute the stored checksum for a metadata blob
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn metadata_checksum(data: &[u8]) -> u32 {
    xxhash_rust::xxh64::xxh64(data, 0) as u32
}

/// Outcome of comparing a stored checksum against the blob it covers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ChecksumStatus {
    /// Record predates checksums, or the field was not written
    Absent,
    /// Stored value matches the blob
    Valid,
    /// Stored value does not match the blob
    Mismatch { stored: u32, computed: u32 },
}

impl ChecksumStatus {
    /// Compare an optional stored checksum against `data`
    #[must_use]
    pub fn check(stored: Option<u32>, data: &[u8]) -> Self {
        match stored {
            None => Self::Absent,
            Some(stored) => {
                let computed = metadata_checksum(data);
                if stored == computed {
                    Self::Valid
                } else {
                    Self::Mismatch { stored, computed }
                }
            }
        }
    }

    /// True unless a stored checksum disagrees with the data
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        !matches!(self, Self::Mismatch { .. })
    }
}
