//! Per-file command implementations
//!
//! Each command handles one record file and returns the common error type
//! so the caller can pick an exit code. Output is written only after the
//! whole record has decoded.

use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};
use xlmeta_common::{ChecksumStatus, Error, Result};
use xlmeta_format::{MetadataRecord, record_document};

/// Effective settings after merging the config file and CLI arguments
#[derive(Clone, Debug)]
pub struct Settings {
    pub ndjson: bool,
    pub include_inline: bool,
    pub max_record_size: u64,
}

/// Read a whole record file, refusing files over `limit` bytes
pub fn read_record(path: &Path, limit: u64) -> Result<Vec<u8>> {
    let size = std::fs::metadata(path)?.len();
    if size > limit {
        return Err(Error::RecordTooLarge { size, limit });
    }
    debug!(path = %path.display(), size, "reading record");
    Ok(std::fs::read(path)?)
}

/// Print the record document
pub fn inspect(path: &Path, settings: &Settings, out: &mut impl Write) -> Result<()> {
    let buf = read_record(path, settings.max_record_size)?;
    let record = MetadataRecord::decode(&buf)?;
    let mut doc = record_document(&record, settings.include_inline)?;
    if let Value::Object(map) = &mut doc {
        map.insert("File".into(), Value::String(path.display().to_string()));
    }

    let text = if settings.ndjson {
        serde_json::to_string(&doc)
    } else {
        serde_json::to_string_pretty(&doc)
    }
    .map_err(|e| Error::Encoding(e.to_string()))?;
    writeln!(out, "{text}")?;
    Ok(())
}

/// Print one line per version header
pub fn versions(path: &Path, settings: &Settings, out: &mut impl Write) -> Result<()> {
    let buf = read_record(path, settings.max_record_size)?;
    let record = MetadataRecord::decode(&buf)?;

    let Some(index) = record.versions() else {
        writeln!(out, "No version index (format {})", record.version)?;
        return Ok(());
    };

    writeln!(
        out,
        "{:<4} {:<32} {:<30} {:<13} {:>5}",
        "IDX", "VERSION ID", "MOD TIME", "TYPE", "FLAGS"
    )?;
    writeln!(out, "{}", "-".repeat(88))?;
    for (idx, entry) in index.iter().enumerate() {
        let summary = entry.header.summary();
        writeln!(
            out,
            "{:<4} {:<32} {:<30} {:<13} {:>5}",
            idx, summary.version_id, summary.mod_time, summary.type_name, summary.flags
        )?;
    }
    Ok(())
}

/// Decode a record and check its stored checksum
pub fn verify(path: &Path, settings: &Settings) -> Result<ChecksumStatus> {
    let buf = read_record(path, settings.max_record_size)?;
    let record = MetadataRecord::decode(&buf)?;

    match record.checksum_status() {
        ChecksumStatus::Mismatch { stored, computed } => Err(Error::ChecksumMismatch {
            expected: stored,
            actual: computed,
        }),
        status => {
            info!(path = %path.display(), version = %record.version, ?status, "record verified");
            Ok(status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use xlmeta_format::{
        FormatVersion, InlineData, RecordBuilder, VersionFlags, VersionHeader, VersionType,
    };

    fn settings() -> Settings {
        Settings {
            ndjson: true,
            include_inline: true,
            max_record_size: 1 << 20,
        }
    }

    fn sample_record() -> Vec<u8> {
        let header = VersionHeader {
            version_id: [0x42; 16],
            mod_time: 1_700_000_000_000_000_000,
            signature: [9, 8, 7, 6],
            version_type: VersionType::Object.as_u8(),
            flags: VersionFlags(VersionFlags::INLINE_DATA),
        };
        let mut builder = RecordBuilder::new();
        builder
            .add_version(header, vec![0x80])
            .set_inline(InlineData::from_entries([("part.1", b"abc")]).unwrap());
        builder.build()
    }

    fn write_file(dir: &TempDir, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_inspect_ndjson() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "xl.meta", &sample_record());

        let mut out = Vec::new();
        inspect(&path, &settings(), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        let doc: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(doc["Minor"], 3);
        assert_eq!(doc["Versions"][0]["Metadata"], serde_json::json!({}));
        assert_eq!(doc["Inline"]["part.1"], 3);
        assert_eq!(doc["File"], path.display().to_string());
    }

    #[test]
    fn test_inspect_error_prints_nothing() {
        let dir = TempDir::new().unwrap();
        let mut buf = sample_record();
        buf.truncate(buf.len() - 2);
        let path = write_file(&dir, "xl.meta", &buf);

        let mut out = Vec::new();
        let err = inspect(&path, &settings(), &mut out).unwrap_err();
        assert!(err.is_corruption());
        assert!(out.is_empty());
    }

    #[test]
    fn test_inspect_undecodable_metadata_prints_nothing() {
        let dir = TempDir::new().unwrap();
        let mut buf = FormatVersion::new(1, 1).to_header_bytes().to_vec();
        // bin8 holding a reserved marker, then no inline data
        buf.extend_from_slice(&[0xc4, 0x02, 0xc1, 0x00]);
        let path = write_file(&dir, "xl.meta", &buf);

        let mut out = Vec::new();
        let err = inspect(&path, &settings(), &mut out).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
        assert_eq!(err.exit_code(), 2);
        assert!(out.is_empty());
    }

    #[test]
    fn test_record_size_limit() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "xl.meta", &sample_record());

        let limited = Settings {
            max_record_size: 8,
            ..settings()
        };
        let err = verify(&path, &limited).unwrap_err();
        assert!(matches!(err, Error::RecordTooLarge { limit: 8, .. }));
    }

    #[test]
    fn test_versions_table() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "xl.meta", &sample_record());

        let mut out = Vec::new();
        versions(&path, &settings(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[2].contains(&"42".repeat(16)));
        assert!(rows[2].contains("2023-11-14T22:13:20.000000000Z"));
        assert!(rows[2].contains("object"));
    }

    #[test]
    fn test_versions_single_version_record() {
        let dir = TempDir::new().unwrap();
        let mut buf = FormatVersion::new(1, 0).to_header_bytes().to_vec();
        buf.push(0x80);
        let path = write_file(&dir, "xl.meta", &buf);

        let mut out = Vec::new();
        versions(&path, &settings(), &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No version index (format 1.0)\n");
    }

    #[test]
    fn test_verify() {
        let dir = TempDir::new().unwrap();
        let good = write_file(&dir, "good", &sample_record());
        assert_eq!(verify(&good, &settings()).unwrap(), ChecksumStatus::Valid);

        // Flip a byte inside the index blob.
        let mut buf = sample_record();
        buf[20] ^= 0x01;
        let bad = write_file(&dir, "bad", &buf);
        let err = verify(&bad, &settings()).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }) || err.is_corruption());
        assert_eq!(err.exit_code(), 2);

        let missing = dir.path().join("missing");
        assert!(matches!(
            verify(&missing, &settings()),
            Err(Error::DiskIo(_))
        ));
    }

    #[test]
    fn test_unsupported_exit_code() {
        let dir = TempDir::new().unwrap();
        let mut buf = sample_record();
        buf[6] = 9;
        let path = write_file(&dir, "xl.meta", &buf);

        let err = verify(&path, &settings()).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
        assert_eq!(err.exit_code(), 3);
    }
}
