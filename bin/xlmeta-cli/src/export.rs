//! Inline data export
//!
//! Writes every inline value of a record to its own file, named after the
//! key. All targets are checked before the first write, every value is
//! staged under a hidden temporary name, and the staged files are renamed
//! into place only once all of them are on disk.

use std::path::{Path, PathBuf};
use tracing::{info, warn};
use xlmeta_common::{Error, Result};
use xlmeta_format::MetadataRecord;

use crate::commands::read_record;

/// Turn an inline key into a single safe file name
pub fn file_name(key: &str) -> String {
    let name: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match name.as_str() {
        "" | "." | ".." => "_".repeat(name.len().max(1)),
        _ => name,
    }
}

/// Hidden name a value is staged under before it is renamed to `target`
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    target.with_file_name(format!(".{name}.xlmeta-tmp"))
}

/// Remove staged files left behind by a failed export
fn discard(staged: &[PathBuf]) {
    for path in staged {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(file = %path.display(), "Failed to remove staged file: {}", e);
        }
    }
}

/// Export the inline values of the record at `path` into `dir`
///
/// Returns the files written, in stored order. A failure while staging
/// leaves no exported file behind. A failure while renaming returns
/// [`Error::ExportIncomplete`] naming the files already in place.
pub fn export_inline(
    path: &Path,
    dir: &Path,
    overwrite: bool,
    max_record_size: u64,
) -> Result<Vec<PathBuf>> {
    let buf = read_record(path, max_record_size)?;
    let record = MetadataRecord::decode(&buf)?;
    let Some(inline) = record.inline_data().filter(|d| !d.is_empty()) else {
        info!(path = %path.display(), "record has no inline data");
        return Ok(Vec::new());
    };

    let mut targets = Vec::with_capacity(inline.len());
    for (key, value) in inline.iter() {
        let target = dir.join(file_name(key));
        if targets.iter().any(|(t, _)| t == &target) {
            return Err(Error::invalid_argument(format!(
                "inline keys collide on {}",
                target.display()
            )));
        }
        if !overwrite && target.exists() {
            return Err(Error::ExportExists(target.display().to_string()));
        }
        targets.push((target, value));
    }

    std::fs::create_dir_all(dir)?;
    let mut staged = Vec::with_capacity(targets.len());
    for (target, value) in &targets {
        let tmp = staging_path(target);
        if let Err(e) = std::fs::write(&tmp, value) {
            discard(&staged);
            return Err(e.into());
        }
        staged.push(tmp);
    }

    let mut written = Vec::with_capacity(targets.len());
    for (idx, ((target, value), tmp)) in targets.into_iter().zip(&staged).enumerate() {
        if let Err(source) = std::fs::rename(tmp, &target) {
            discard(&staged[idx..]);
            return Err(Error::ExportIncomplete {
                written: written.iter().map(|p: &PathBuf| p.display().to_string()).collect(),
                source,
            });
        }
        info!(file = %target.display(), size = value.len(), "exported inline value");
        written.push(target);
    }
    Ok(written)
}
