//! Rotated log file retention
//!
//! Rotated siblings of a base file `dir/app.log` are named
//! `dir/app.<YYYYMMDD_HHMMSS>.log`; other files sharing the stem are left
//! alone. Cleanup keeps the most recently modified `retain` of them and
//! deletes the rest.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::SinkError;
use crate::diagnostic::diagnostic;

/// Directory holding `base`, `.` for a bare file name
fn parent_dir(base: &Path) -> PathBuf {
    match base.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Check for a `YYYYMMDD_HHMMSS` rotation stamp
fn is_rotation_stamp(stamp: &str) -> bool {
    let bytes = stamp.as_bytes();
    bytes.len() == 15
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 => *b == b'_',
            _ => b.is_ascii_digit(),
        })
}

/// Check whether `name` is `<prefix><stamp><ext>`, a rotated sibling of `base_name`
fn is_rotated_sibling(name: &str, base_name: &str, prefix: &str, ext: &str) -> bool {
    name != base_name
        && name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(ext))
            .is_some_and(is_rotation_stamp)
}

/// List rotated siblings of `base` with their modification times,
/// oldest first. The live file itself is never included.
pub fn rotated_siblings(base: &Path) -> Result<Vec<(PathBuf, SystemTime)>, SinkError> {
    let Some(base_name) = base.file_name().and_then(|n| n.to_str()) else {
        return Ok(Vec::new());
    };
    let stem = base
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(base_name);
    let ext = base
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();
    let prefix = format!("{}.", stem);

    let dir = parent_dir(base);
    let entries = fs::read_dir(&dir).map_err(|e| SinkError::io("list", &dir, e))?;

    let mut siblings = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SinkError::io("list", &dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_rotated_sibling(name, base_name, &prefix, &ext) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        siblings.push((entry.path(), modified));
    }

    // Rotated names embed their timestamp, so the path breaks mtime ties in age order.
    siblings.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    Ok(siblings)
}

/// Delete the oldest rotated siblings of `base` beyond `retain`.
///
/// Nothing is deleted when there is at most one sibling or at most `retain`
/// of them. Individual deletion failures are reported and skipped.
///
/// Returns the number of files deleted.
pub fn cleanup_rotated_files(base: &Path, retain: usize) -> Result<usize, SinkError> {
    let siblings = rotated_siblings(base)?;
    if siblings.len() <= 1 || siblings.len() <= retain {
        return Ok(0);
    }

    let excess = siblings.len() - retain;
    let mut deleted_count = 0;
    for (path, _) in siblings.iter().take(excess) {
        match fs::remove_file(path) {
            Ok(()) => deleted_count += 1,
            Err(e) => diagnostic!("can not remove file <{}>: {}", path.display(), e),
        }
    }

    if deleted_count > 0 {
        tracing::debug!(
            "Removed {} rotated log files for {}",
            deleted_count,
            base.display()
        );
    }
    Ok(deleted_count)
}
