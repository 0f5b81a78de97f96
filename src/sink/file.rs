//! Rotating file sink
//!
//! The sink appends to a single live file. Every [`ROTATE_CHECK_INTERVAL`]
//! writes it stats the live file; once it reaches the rotation size it is
//! renamed to `<stem>.<YYYYMMDD_HHMMSS><ext>` and the handle is dropped, so the
//! next write reopens a fresh file at the base path. Old rotated files are then
//! pruned down to the retention count.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::retention::cleanup_rotated_files;
use super::{Sink, SinkError};
use crate::diagnostic::diagnostic;
use crate::message::Message;

/// Default rotation size (100 MiB)
pub const DEFAULT_ROTATE_SIZE: u64 = 100 * 1024 * 1024;

/// Default number of rotated files to keep
pub const DEFAULT_RETAIN_COUNT: usize = 10;

/// Writes between two rotation checks
pub const ROTATE_CHECK_INTERVAL: u32 = 1000;

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

/// Path a rotated file is renamed to: `<stem>.<YYYYMMDD_HHMMSS><ext>`
pub fn rotated_path(base: &Path, now: DateTime<Local>) -> PathBuf {
    let stamp = now.format("%Y%m%d_%H%M%S");
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{}.{}.{}", stem, stamp, ext.to_string_lossy()),
        None => format!("{}.{}", stem, stamp),
    };
    base.with_file_name(name)
}

/// Append-only file sink with size-based rotation and count-based retention
#[derive(Debug)]
pub struct FileSink {
    base_path: PathBuf,
    rotate_size: u64,
    retain_count: usize,
    file: Option<File>,
    write_counter: u32,
}

impl FileSink {
    /// Create a sink for `base_path` with default rotation and retention.
    ///
    /// The file is not opened until the first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            rotate_size: DEFAULT_ROTATE_SIZE,
            retain_count: DEFAULT_RETAIN_COUNT,
            file: None,
            write_counter: 0,
        }
    }

    /// Set the rotation size in bytes; `0` restores the default
    pub fn with_rotate_size(mut self, bytes: u64) -> Self {
        self.rotate_size = if bytes == 0 { DEFAULT_ROTATE_SIZE } else { bytes };
        self
    }

    /// Set how many rotated files to keep; values outside `1..=999` fall back to the default
    pub fn with_retain_count(mut self, count: usize) -> Self {
        self.retain_count = if (1..1000).contains(&count) {
            count
        } else {
            DEFAULT_RETAIN_COUNT
        };
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn rotate_size(&self) -> u64 {
        self.rotate_size
    }

    pub fn retain_count(&self) -> usize {
        self.retain_count
    }

    /// Whether the live file handle is currently open
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Get the live file handle, opening it (and its directory) if needed
    fn live_file(&mut self) -> Result<&mut File, SinkError> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                if let Some(dir) = self.base_path.parent() {
                    if !dir.as_os_str().is_empty() && !dir.exists() {
                        fs::create_dir_all(dir)
                            .map_err(|e| SinkError::io("create log directory", dir, e))?;
                    }
                }
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.base_path)
                    .map_err(|e| SinkError::io("open log file", &self.base_path, e))?
            }
        };
        Ok(self.file.insert(file))
    }

    /// Rename the live file once it reaches the rotation size.
    ///
    /// Only a file this sink has opened is ever rotated, and an existing
    /// rotated file is never replaced. Returns whether a rotation happened.
    pub fn rotate_if_needed(&mut self) -> Result<bool, SinkError> {
        if self.file.is_none() {
            return Ok(false);
        }

        let metadata = match fs::metadata(&self.base_path) {
            Ok(metadata) => metadata,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    // Removed behind our back: reopen on the next write.
                    self.file = None;
                }
                return Err(SinkError::io("stat log file", &self.base_path, e));
            }
        };
        if metadata.len() < self.rotate_size {
            return Ok(false);
        }

        let target = rotated_path(&self.base_path, Local::now());
        if target.exists() {
            // Same second as the last rotation: retry at the next check.
            diagnostic!(
                "rotated file {} already exists. keep writing {}",
                target.display(),
                self.base_path.display()
            );
            return Ok(false);
        }
        self.close();
        fs::rename(&self.base_path, &target)
            .map_err(|e| SinkError::io("rename log file", &self.base_path, e))?;
        tracing::debug!(
            "Rotated {} -> {}",
            self.base_path.display(),
            target.display()
        );
        Ok(true)
    }

    /// Run the periodic rotation check and retention cleanup
    fn maintain(&mut self) {
        if let Err(e) = self.rotate_if_needed() {
            diagnostic!("{}", e);
        }
        if let Err(e) = cleanup_rotated_files(&self.base_path, self.retain_count) {
            diagnostic!("{}", e);
        }
    }

    fn append(&mut self, line: &str) -> Result<(), SinkError> {
        let file = self.live_file()?;
        file.write_all(line.as_bytes())
            .map_err(|e| SinkError::io("write log to", &self.base_path, e))
    }
}

impl Sink for FileSink {
    fn write(&mut self, message: &Message) {
        self.write_counter += 1;
        if self.write_counter >= ROTATE_CHECK_INTERVAL {
            self.write_counter = 0;
            self.maintain();
        }

        let mut line = message.render();
        line.push_str(LINE_ENDING);
        if let Err(e) = self.append(&line) {
            diagnostic!("{}", e);
        }
    }

    fn close(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.sync_all() {
                diagnostic!(
                    "can not close log file {}: {}",
                    self.base_path.display(),
                    e
                );
            }
        }
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        self.close();
    }
}
