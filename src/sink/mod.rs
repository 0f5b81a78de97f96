//! Sinks: destinations that render messages
//!
//! Every sink shares the same capability set: write a message, close. The core
//! keeps registered sinks in a name-keyed registry owned by its dispatch worker.

mod console;
mod file;
mod retention;

use std::path::PathBuf;

use thiserror::Error;

use crate::message::Message;

pub use console::ConsoleSink;
pub use file::{
    rotated_path, FileSink, DEFAULT_RETAIN_COUNT, DEFAULT_ROTATE_SIZE, ROTATE_CHECK_INTERVAL,
};
pub use retention::{cleanup_rotated_files, rotated_siblings};

/// Registry name of the console sink
pub const CONSOLE_SINK: &str = "console";
/// Registry name of the file sink
pub const FILE_SINK: &str = "file";

/// A destination for rendered messages
pub trait Sink: Send {
    /// Render and write one message. Failures are reported through the
    /// diagnostic channel, never to the caller.
    fn write(&mut self, message: &Message);

    /// Release any held resources. Closing twice is a no-op.
    fn close(&mut self);
}

/// Filesystem failure inside a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("can not {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SinkError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SinkError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether the failure was caused by a missing file
    pub fn is_not_found(&self) -> bool {
        match self {
            SinkError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
        }
    }
}
