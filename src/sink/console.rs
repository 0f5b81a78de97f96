//! Console sink
//!
//! Unbuffered: ERROR and FATAL lines go to stderr, everything else to stdout.

use std::io::{self, Write};

use super::Sink;
use crate::diagnostic::diagnostic;
use crate::message::Message;

/// Writes rendered lines to the process's standard streams
pub struct ConsoleSink {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
}

impl ConsoleSink {
    /// Create a console sink bound to stdout and stderr
    pub fn new() -> Self {
        Self::with_writers(io::stdout(), io::stderr())
    }

    /// Create a console sink with custom streams for normal and severe lines
    pub fn with_writers(
        out: impl Write + Send + 'static,
        err: impl Write + Send + 'static,
    ) -> Self {
        Self {
            out: Box::new(out),
            err: Box::new(err),
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn write(&mut self, message: &Message) {
        let stream = if message.level().is_severe() {
            &mut self.err
        } else {
            &mut self.out
        };
        if let Err(e) = writeln!(stream, "{}", message.render()).and_then(|_| stream.flush()) {
            diagnostic!("can not write log to console: {}", e);
        }
    }

    fn close(&mut self) {}
}
