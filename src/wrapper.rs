//! Request-scoped logging
//!
//! Prefixes every message with a request id so interleaved requests can be
//! told apart in the output.

use std::fmt::Display;
use std::sync::Arc;

use crate::level::Level;
use crate::logger::Logger;

/// Placeholder used when a request has no id
pub const NO_REQUEST_ID: &str = "<no-request-id>";

/// Wraps a shared [`Logger`] and tags messages with a request id.
///
/// The wrapper lives in this crate, so the reported call site is the caller
/// of the wrapper without any position offset.
#[derive(Clone)]
pub struct RequestLogger {
    logger: Arc<Logger>,
}

impl RequestLogger {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }

    /// Replace the wrapped logger
    pub fn set_logger(&mut self, logger: Arc<Logger>) {
        self.logger = logger;
    }

    /// The wrapped logger
    pub fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    /// Log `content` at `level`, prefixed with `request_id`
    pub fn log(&self, level: Level, request_id: &str, content: impl Display) {
        if !self.logger.enabled(level) {
            return;
        }
        self.logger.log(level, tagged(request_id, content));
    }

    pub fn debug(&self, request_id: &str, content: impl Display) {
        self.log(Level::Debug, request_id, content);
    }

    pub fn info(&self, request_id: &str, content: impl Display) {
        self.log(Level::Info, request_id, content);
    }

    pub fn warn(&self, request_id: &str, content: impl Display) {
        self.log(Level::Warn, request_id, content);
    }

    pub fn error(&self, request_id: &str, content: impl Display) {
        self.log(Level::Error, request_id, content);
    }

    pub fn fatal(&self, request_id: &str, content: impl Display) {
        self.log(Level::Fatal, request_id, content);
    }
}

/// `<request-id> <content>`, with a placeholder for an empty id
fn tagged(request_id: &str, content: impl Display) -> String {
    let request_id = if request_id.is_empty() {
        NO_REQUEST_ID
    } else {
        request_id
    };
    format!("{} {}", request_id, content)
}
