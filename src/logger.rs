//! Logger façade
//!
//! Combines a [`LoggerCore`] with sink construction from configuration.

use std::collections::HashMap;
use std::fmt::Display;

use crate::config::{LoggerConfig, WriterKind};
use crate::diagnostic::diagnostic;
use crate::level::Level;
use crate::logger_core::{LoggerCore, BUFFER_CAPACITY};
use crate::sink::{ConsoleSink, FileSink, Sink};

/// A configured logger
pub struct Logger {
    core: LoggerCore,
}

impl Logger {
    /// Create a logger writing everything to the console
    pub fn new() -> Self {
        Self::with_config(&LoggerConfig::default())
    }

    /// Create a logger from a flat option map
    pub fn from_options(options: &HashMap<String, String>) -> Self {
        Self::with_config(&LoggerConfig::from_options(options))
    }

    /// Create a logger from a typed configuration
    pub fn with_config(config: &LoggerConfig) -> Self {
        let logger = Self {
            core: LoggerCore::new(),
        };
        logger.init_with(config);
        logger
    }

    /// Re-initialize from a flat option map.
    ///
    /// See [`Logger::init_with`].
    pub fn init(&self, options: &HashMap<String, String>) {
        self.init_with(&LoggerConfig::from_options(options));
    }

    /// Re-initialize from a typed configuration.
    ///
    /// The current buffer is closed and drained and the current sinks are
    /// closed before the new buffer opens with the new sinks in place.
    pub fn init_with(&self, config: &LoggerConfig) {
        let mut sinks: HashMap<String, Box<dyn Sink>> = HashMap::new();
        for kind in &config.writers {
            if let Some(sink) = build_sink(*kind, config) {
                if let Some(mut previous) = sinks.insert(kind.name().to_string(), sink) {
                    previous.close();
                }
            }
        }
        if sinks.is_empty() {
            sinks.insert(
                WriterKind::Console.name().to_string(),
                Box::new(ConsoleSink::new()),
            );
        }
        let sink_count = sinks.len();

        self.core.set_threshold(config.level);
        self.core.open_with_sinks(BUFFER_CAPACITY, sinks);
        tracing::debug!(
            "Logger initialized at {} with {} writer(s)",
            config.level,
            sink_count
        );
    }

    /// Close the buffer and every sink, waiting for buffered messages
    pub fn close(&self) {
        self.core.close();
    }

    /// The underlying core
    pub fn core(&self) -> &LoggerCore {
        &self.core
    }

    pub fn level(&self) -> Level {
        self.core.level()
    }

    /// Set the level threshold by name; an unknown name is reported and ignored
    pub fn set_level(&self, name: &str) {
        if let Err(e) = self.core.set_level(name) {
            diagnostic!("{}. keep level: {}", e, self.core.level());
        }
    }

    pub fn set_position_offset(&self, offset: isize) {
        self.core.set_position_offset(offset);
    }

    pub fn enabled(&self, level: Level) -> bool {
        self.core.enabled(level)
    }

    pub fn log(&self, level: Level, content: impl Display) {
        self.core.log(level, content);
    }

    pub fn debug(&self, content: impl Display) {
        self.core.log(Level::Debug, content);
    }

    pub fn info(&self, content: impl Display) {
        self.core.log(Level::Info, content);
    }

    pub fn warn(&self, content: impl Display) {
        self.core.log(Level::Warn, content);
    }

    /// Log at ERROR; error values log their message
    pub fn error(&self, content: impl Display) {
        self.core.log(Level::Error, content);
    }

    pub fn fatal(&self, content: impl Display) {
        self.core.log(Level::Fatal, content);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the sink for one configured writer
fn build_sink(kind: WriterKind, config: &LoggerConfig) -> Option<Box<dyn Sink>> {
    match kind {
        WriterKind::Console => Some(Box::new(ConsoleSink::new())),
        WriterKind::File => {
            let Some(path) = &config.log_file else {
                diagnostic!("file writer requested without a log file. skipped");
                return None;
            };
            let sink = FileSink::new(path)
                .with_rotate_size(config.max_size)
                .with_retain_count(config.file_number);
            Some(Box::new(sink))
        }
    }
}
