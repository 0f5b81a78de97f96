//! Loglet - buffered, leveled in-process logging
//!
//! Log calls are filtered by level, tagged with their call site and handed to
//! a background worker that fans them out to the configured sinks: the
//! console and a size-rotated file.

pub mod callsite;
pub mod config;
pub mod diagnostic;
pub mod level;
pub mod logger;
pub mod logger_core;
mod macros;
pub mod message;
pub mod sink;
pub mod wrapper;

pub use config::{ConfigError, LoggerConfig, WriterKind};
pub use level::Level;
pub use logger::Logger;
pub use logger_core::LoggerCore;
pub use message::Message;
pub use sink::{ConsoleSink, FileSink, Sink, SinkError};
pub use wrapper::RequestLogger;
