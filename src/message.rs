//! Log message value

use chrono::{DateTime, Local};

use crate::level::Level;

/// Timestamp layout used at the start of every rendered line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A single log message, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    level: Level,
    timestamp: DateTime<Local>,
    call_site: String,
    text: String,
}

impl Message {
    /// Create a message stamped with the current local time
    pub fn new(level: Level, call_site: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_timestamp(level, Local::now(), call_site, text)
    }

    /// Create a message with an explicit timestamp
    pub fn with_timestamp(
        level: Level,
        timestamp: DateTime<Local>,
        call_site: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            level,
            timestamp,
            call_site: call_site.into(),
            text: text.into(),
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn call_site(&self) -> &str {
        &self.call_site
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Render the line shared by every sink:
    /// `<YYYY-MM-DD HH:MM:SS.mmm> <call-site> [<LEVEL>] <text>`
    pub fn render(&self) -> String {
        format!(
            "{} {} [{}] {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.call_site,
            self.level,
            self.text
        )
    }
}
