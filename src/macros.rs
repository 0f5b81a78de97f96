//! Formatting macros
//!
//! Each macro checks the level before formatting, so disabled calls cost one
//! atomic load.
//!
//! ```ignore
//! loglet::info!(logger, "served {} in {}ms", path, elapsed);
//! loglet::error!(logger, "{}", err);
//! ```

/// Log a formatted message at an explicit level
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        let __logger = &$logger;
        let __level = $level;
        if __logger.enabled(__level) {
            __logger.log(__level, format_args!($($arg)+));
        }
    }};
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Debug, $($arg)+) };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Info, $($arg)+) };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Warn, $($arg)+) };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Error, $($arg)+) };
}

#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => { $crate::log!($logger, $crate::Level::Fatal, $($arg)+) };
}
