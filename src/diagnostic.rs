//! Internal diagnostic channel
//!
//! Failures inside the facility never reach the configured sinks or the caller.
//! They are written to stderr with a fixed prefix instead.

use std::fmt;
use std::io::Write;

/// Prefix of every diagnostic line
pub const DIAGNOSTIC_PREFIX: &str = "<loglet.error>";

/// Write one diagnostic line to stderr
pub fn report(args: fmt::Arguments<'_>) {
    #[cfg(test)]
    if capture::record(&args) {
        return;
    }
    let mut stderr = std::io::stderr().lock();
    // Nowhere left to report a failing stderr.
    let _ = writeln!(stderr, "{} {}", DIAGNOSTIC_PREFIX, args);
}

/// Format and report a diagnostic line
macro_rules! diagnostic {
    ($($arg:tt)+) => {
        $crate::diagnostic::report(format_args!($($arg)+))
    };
}

pub(crate) use diagnostic;
