//! Call-site resolution
//!
//! Walks the current stack to find the first frame outside this crate, which is
//! the code that called a logging method. The result is rendered as
//! `<file> <line> <function>() [<thread-id>]`.
//!
//! Capturing and symbolizing frames is the most expensive step of a log call,
//! so the core only resolves a call site after the level check has passed.

use std::path::{Path, PathBuf};

/// Upper bound on captured frames per log call
pub const MAX_FRAMES: usize = 32;

/// Symbol prefix that marks a frame as belonging to this crate
const FACILITY_PREFIX: &str = concat!(env!("CARGO_CRATE_NAME"), "::");

/// Symbol prefix of the frame-capture machinery itself
const CAPTURE_PREFIX: &str = "backtrace::";

/// One symbolized stack frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// Demangled function path, without the trailing hash
    pub function: String,
    /// Source file, when debug info is available
    pub file: Option<PathBuf>,
    /// Source line, when debug info is available
    pub line: Option<u32>,
}

impl Frame {
    /// Create a frame from its parts
    pub fn new(function: impl Into<String>, file: Option<&str>, line: Option<u32>) -> Self {
        Self {
            function: function.into(),
            file: file.map(PathBuf::from),
            line,
        }
    }
}

/// Check whether a demangled symbol belongs to this crate.
///
/// Trait impls demangle as `<loglet::x::Y as core::fmt::Display>::fmt`, so the
/// leading `<` is ignored.
pub fn is_facility_symbol(function: &str) -> bool {
    function.trim_start_matches('<').starts_with(FACILITY_PREFIX)
}

/// Capture up to [`MAX_FRAMES`] symbolized frames, innermost first.
///
/// Inlined functions resolve to several symbols for one instruction pointer;
/// each symbol becomes its own frame.
pub fn capture_frames() -> Vec<Frame> {
    let mut frames = Vec::with_capacity(MAX_FRAMES);
    backtrace::trace(|raw| {
        backtrace::resolve_frame(raw, |symbol| {
            if frames.len() < MAX_FRAMES {
                frames.push(Frame {
                    function: symbol.name().map(|n| format!("{:#}", n)).unwrap_or_default(),
                    file: symbol.filename().map(Path::to_path_buf),
                    line: symbol.lineno(),
                });
            }
        });
        frames.len() < MAX_FRAMES
    });
    frames
}

/// Pick the index of the calling frame.
///
/// `frames` is ordered innermost first. The natural call site is the frame
/// right after the last one for which `is_facility` holds. A non-zero `offset`
/// shifts that index outward (positive) or inward (negative) when the shifted
/// index stays in bounds; otherwise the natural frame is kept.
///
/// Without any facility frame, the first frame that is not part of the capture
/// machinery is used.
pub fn locate<F>(frames: &[Frame], offset: isize, is_facility: F) -> Option<usize>
where
    F: Fn(&str) -> bool,
{
    if frames.is_empty() {
        return None;
    }
    let natural = match frames.iter().rposition(|f| is_facility(&f.function)) {
        Some(last) if last + 1 < frames.len() => last + 1,
        Some(last) => last,
        None => frames
            .iter()
            .position(|f| !f.function.starts_with(CAPTURE_PREFIX))
            .unwrap_or(0),
    };

    if offset != 0 {
        if let Some(shifted) = natural.checked_add_signed(offset) {
            if shifted < frames.len() {
                return Some(shifted);
            }
        }
    }
    Some(natural)
}

/// Render a frame as `<file> <line> <function>() [<thread-id>]`
pub fn describe(frame: Option<&Frame>, thread_id: &str) -> String {
    let Some(frame) = frame else {
        return format!("??? 0 ???() [{}]", thread_id);
    };
    let file = frame
        .file
        .as_deref()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "???".to_string());
    let function = if frame.function.is_empty() {
        "???"
    } else {
        frame.function.as_str()
    };
    format!(
        "{} {} {}() [{}]",
        file,
        frame.line.unwrap_or(0),
        function,
        thread_id
    )
}

/// Numeric id of the current thread
pub fn current_thread_id() -> String {
    // ThreadId only exposes its number through Debug: "ThreadId(7)".
    let id = format!("{:?}", std::thread::current().id());
    id.trim_start_matches("ThreadId(")
        .trim_end_matches(')')
        .to_string()
}

/// Resolve the descriptor of the code that called into this crate
pub fn resolve(offset: isize) -> String {
    let frames = capture_frames();
    let index = locate(&frames, offset, is_facility_symbol);
    describe(index.and_then(|i| frames.get(i)), &current_thread_id())
}
