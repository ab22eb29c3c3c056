// Call-stack capture for wrapped errors
use std::fmt;
use std::path::Path;

pub const MAX_FRAMES: usize = 10;

/// Wrapping entry points sitting directly above the capture; skipped so the
/// first frame is the caller that asked for the stack.
const INTERNAL_MARKERS: &[&str] = &[
    "capture_stack",
    "ContextualError::with_stack",
    "wrap_stack",
    "handle_with_recovery",
    "recovered_panic",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} {}", self.file, self.line, self.function)
    }
}

/// Captures up to [`MAX_FRAMES`] frames above the wrapping call.
///
/// Frames without symbol information are dropped, so a stripped binary
/// yields an empty stack rather than placeholders.
#[inline(never)]
pub fn capture_stack() -> Vec<StackFrame> {
    let trace = backtrace::Backtrace::new();

    let frames: Vec<StackFrame> = trace
        .frames()
        .iter()
        .flat_map(|frame| frame.symbols())
        .filter_map(|symbol| {
            let function = format!("{:#}", symbol.name()?);
            let file = symbol.filename()?;
            let line = symbol.lineno()?;
            let file = Path::new(file)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            Some(StackFrame {
                file,
                line,
                function,
            })
        })
        .collect();

    frames
        .into_iter()
        .skip_while(|frame| !frame.function.contains("capture_stack"))
        .skip_while(|frame| {
            INTERNAL_MARKERS
                .iter()
                .any(|marker| frame.function.contains(marker))
        })
        .take(MAX_FRAMES)
        .collect()
}

pub fn render_stack(frames: &[StackFrame]) -> String {
    frames
        .iter()
        .map(|frame| format!("  at {frame}"))
        .collect::<Vec<_>>()
        .join("\n")
}
