//! Error types for the boundary

use std::fmt;

use crate::value::TaggedValue;

/// Boundary decoding failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    /// A raw tag that names no [`crate::ValueTag`]
    #[error("Unknown value tag: {0}")]
    UnknownTag(u32),
}

/// One frame of a script stack trace
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StackFrame {
    /// Resource (script) name
    pub resource: String,
    /// Function name; `None` for top-level code and anonymous functions
    pub function: Option<String>,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.function {
            Some(function) if !function.is_empty() => write!(
                f,
                "{} ({}:{}:{})",
                function, self.resource, self.line, self.column
            ),
            _ => write!(f, "{}:{}:{}", self.resource, self.line, self.column),
        }
    }
}

/// Description of an uncaught script error.
///
/// Produced by the engine for syntax errors (with an empty `error` value)
/// and for uncaught throws (with the thrown value in `error`).
#[derive(Debug, PartialEq, Default)]
pub struct EngineErrorInfo {
    /// Value of the error's `name` property, when it has one
    pub name: Option<String>,
    /// Value of the error's `message` property, when it has one
    pub message: Option<String>,
    /// String conversion of the thrown value
    pub text: String,
    /// Resource the error was raised in
    pub resource: String,
    /// 1-based line of the throw site
    pub line: u32,
    /// 0-based column of the throw site
    pub column: u32,
    /// Value of the error's `stack` property, when it has one
    pub stack: Option<String>,
    /// Frames active when the error was raised, innermost first
    pub frames: Vec<StackFrame>,
    /// The thrown value itself
    pub error: TaggedValue,
}

impl EngineErrorInfo {
    /// Whether this describes a compilation failure
    pub fn is_syntax_error(&self) -> bool {
        self.name.as_deref() == Some("SyntaxError") && self.error.is_empty()
    }

    /// Render the frames as `    at ...` lines joined by newlines
    pub fn format_frames(&self) -> String {
        self.frames
            .iter()
            .map(|frame| format!("    at {}", frame))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for EngineErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{}:{})", self.text, self.resource, self.line, self.column)
    }
}
