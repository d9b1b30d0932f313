//! Error types for the host bridge

use std::fmt;

use tether_engine::NativeError;
use tether_sdk::{EngineErrorInfo, StackFrame};

use crate::exception::{HostErrorInfo, HostException};
use crate::value::Value;

/// Bridge result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to host code
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Uncaught script-level throw
    #[error("{0}")]
    Script(Box<ScriptError>),

    /// Compilation failure
    #[error("{0}")]
    Syntax(Box<ScriptError>),

    /// Host exception re-thrown after a suppressed handler error
    #[error(transparent)]
    Host(HostException),

    /// The execution deadline passed
    #[error("Script execution timed out")]
    Timeout,

    /// Execution stopped by an explicit termination request
    #[error("Script execution was terminated")]
    Terminated,

    /// A slot or handle could not be resolved
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// The resource or one of its owners has been disposed
    #[error("The {resource} has been disposed")]
    Disposed { resource: &'static str },

    /// Broken invariant between host and engine
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn disposed(resource: &'static str) -> Self {
        Error::Disposed { resource }
    }

    /// The script error, for `Script` and `Syntax`
    pub fn script_error(&self) -> Option<&ScriptError> {
        match self {
            Error::Script(err) | Error::Syntax(err) => Some(err),
            _ => None,
        }
    }

    /// The host exception behind this error, if any. Looks through script
    /// errors whose thrown value is a host error record.
    pub fn host_exception(&self) -> Option<&HostException> {
        match self {
            Error::Host(exception) => Some(exception),
            Error::Script(err) => err.host_exception(),
            _ => None,
        }
    }
}

impl From<NativeError> for Error {
    fn from(err: NativeError) -> Self {
        Error::Resolution(err.to_string())
    }
}

/// An error raised by script code, or a compilation failure
#[derive(Debug, Clone)]
pub struct ScriptError {
    /// `name` of the thrown error object
    pub name: Option<String>,
    /// `message` of the thrown error object
    pub message: Option<String>,
    /// String conversion of the thrown value
    pub text: String,
    /// Resource name of the failing script
    pub resource: String,
    /// 1-based line
    pub line: u32,
    /// 0-based column
    pub column: u32,
    /// `stack` of the thrown error object
    pub stack: Option<String>,
    /// Call stack, innermost first
    pub frames: Vec<StackFrame>,
    /// The thrown value; `Undefined` for syntax errors
    pub value: Value,
}

impl ScriptError {
    pub(crate) fn new(info: EngineErrorInfo, value: Value) -> Self {
        Self {
            name: info.name,
            message: info.message,
            text: info.text,
            resource: info.resource,
            line: info.line,
            column: info.column,
            stack: info.stack,
            frames: info.frames,
            value,
        }
    }

    /// Host error record thrown by a proceeding handler failure
    pub fn host_error(&self) -> Option<&HostErrorInfo> {
        self.value.host_error()
    }

    /// Original host exception carried by [`host_error`](Self::host_error)
    pub fn host_exception(&self) -> Option<&HostException> {
        self.host_error().and_then(|info| info.exception.as_ref())
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}:{}:{})",
            self.text,
            self.resource,
            self.line,
            self.column + 1
        )
    }
}
