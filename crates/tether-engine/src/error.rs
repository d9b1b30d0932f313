//! Engine API errors.
//!
//! These describe protocol violations by the caller (stale handles, unknown
//! ids). Script-level failures are not errors at this level: they are
//! reported in-band as `TaggedValue::EngineError`.

use tether_sdk::{ObjectHandle, ScriptId, TemplateId};

/// Result type for engine API calls
pub type NativeResult<T> = Result<T, NativeError>;

/// Engine API error types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NativeError {
    /// The handle refers to an object that no longer exists
    #[error("Invalid object handle: {0:?}")]
    InvalidHandle(ObjectHandle),

    /// The handle refers to an object that is not an array
    #[error("Not an array: {0:?}")]
    NotAnArray(ObjectHandle),

    /// No compiled script with this id
    #[error("Unknown script: {0}")]
    UnknownScript(ScriptId),

    /// No template with this id
    #[error("Unknown template: {0}")]
    UnknownTemplate(TemplateId),
}
