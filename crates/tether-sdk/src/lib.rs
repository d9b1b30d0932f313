//! Tether SDK - boundary types shared by the host bridge and the script engine
//!
//! Everything that crosses between host code and the embedded engine is
//! expressed with the types in this crate:
//!
//! - [`TaggedValue`]: the fixed-layout discriminated union used for every
//!   value passed in either direction
//! - [`HostCallbacks`]: the per-template callback table the engine invokes
//!   when script code touches a host proxy object
//! - [`EngineErrorInfo`]: the description of an uncaught script error
//! - [`AllocationStats`]: live native resource counters for leak detection
//!
//! # Example
//!
//! ```ignore
//! use tether_sdk::{HostCallbacks, TaggedValue};
//!
//! let callbacks = HostCallbacks::new(|_cx, _slot| {})
//!     .with_invoke(|_cx, _slot, args| {
//!         let sum: i32 = args.iter().filter_map(TaggedValue::as_i32).sum();
//!         TaggedValue::Integer(sum)
//!     });
//! ```

#![warn(missing_docs)]

pub mod callbacks;
pub mod error;
pub mod handle;
pub mod stats;
pub mod value;

pub use callbacks::{
    DeletePropertyCallback, EnumeratePropertiesCallback, GetPropertyCallback, HostCallbacks,
    InvokeCallback, RemoveCallback, SetPropertyCallback, ToStringCallback, ValueOfCallback,
};
pub use error::{EngineErrorInfo, StackFrame, TagError};
pub use handle::{ContextId, ObjectHandle, ScriptId, TemplateId};
pub use stats::AllocationStats;
pub use value::{TaggedValue, ValueTag};
