//! Tether Runtime - host bridge for the tether script engine
//!
//! Exposes host objects to script code and script objects to host code
//! without either side's memory management freeing what the other still
//! references.
//!
//! - [`JsEngine`] / [`JsContext`]: engine and session handles with
//!   cascading, idempotent disposal
//! - [`KeepAliveStore`]: pins host objects the script heap references under
//!   stable integer slots
//! - [`codec`]: conversion between host [`Value`]s and boundary values
//! - [`HostObjectTemplate`]: handler sets servicing script operations on
//!   host object proxies
//! - [`HostErrorInfo`] / [`ErrorFilter`]: how host failures reach scripts
//! - [`reflect`]: built-in templates driven by type descriptors
//!
//! # Example
//!
//! ```ignore
//! use tether_runtime::{JsEngine, Value};
//!
//! let engine = JsEngine::default();
//! let cx = engine.create_context()?;
//! cx.set_function("sum", |_, args| {
//!     Ok(Value::from(args.iter().filter_map(Value::as_i32).sum::<i32>()))
//! })?;
//! assert_eq!(cx.execute("sum(1, 2, 3)", None)?, Value::Integer(6));
//! ```

#![warn(rust_2018_idioms)]

pub mod codec;
pub mod config;
pub mod context;
mod dispatch;
pub mod engine;
pub mod error;
pub mod exception;
pub mod keepalive;
pub mod object;
pub mod reflect;
pub mod script;
pub mod template;
mod timeout;
pub mod value;

pub use config::{ContextConfig, EngineConfig};
pub use context::{ContextStats, JsContext};
pub use engine::JsEngine;
pub use error::{Error, Result, ScriptError};
pub use exception::{ErrorFilter, FilterDecision, HostErrorInfo, HostException};
pub use keepalive::KeepAliveStore;
pub use object::{JsArray, JsFunction, JsObject};
pub use reflect::{
    BoundMethod, Exposure, HostDictionary, HostFunction, HostType, MissingMemberPolicy,
    ReflectionConfig, TypeCatalog, TypeDescriptor,
};
pub use script::JsScript;
pub use template::{DispatchResult, HostObjectTemplate};
pub use value::{HostObject, Value};

pub use tether_sdk::{AllocationStats, ContextId, ObjectHandle, ScriptId, TemplateId};
