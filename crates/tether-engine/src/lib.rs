//! Tether Engine - the embedded script engine behind the native boundary
//!
//! A compact ECMAScript-subset engine with its own object heap. The host
//! talks to it only through [`TaggedValue`](tether_sdk::TaggedValue)s:
//!
//! - [`ScriptEngine`]: owns the termination flag shared by its contexts
//! - [`ScriptContext`]: one isolated global environment and heap; executes
//!   source, exposes object access by pinned handle, and dispatches
//!   operations on host proxies to registered [`HostCallbacks`](tether_sdk::HostCallbacks)
//! - [`allocation_stats`]: live native resource counters
//!
//! Script failures are reported in-band as `TaggedValue::EngineError` or
//! `TaggedValue::Termination`; [`NativeError`] is reserved for protocol
//! violations such as stale handles.

#![warn(rust_2018_idioms)]

pub mod context;
pub mod engine;
pub mod error;
pub mod interrupt;
pub mod parser;
pub mod stats;
mod vm;

pub use context::{ContextStats, ScriptContext, DEFAULT_RESOURCE};
pub use engine::ScriptEngine;
pub use error::{NativeError, NativeResult};
pub use interrupt::TerminateHandle;
pub use stats::allocation_stats;
pub use vm::realm::EngineOptions;
