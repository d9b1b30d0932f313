//! Engine handle

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tether_sdk::ContextId;
use tracing::debug;

use crate::context::ScriptContext;
use crate::interrupt::{InterruptSet, TerminateHandle};
use crate::stats;
use crate::vm::realm::EngineOptions;

/// State shared by an engine and every context it created
pub(crate) struct EngineShared {
    pub(crate) options: EngineOptions,
    pub(crate) interrupts: Arc<InterruptSet>,
    next_context: AtomicU32,
}

impl Drop for EngineShared {
    fn drop(&mut self) {
        stats::decrement(&stats::ENGINES);
        debug!("script engine released");
    }
}

/// A script engine instance.
///
/// Each context has its own termination flag; the engine can ask all of
/// its running contexts to stop at once. The engine's native state lives
/// until the engine and all of its contexts are dropped.
pub struct ScriptEngine {
    shared: Arc<EngineShared>,
}

impl ScriptEngine {
    pub fn new(options: EngineOptions) -> Self {
        stats::increment(&stats::ENGINES);
        debug!(max_call_depth = options.max_call_depth, "script engine created");
        Self {
            shared: Arc::new(EngineShared {
                options,
                interrupts: Arc::new(InterruptSet::default()),
                next_context: AtomicU32::new(1),
            }),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.shared.options
    }

    /// Create an isolated execution context
    pub fn create_context(&self) -> ScriptContext {
        let id = ContextId(self.shared.next_context.fetch_add(1, Ordering::Relaxed));
        ScriptContext::new(id, self.shared.clone())
    }

    /// Ask every running context to stop. Callable from any thread.
    pub fn terminate_execution(&self) {
        self.terminate_handle().terminate();
    }

    /// Withdraw termination requests that have not been consumed
    pub fn cancel_termination(&self) {
        self.terminate_handle().cancel();
    }

    /// Cloneable handle for stopping the engine's running contexts from
    /// another thread
    pub fn terminate_handle(&self) -> TerminateHandle {
        TerminateHandle::engine(self.shared.interrupts.clone())
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}
