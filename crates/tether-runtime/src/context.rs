//! Script contexts
//!
//! A [`JsContext`] is one session against the engine: a native script
//! context, the keep-alive store pinning host objects its heap references,
//! the template registry servicing their proxies, and the state used to
//! translate host failures and terminations back into [`Error`]s.
//!
//! The native context is guarded by a re-entrant lock so host handlers
//! running inside an execution can call back into the same context on the
//! same thread.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use tether_engine::{ScriptContext, TerminateHandle};
use tether_sdk::{ContextId, TaggedValue, TemplateId};
use tracing::{debug, error, warn};

use crate::codec;
use crate::config::ContextConfig;
use crate::dispatch::Registry;
use crate::engine::JsEngine;
use crate::error::{Error, Result};
use crate::exception::{ErrorFilter, FilterDecision, HostErrorInfo, HostException};
use crate::keepalive::KeepAliveStore;
use crate::object::{JsArray, JsObject};
use crate::reflect;
use crate::script::JsScript;
use crate::template::HostObjectTemplate;
use crate::timeout::Watchdog;
use crate::value::{HostObject, Value};

type NativeCell = RefCell<Option<ScriptContext>>;

pub(crate) struct ContextInner {
    id: ContextId,
    engine: JsEngine,
    native: ReentrantMutex<NativeCell>,
    pub(crate) keepalive: Mutex<KeepAliveStore>,
    pub(crate) registry: RwLock<Registry>,
    error_filter: Option<ErrorFilter>,
    /// First failure queued during the current execution
    pending: Mutex<Option<Pending>>,
    /// Stops this context's native executions only
    terminate: TerminateHandle,
    timed_out: Arc<AtomicBool>,
    /// Set by an explicit engine-wide termination request
    terminated: AtomicBool,
    disposed: AtomicBool,
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        debug!(context = self.id.0, "context dropped");
    }
}

/// Per-context diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextStats {
    /// Host objects currently pinned
    pub keepalive_slots: usize,
    /// Most host objects pinned at once
    pub max_keepalive_slots: usize,
    /// Objects in the script heap, built-ins included
    pub heap_objects: usize,
    /// Live script proxies of host objects
    pub host_proxies: usize,
    /// Script objects held by host handles
    pub pinned_handles: usize,
    /// Compiled scripts not yet disposed
    pub scripts: usize,
}

/// A script execution context. Cloning yields another handle to the same
/// context.
#[derive(Clone)]
pub struct JsContext {
    pub(crate) inner: Arc<ContextInner>,
}

impl JsContext {
    pub(crate) fn create(
        engine: JsEngine,
        native: ScriptContext,
        engine_templates: Vec<Arc<HostObjectTemplate>>,
        config: ContextConfig,
    ) -> Self {
        let id = native.id();
        let terminate = native.terminate_handle();
        let inner = Arc::new_cyclic(|weak| {
            let templates = engine_templates
                .into_iter()
                .chain(config.templates.iter().cloned())
                .chain(reflect::templates(&config.reflection));
            let registry = Registry::new(&native, weak, templates);
            ContextInner {
                id,
                engine,
                native: ReentrantMutex::new(RefCell::new(Some(native))),
                keepalive: Mutex::new(KeepAliveStore::new()),
                registry: RwLock::new(registry),
                error_filter: config.error_filter.clone(),
                pending: Mutex::new(None),
                terminate,
                timed_out: Arc::new(AtomicBool::new(false)),
                terminated: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }
        });
        debug!(context = id.0, "context created");
        Self { inner }
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn engine(&self) -> &JsEngine {
        &self.inner.engine
    }

    /// Whether both handles refer to the same context
    pub fn ptr_eq(&self, other: &JsContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run `source` and return its completion value
    pub fn execute(&self, source: &str, resource: Option<&str>) -> Result<Value> {
        self.run(None, |native| Ok(native.execute(source, resource)))
    }

    /// Run `source`, terminating it once `timeout` has passed
    pub fn execute_with_timeout(
        &self,
        source: &str,
        resource: Option<&str>,
        timeout: Duration,
    ) -> Result<Value> {
        self.run(Some(timeout), |native| Ok(native.execute(source, resource)))
    }

    /// Compile `source` for repeated execution
    pub fn compile(&self, source: &str, resource: Option<&str>) -> Result<JsScript> {
        let id = self.with_native(|native| {
            native
                .compile(source, resource)
                .map_err(|info| codec::script_error(info, self))
        })?;
        let resource = resource.unwrap_or(tether_engine::DEFAULT_RESOURCE);
        Ok(JsScript::new(self.clone(), id, resource))
    }

    // ========================================================================
    // Globals
    // ========================================================================

    pub fn get_variable(&self, name: &str) -> Result<Value> {
        self.run(None, |native| Ok(native.get_variable(name)))
    }

    pub fn set_variable(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let tagged = codec::encode(&value.into(), self)?;
        self.with_native(|native| Ok(native.set_variable(name, tagged)?))
    }

    /// Expose a host closure as a global function
    pub fn set_function<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&JsContext, &[Value]) -> std::result::Result<Value, HostException>
            + Send
            + Sync
            + 'static,
    {
        self.set_variable(name, Value::function(f))
    }

    // ========================================================================
    // Creation
    // ========================================================================

    pub fn create_object(&self) -> Result<JsObject> {
        match self.run(None, |native| Ok(native.new_object()))? {
            Value::Object(object) => Ok(object),
            other => Err(Error::Internal(format!("expected an object, got {:?}", other))),
        }
    }

    pub fn create_array(&self, items: Vec<Value>) -> Result<JsArray> {
        let items = items
            .iter()
            .map(|item| codec::encode(item, self))
            .collect::<Result<Vec<_>>>()?;
        match self.run(None, |native| Ok(native.new_array(items)?))? {
            Value::Array(array) => Ok(array),
            other => Err(Error::Internal(format!("expected an array, got {:?}", other))),
        }
    }

    // ========================================================================
    // Templates and housekeeping
    // ========================================================================

    /// Register a template for this context. It is consulted after every
    /// template the context was created with.
    pub fn register_template(&self, template: HostObjectTemplate) -> Result<TemplateId> {
        let template = Arc::new(template);
        self.with_native(|native| {
            Ok(self
                .inner
                .registry
                .write()
                .register(native, &Arc::downgrade(&self.inner), template))
        })
    }

    /// Collect unreachable script objects, releasing the host objects their
    /// proxies pinned. Returns the number of objects freed.
    pub fn collect_garbage(&self) -> Result<usize> {
        self.with_native(|native| Ok(native.collect_garbage()))
    }

    pub fn stats(&self) -> Result<ContextStats> {
        let native = self.with_native(|native| Ok(native.stats()))?;
        let keepalive = self.inner.keepalive.lock();
        Ok(ContextStats {
            keepalive_slots: keepalive.len(),
            max_keepalive_slots: keepalive.max_slots(),
            heap_objects: native.heap_objects,
            host_proxies: native.host_proxies,
            pinned_handles: native.pinned_handles,
            scripts: native.scripts,
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Release the native context and every pinned host object. Idempotent.
    /// A context disposed while it executes is released once the execution
    /// returns.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(guard) = self.inner.native.try_lock() {
            release_native(&guard);
        }
        let objects = self.inner.keepalive.lock().clear();
        drop(objects);
        self.inner.pending.lock().take();
        debug!(context = self.inner.id.0, "context disposed");
    }

    pub(crate) fn ensure_alive(&self) -> Result<()> {
        self.inner.engine.ensure_alive()?;
        if self.is_disposed() {
            return Err(Error::disposed("context"));
        }
        Ok(())
    }

    // ========================================================================
    // Native access
    // ========================================================================

    /// Run `f` against the native context
    pub(crate) fn with_native<R>(&self, f: impl FnOnce(&ScriptContext) -> Result<R>) -> Result<R> {
        self.ensure_alive()?;
        let guard = self.inner.native.lock();
        let result = {
            let cell = guard
                .try_borrow()
                .map_err(|_| Error::Internal("native context is being released".to_string()))?;
            let native = cell.as_ref().ok_or_else(|| Error::disposed("context"))?;
            f(native)
        };
        if self.is_disposed() {
            release_native(&guard);
        }
        result
    }

    /// Run `f` and translate its result, arming a watchdog when a timeout
    /// is given
    pub(crate) fn run(
        &self,
        timeout: Option<Duration>,
        f: impl FnOnce(&ScriptContext) -> Result<TaggedValue>,
    ) -> Result<Value> {
        let tagged = self.run_raw(timeout, f)?;
        codec::extract(tagged, self)
    }

    /// Like [`run`](Self::run) but hands back the checked boundary value
    pub(crate) fn run_raw(
        &self,
        timeout: Option<Duration>,
        f: impl FnOnce(&ScriptContext) -> Result<TaggedValue>,
    ) -> Result<TaggedValue> {
        self.with_native(|native| {
            let nested = native.is_executing();
            if !nested {
                self.inner.timed_out.store(false, Ordering::SeqCst);
            }
            let watchdog = timeout
                .map(|timeout| {
                    Watchdog::arm(
                        timeout,
                        self.inner.terminate.clone(),
                        self.inner.timed_out.clone(),
                    )
                })
                .transpose()?;
            let result = f(native);
            let fired = watchdog.map_or(false, Watchdog::disarm);
            let tagged = result?;
            if !nested && !tagged.is_termination() {
                // A deadline or request that arrived after the script had
                // already finished
                if fired {
                    self.inner.timed_out.store(false, Ordering::SeqCst);
                }
                self.inner.terminated.store(false, Ordering::SeqCst);
                self.inner.terminate.cancel();
            }
            self.check(native, tagged, nested)
        })
    }

    /// Turn failure shapes into errors. Nested executions leave the causes
    /// in place for the outermost one.
    fn check(&self, native: &ScriptContext, tagged: TaggedValue, nested: bool) -> Result<TaggedValue> {
        let pending = {
            let mut pending = self.inner.pending.lock();
            if nested {
                pending.clone()
            } else {
                pending.take()
            }
        };
        if let Some(pending) = pending {
            codec::discard(native, tagged);
            return Err(pending.into());
        }
        if self.is_disposed() {
            codec::discard(native, tagged);
            return Err(Error::disposed("context"));
        }
        match tagged {
            TaggedValue::Termination => Err(self.termination_cause(nested)),
            TaggedValue::EngineError(info) => Err(codec::script_error(info, self)),
            other => Ok(other),
        }
    }

    fn termination_cause(&self, nested: bool) -> Error {
        let consume = |flag: &AtomicBool| {
            if nested {
                flag.load(Ordering::SeqCst)
            } else {
                flag.swap(false, Ordering::SeqCst)
            }
        };
        if consume(&self.inner.timed_out) {
            Error::Timeout
        } else if consume(&self.inner.terminated) {
            Error::Terminated
        } else {
            Error::Internal("execution terminated without a cause".to_string())
        }
    }

    /// Stop the running execution of this context, recording an explicit
    /// termination as its cause
    pub(crate) fn terminate_if_running(&self) {
        self.inner.terminated.store(true, Ordering::SeqCst);
        if !self.inner.terminate.terminate_if_running() {
            self.inner.terminated.store(false, Ordering::SeqCst);
        }
    }

    /// Ask the running execution to stop without recording a cause
    pub(crate) fn interrupt(&self) {
        self.inner.terminate.terminate();
    }

    /// Drop one pin held by a host handle
    pub(crate) fn release(&self, handle: tether_sdk::ObjectHandle) {
        if self.is_disposed() {
            return;
        }
        let _ = self.with_native(|native| Ok(native.release_object(handle)));
    }

    // ========================================================================
    // Host failures
    // ========================================================================

    /// Route a failed handler through the error filter. Proceeding errors
    /// come back as a thrown error record; suppressed ones terminate the
    /// execution and are re-raised when it returns.
    pub(crate) fn fail(&self, exception: HostException) -> TaggedValue {
        let info = HostErrorInfo::convert(&exception);
        let decision = match &self.inner.error_filter {
            None => FilterDecision::Proceed,
            Some(filter) => match panic::catch_unwind(AssertUnwindSafe(|| filter(&info))) {
                Ok(decision) => decision,
                Err(_) => {
                    error!(context = self.inner.id.0, "error filter panicked");
                    FilterDecision::Suppress
                }
            },
        };
        match decision {
            FilterDecision::Proceed => {
                let template = self.inner.registry.read().errors();
                let slot = self.inner.keepalive.lock().insert(HostObject::new(info));
                TaggedValue::HostError { slot, template }
            }
            FilterDecision::Suppress => {
                warn!(
                    context = self.inner.id.0,
                    error = %exception,
                    "host error suppressed, terminating execution"
                );
                self.queue(Pending::Host(exception));
                TaggedValue::Empty
            }
        }
    }

    /// Stop the execution with an error script code cannot catch. The error
    /// filter is not consulted.
    pub(crate) fn abort(&self, err: Error) -> TaggedValue {
        error!(
            context = self.inner.id.0,
            error = %err,
            "unrecoverable host failure, terminating execution"
        );
        let pending = match err {
            Error::Host(exception) => Pending::Host(exception),
            Error::Resolution(message) => Pending::Resolution(message),
            other => Pending::Internal(other.to_string()),
        };
        self.queue(pending);
        TaggedValue::Empty
    }

    /// Keep the first failure and terminate
    fn queue(&self, pending: Pending) {
        self.inner.pending.lock().get_or_insert(pending);
        self.inner.terminate.terminate();
    }
}

/// Failure raised once the outermost execution returns
#[derive(Clone)]
enum Pending {
    /// Suppressed handler failure
    Host(HostException),
    /// Slot or handle that no longer resolves
    Resolution(String),
    Internal(String),
}

impl From<Pending> for Error {
    fn from(pending: Pending) -> Self {
        match pending {
            Pending::Host(exception) => Error::Host(exception),
            Pending::Resolution(message) => Error::Resolution(message),
            Pending::Internal(message) => Error::Internal(message),
        }
    }
}

/// Drop the native context unless a caller further up still borrows it
fn release_native(guard: &ReentrantMutexGuard<'_, NativeCell>) {
    let native = match guard.try_borrow_mut() {
        Ok(mut cell) => cell.take(),
        Err(_) => return,
    };
    drop(native);
}

impl PartialEq for JsContext {
    fn eq(&self, other: &JsContext) -> bool {
        self.ptr_eq(other)
    }
}

impl std::fmt::Debug for JsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsContext")
            .field("id", &self.inner.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
