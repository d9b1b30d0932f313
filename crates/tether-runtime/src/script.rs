//! Compiled scripts

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tether_sdk::ScriptId;
use tracing::debug;

use crate::context::JsContext;
use crate::error::{Error, Result};
use crate::value::Value;

struct ScriptInner {
    context: JsContext,
    id: ScriptId,
    resource: String,
    disposed: AtomicBool,
}

impl ScriptInner {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) || self.context.is_disposed() {
            return;
        }
        let id = self.id;
        let _ = self.context.with_native(|native| Ok(native.dispose_script(id)));
        debug!(script = id.0, resource = %self.resource, "script disposed");
    }
}

impl Drop for ScriptInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A script compiled once for repeated execution in its context
#[derive(Clone)]
pub struct JsScript {
    inner: Arc<ScriptInner>,
}

impl JsScript {
    pub(crate) fn new(context: JsContext, id: ScriptId, resource: &str) -> Self {
        Self {
            inner: Arc::new(ScriptInner {
                context,
                id,
                resource: resource.to_string(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> ScriptId {
        self.inner.id
    }

    /// Resource name errors are reported against
    pub fn resource(&self) -> &str {
        &self.inner.resource
    }

    pub fn context(&self) -> &JsContext {
        &self.inner.context
    }

    pub fn execute(&self) -> Result<Value> {
        self.run(None)
    }

    pub fn execute_with_timeout(&self, timeout: Duration) -> Result<Value> {
        self.run(Some(timeout))
    }

    fn run(&self, timeout: Option<Duration>) -> Result<Value> {
        if self.is_disposed() {
            return Err(Error::disposed("script"));
        }
        let id = self.inner.id;
        self.inner
            .context
            .run(timeout, |native| Ok(native.execute_script(id)?))
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Release the compiled script. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl std::fmt::Debug for JsScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsScript")
            .field("id", &self.inner.id)
            .field("resource", &self.inner.resource)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
