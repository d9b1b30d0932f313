//! Engine handle
//!
//! [`JsEngine`] owns a native script engine and tracks the contexts it
//! created. Disposing the engine disposes every one of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tether_engine::ScriptEngine;
use tether_sdk::AllocationStats;
use tracing::debug;

use crate::config::{ContextConfig, EngineConfig};
use crate::context::{ContextInner, JsContext};
use crate::error::{Error, Result};
use crate::template::HostObjectTemplate;

pub(crate) struct EngineInner {
    native: RwLock<Option<ScriptEngine>>,
    config: EngineConfig,
    templates: RwLock<Vec<Arc<HostObjectTemplate>>>,
    contexts: Mutex<Vec<Weak<ContextInner>>>,
    disposed: AtomicBool,
}

/// A script engine. Cloning yields another handle to the same engine.
#[derive(Clone)]
pub struct JsEngine {
    pub(crate) inner: Arc<EngineInner>,
}

impl JsEngine {
    pub fn new(config: EngineConfig) -> Self {
        let native = ScriptEngine::new(config.options.clone());
        debug!("engine created");
        Self {
            inner: Arc::new(EngineInner {
                native: RwLock::new(Some(native)),
                config,
                templates: RwLock::new(Vec::new()),
                contexts: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Create a context with the engine's default context configuration
    pub fn create_context(&self) -> Result<JsContext> {
        self.create_context_with(self.inner.config.context.clone())
    }

    pub fn create_context_with(&self, config: ContextConfig) -> Result<JsContext> {
        let native = {
            let engine = self.inner.native.read();
            engine
                .as_ref()
                .ok_or_else(|| Error::disposed("engine"))?
                .create_context()
        };
        let templates = self.inner.templates.read().clone();
        let context = JsContext::create(self.clone(), native, templates, config);

        let mut contexts = self.inner.contexts.lock();
        contexts.retain(|weak| weak.strong_count() > 0);
        contexts.push(Arc::downgrade(&context.inner));
        Ok(context)
    }

    /// Register a template for every context created from now on. Engine
    /// templates are consulted before any context template.
    pub fn register_template(&self, template: HostObjectTemplate) -> Result<()> {
        self.ensure_alive()?;
        self.inner.templates.write().push(Arc::new(template));
        Ok(())
    }

    /// Stop whatever script code this engine is running. Callable from any
    /// thread; each interrupted call fails with [`Error::Terminated`].
    /// Contexts that are idle are not affected.
    pub fn terminate_execution(&self) {
        for inner in self.live_contexts() {
            JsContext { inner }.terminate_if_running();
        }
    }

    fn live_contexts(&self) -> Vec<Arc<ContextInner>> {
        self.inner
            .contexts
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Live native resources across the process
    pub fn allocation_stats() -> AllocationStats {
        tether_engine::allocation_stats()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_alive(&self) -> Result<()> {
        if self.is_disposed() {
            Err(Error::disposed("engine"))
        } else {
            Ok(())
        }
    }

    /// Dispose every context, then the native engine. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let contexts: Vec<_> = self
            .inner
            .contexts
            .lock()
            .drain(..)
            .filter_map(|weak| weak.upgrade())
            .collect();
        for inner in contexts {
            JsContext { inner }.dispose();
        }
        let native = self.inner.native.write().take();
        drop(native);
        debug!("engine disposed");
    }
}

impl Default for JsEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl std::fmt::Debug for JsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsEngine")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
