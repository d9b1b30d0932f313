//! Engine and context configuration

use std::sync::Arc;

use tether_engine::EngineOptions;

use crate::exception::{ErrorFilter, FilterDecision, HostErrorInfo};
use crate::reflect::ReflectionConfig;
use crate::template::HostObjectTemplate;

/// Settings for each context
#[derive(Clone, Default)]
pub struct ContextConfig {
    /// Templates consulted before the built-in reflection templates, in order
    pub templates: Vec<Arc<HostObjectTemplate>>,
    /// Built-in reflection exposure
    pub reflection: ReflectionConfig,
    /// Decides whether host handler failures reach script code
    pub error_filter: Option<ErrorFilter>,
}

impl ContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, template: HostObjectTemplate) -> Self {
        self.templates.push(Arc::new(template));
        self
    }

    pub fn with_reflection(mut self, reflection: ReflectionConfig) -> Self {
        self.reflection = reflection;
        self
    }

    pub fn with_error_filter(
        mut self,
        filter: impl Fn(&HostErrorInfo) -> FilterDecision + Send + Sync + 'static,
    ) -> Self {
        self.error_filter = Some(Arc::new(filter));
        self
    }
}

impl std::fmt::Debug for ContextConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextConfig")
            .field("templates", &self.templates)
            .field("reflection", &self.reflection)
            .field("error_filter", &self.error_filter.is_some())
            .finish()
    }
}

/// Settings for an engine and the contexts it creates
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub options: EngineOptions,
    /// Used by [`JsEngine::create_context`](crate::JsEngine::create_context)
    pub context: ContextConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.options = self.options.with_max_call_depth(depth);
        self
    }

    pub fn with_context(mut self, context: ContextConfig) -> Self {
        self.context = context;
        self
    }
}
