//! HostCallbacks - the per-template callback table
//!
//! The engine invokes these when script code operates on a host proxy
//! object. Every callback receives the calling context id and the proxy's
//! keep-alive slot.
//!
//! # Result protocol
//!
//! | Result                 | Meaning                                        |
//! |------------------------|------------------------------------------------|
//! | `TaggedValue::Empty`   | not handled: the engine applies default proxy behaviour |
//! | `TaggedValue::HostError` | the handler failed: the engine throws the error |
//! | anything else          | handled, with that value as the result         |
//!
//! Absent callbacks (`None`) are never dispatched; the engine goes straight
//! to its default behaviour. `remove` is the only required callback because
//! the host must always learn when a proxy has been collected.

use std::fmt;
use std::sync::Arc;

use crate::handle::ContextId;
use crate::value::TaggedValue;

/// Proxy collected: release the slot. Must not fail.
pub type RemoveCallback = Arc<dyn Fn(ContextId, i32) + Send + Sync>;

/// Named property read
pub type GetPropertyCallback = Arc<dyn Fn(ContextId, i32, &str) -> TaggedValue + Send + Sync>;

/// Named property write
pub type SetPropertyCallback =
    Arc<dyn Fn(ContextId, i32, &str, TaggedValue) -> TaggedValue + Send + Sync>;

/// Named property deletion; handled results are read as booleans
pub type DeletePropertyCallback = Arc<dyn Fn(ContextId, i32, &str) -> TaggedValue + Send + Sync>;

/// Property enumeration; returns a run of strings
pub type EnumeratePropertiesCallback = Arc<dyn Fn(ContextId, i32) -> TaggedValue + Send + Sync>;

/// Call of the proxy as a function
pub type InvokeCallback = Arc<dyn Fn(ContextId, i32, Vec<TaggedValue>) -> TaggedValue + Send + Sync>;

/// `valueOf()` on the proxy
pub type ValueOfCallback = Arc<dyn Fn(ContextId, i32) -> TaggedValue + Send + Sync>;

/// `toString()` on the proxy
pub type ToStringCallback = Arc<dyn Fn(ContextId, i32) -> TaggedValue + Send + Sync>;

/// Callback table registered with an engine context as one template.
#[derive(Clone)]
pub struct HostCallbacks {
    /// Proxy collected
    pub remove: RemoveCallback,
    /// Named property read
    pub get_property: Option<GetPropertyCallback>,
    /// Named property write
    pub set_property: Option<SetPropertyCallback>,
    /// Named property deletion
    pub delete_property: Option<DeletePropertyCallback>,
    /// Property enumeration
    pub enumerate_properties: Option<EnumeratePropertiesCallback>,
    /// Call as function
    pub invoke: Option<InvokeCallback>,
    /// `valueOf()`
    pub value_of: Option<ValueOfCallback>,
    /// `toString()`
    pub to_string: Option<ToStringCallback>,
}

impl HostCallbacks {
    /// Create a table with only the required `remove` callback
    pub fn new(remove: impl Fn(ContextId, i32) + Send + Sync + 'static) -> Self {
        Self {
            remove: Arc::new(remove),
            get_property: None,
            set_property: None,
            delete_property: None,
            enumerate_properties: None,
            invoke: None,
            value_of: None,
            to_string: None,
        }
    }

    /// Set the property read callback
    pub fn with_get_property(
        mut self,
        f: impl Fn(ContextId, i32, &str) -> TaggedValue + Send + Sync + 'static,
    ) -> Self {
        self.get_property = Some(Arc::new(f));
        self
    }

    /// Set the property write callback
    pub fn with_set_property(
        mut self,
        f: impl Fn(ContextId, i32, &str, TaggedValue) -> TaggedValue + Send + Sync + 'static,
    ) -> Self {
        self.set_property = Some(Arc::new(f));
        self
    }

    /// Set the property deletion callback
    pub fn with_delete_property(
        mut self,
        f: impl Fn(ContextId, i32, &str) -> TaggedValue + Send + Sync + 'static,
    ) -> Self {
        self.delete_property = Some(Arc::new(f));
        self
    }

    /// Set the enumeration callback
    pub fn with_enumerate_properties(
        mut self,
        f: impl Fn(ContextId, i32) -> TaggedValue + Send + Sync + 'static,
    ) -> Self {
        self.enumerate_properties = Some(Arc::new(f));
        self
    }

    /// Set the invocation callback
    pub fn with_invoke(
        mut self,
        f: impl Fn(ContextId, i32, Vec<TaggedValue>) -> TaggedValue + Send + Sync + 'static,
    ) -> Self {
        self.invoke = Some(Arc::new(f));
        self
    }

    /// Set the `valueOf()` callback
    pub fn with_value_of(
        mut self,
        f: impl Fn(ContextId, i32) -> TaggedValue + Send + Sync + 'static,
    ) -> Self {
        self.value_of = Some(Arc::new(f));
        self
    }

    /// Set the `toString()` callback
    pub fn with_to_string(
        mut self,
        f: impl Fn(ContextId, i32) -> TaggedValue + Send + Sync + 'static,
    ) -> Self {
        self.to_string = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for HostCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCallbacks")
            .field("get_property", &self.get_property.is_some())
            .field("set_property", &self.set_property.is_some())
            .field("delete_property", &self.delete_property.is_some())
            .field("enumerate_properties", &self.enumerate_properties.is_some())
            .field("invoke", &self.invoke.is_some())
            .field("value_of", &self.value_of.is_some())
            .field("to_string", &self.to_string.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    #[test]
    fn test_absent_callbacks_are_none() {
        let callbacks = HostCallbacks::new(|_, _| {});
        assert!(callbacks.get_property.is_none());
        assert!(callbacks.invoke.is_none());
        assert!(callbacks.to_string.is_none());
    }

    #[test]
    fn test_builder_installs_callbacks() {
        let removed = Arc::new(AtomicI32::new(-1));
        let seen = removed.clone();
        let callbacks = HostCallbacks::new(move |_, slot| seen.store(slot, Ordering::SeqCst))
            .with_invoke(|_, _, args| {
                TaggedValue::Integer(args.iter().filter_map(TaggedValue::as_i32).sum())
            });

        (callbacks.remove)(ContextId(1), 5);
        assert_eq!(removed.load(Ordering::SeqCst), 5);

        let invoke = callbacks.invoke.as_ref().unwrap();
        let args = vec![TaggedValue::Integer(1), TaggedValue::Integer(2), TaggedValue::Integer(3)];
        assert_eq!(invoke(ContextId(1), 5, args), TaggedValue::Integer(6));
        assert_eq!(invoke(ContextId(1), 5, Vec::new()), TaggedValue::Integer(0));
    }
}
