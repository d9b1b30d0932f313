//! Host object templates
//!
//! A [`HostObjectTemplate`] pairs a selector predicate with an optional
//! handler for each proxy operation. The first registered template whose
//! selector accepts a host object services every operation on that
//! object; an operation without a handler is never dispatched and the
//! proxy's own property storage applies instead.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::JsContext;
use crate::exception::HostException;
use crate::value::{HostObject, Value};

/// Outcome of a property handler
#[derive(Debug)]
pub enum DispatchResult<T> {
    /// The handler serviced the operation
    Handled(T),
    /// Fall through to the proxy's own property storage
    NotHandled,
    /// The handler failed
    Failed(HostException),
}

impl<T> DispatchResult<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DispatchResult<U> {
        match self {
            DispatchResult::Handled(value) => DispatchResult::Handled(f(value)),
            DispatchResult::NotHandled => DispatchResult::NotHandled,
            DispatchResult::Failed(err) => DispatchResult::Failed(err),
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchResult::Handled(_))
    }
}

impl<T, E: Into<HostException>> From<Result<T, E>> for DispatchResult<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => DispatchResult::Handled(value),
            Err(err) => DispatchResult::Failed(err.into()),
        }
    }
}

pub type Selector = Arc<dyn Fn(&HostObject) -> bool + Send + Sync>;
pub type RemoveHandler = Arc<dyn Fn(&HostObject) + Send + Sync>;
pub type GetPropertyHandler =
    Arc<dyn Fn(&JsContext, &HostObject, &str) -> DispatchResult<Value> + Send + Sync>;
pub type SetPropertyHandler =
    Arc<dyn Fn(&JsContext, &HostObject, &str, Value) -> DispatchResult<()> + Send + Sync>;
pub type DeletePropertyHandler =
    Arc<dyn Fn(&JsContext, &HostObject, &str) -> DispatchResult<bool> + Send + Sync>;
pub type EnumeratePropertiesHandler =
    Arc<dyn Fn(&JsContext, &HostObject) -> Result<Vec<String>, HostException> + Send + Sync>;
pub type InvokeHandler =
    Arc<dyn Fn(&JsContext, &HostObject, &[Value]) -> Result<Value, HostException> + Send + Sync>;
pub type ValueOfHandler =
    Arc<dyn Fn(&JsContext, &HostObject) -> Result<Value, HostException> + Send + Sync>;
pub type ToStringHandler =
    Arc<dyn Fn(&JsContext, &HostObject) -> DispatchResult<String> + Send + Sync>;

/// Handler set for one class of host objects
#[derive(Clone)]
pub struct HostObjectTemplate {
    name: String,
    selector: Selector,
    pub(crate) remove: Option<RemoveHandler>,
    pub(crate) get_property: Option<GetPropertyHandler>,
    pub(crate) set_property: Option<SetPropertyHandler>,
    pub(crate) delete_property: Option<DeletePropertyHandler>,
    pub(crate) enumerate_properties: Option<EnumeratePropertiesHandler>,
    pub(crate) invoke: Option<InvokeHandler>,
    pub(crate) value_of: Option<ValueOfHandler>,
    pub(crate) to_string: Option<ToStringHandler>,
}

impl HostObjectTemplate {
    /// Template for host objects accepted by `selector`
    pub fn new(selector: impl Fn(&HostObject) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: "template".to_string(),
            selector: Arc::new(selector),
            remove: None,
            get_property: None,
            set_property: None,
            delete_property: None,
            enumerate_properties: None,
            invoke: None,
            value_of: None,
            to_string: None,
        }
    }

    /// Template for host objects of type `T`
    pub fn for_type<T: Any>() -> Self {
        Self::new(|object| object.is::<T>()).with_name(std::any::type_name::<T>())
    }

    /// Template accepting every host object
    pub(crate) fn catch_all() -> Self {
        Self::new(|_| true).with_name("default")
    }

    /// Name used in diagnostics
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matches(&self, object: &HostObject) -> bool {
        (self.selector)(object)
    }

    /// Advisory notice that script code dropped its last reference. The
    /// keep-alive slot is released whether or not this is set.
    pub fn on_remove(mut self, f: impl Fn(&HostObject) + Send + Sync + 'static) -> Self {
        self.remove = Some(Arc::new(f));
        self
    }

    pub fn on_get_property(
        mut self,
        f: impl Fn(&JsContext, &HostObject, &str) -> DispatchResult<Value> + Send + Sync + 'static,
    ) -> Self {
        self.get_property = Some(Arc::new(f));
        self
    }

    pub fn on_set_property(
        mut self,
        f: impl Fn(&JsContext, &HostObject, &str, Value) -> DispatchResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.set_property = Some(Arc::new(f));
        self
    }

    pub fn on_delete_property(
        mut self,
        f: impl Fn(&JsContext, &HostObject, &str) -> DispatchResult<bool> + Send + Sync + 'static,
    ) -> Self {
        self.delete_property = Some(Arc::new(f));
        self
    }

    pub fn on_enumerate_properties(
        mut self,
        f: impl Fn(&JsContext, &HostObject) -> Result<Vec<String>, HostException>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.enumerate_properties = Some(Arc::new(f));
        self
    }

    pub fn on_invoke(
        mut self,
        f: impl Fn(&JsContext, &HostObject, &[Value]) -> Result<Value, HostException>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.invoke = Some(Arc::new(f));
        self
    }

    pub fn on_value_of(
        mut self,
        f: impl Fn(&JsContext, &HostObject) -> Result<Value, HostException> + Send + Sync + 'static,
    ) -> Self {
        self.value_of = Some(Arc::new(f));
        self
    }

    pub fn on_to_string(
        mut self,
        f: impl Fn(&JsContext, &HostObject) -> DispatchResult<String> + Send + Sync + 'static,
    ) -> Self {
        self.to_string = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for HostObjectTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObjectTemplate")
            .field("name", &self.name)
            .field("remove", &self.remove.is_some())
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

    struct Base;
    struct Derived;

    #[test]
    fn test_for_type_selects_by_type() {
        let template = HostObjectTemplate::for_type::<Derived>();
        assert!(template.matches(&HostObject::new(Derived)));
        assert!(!template.matches(&HostObject::new(Base)));
        assert!(HostObjectTemplate::catch_all().matches(&HostObject::new(Base)));
    }

    #[test]
    fn test_result_conversion() {
        let ok: DispatchResult<i32> = Ok::<_, HostException>(3).into();
        assert!(matches!(ok, DispatchResult::Handled(3)));
        let failed: DispatchResult<i32> = Err::<i32, _>(HostException::msg("no")).into();
        assert!(matches!(failed, DispatchResult::Failed(_)));
        assert!(matches!(
            DispatchResult::<i32>::NotHandled.map(|v| v + 1),
            DispatchResult::NotHandled
        ));
    }
}
