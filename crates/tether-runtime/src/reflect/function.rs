//! Callable host values: closures, bound methods and type objects

use std::fmt;
use std::sync::Arc;

use crate::context::JsContext;
use crate::exception::{HostErrorInfo, HostException};
use crate::reflect::descriptor::TypeDescriptor;
use crate::value::{HostObject, Value};

type Callback = Arc<dyn Fn(&JsContext, &[Value]) -> Result<Value, HostException> + Send + Sync>;

/// A host closure callable from script code
#[derive(Clone)]
pub struct HostFunction {
    name: Option<String>,
    f: Callback,
}

impl HostFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&JsContext, &[Value]) -> Result<Value, HostException> + Send + Sync + 'static,
    {
        Self {
            name: None,
            f: Arc::new(f),
        }
    }

    /// Name shown by `toString`
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn call(&self, cx: &JsContext, args: &[Value]) -> Result<Value, HostException> {
        (self.f)(cx, args)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction").field("name", &self.name).finish()
    }
}

/// Source text scripts see for a native function
pub(crate) fn native_source(name: &str) -> String {
    format!("function {}() {{ [native code] }}", name)
}

/// A method read off a host object or type object. Instance methods carry
/// their receiver; static methods carry none.
#[derive(Clone)]
pub struct BoundMethod {
    pub(crate) name: String,
    pub(crate) receiver: Option<HostObject>,
    pub(crate) declaring: Arc<TypeDescriptor>,
}

impl BoundMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receiver(&self) -> Option<&HostObject> {
        self.receiver.as_ref()
    }

    pub fn call(&self, cx: &JsContext, args: &[Value]) -> Result<Value, HostException> {
        let missing = || -> HostException {
            HostErrorInfo::new(format!("{}.{} is not a function", self.declaring.name(), self.name))
                .with_name("TypeError")
                .into()
        };
        match &self.receiver {
            Some(receiver) => {
                let method = self.declaring.method(&self.name).ok_or_else(missing)?;
                method(cx, receiver, args)
            }
            None => {
                let method = self.declaring.static_method(&self.name).ok_or_else(missing)?;
                method(cx, args)
            }
        }
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod")
            .field("name", &self.name)
            .field("type", &self.declaring.name())
            .field("receiver", &self.receiver)
            .finish()
    }
}

/// A host type exposed as a value: statics as members, construction by
/// calling it
#[derive(Clone)]
pub struct HostType {
    descriptor: Arc<TypeDescriptor>,
}

impl HostType {
    pub fn new(descriptor: Arc<TypeDescriptor>) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.descriptor
    }

    /// Run the constructor
    pub fn construct(&self, cx: &JsContext, args: &[Value]) -> Result<Value, HostException> {
        match self.descriptor.constructor() {
            Some(constructor) => constructor(cx, args),
            None => Err(HostErrorInfo::new(format!(
                "{} has no constructor",
                self.descriptor.name()
            ))
            .with_name("TypeError")
            .into()),
        }
    }
}

impl fmt::Debug for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostType").field(&self.descriptor.name()).finish()
    }
}
