//! Type descriptors
//!
//! A [`TypeDescriptor`] lists what script code may see of one host type:
//! instance properties and methods, static members, an optional
//! constructor and an optional display function. Descriptors are built
//! once with [`TypeDescriptor::builder`] and cached in a [`TypeCatalog`].

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::context::JsContext;
use crate::exception::{HostErrorInfo, HostException};
use crate::value::{HostObject, Value};

pub type Getter = Arc<dyn Fn(&HostObject) -> Result<Value, HostException> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&HostObject, Value) -> Result<(), HostException> + Send + Sync>;
pub type Method =
    Arc<dyn Fn(&JsContext, &HostObject, &[Value]) -> Result<Value, HostException> + Send + Sync>;
pub type StaticGetter = Arc<dyn Fn() -> Result<Value, HostException> + Send + Sync>;
pub type StaticMethod =
    Arc<dyn Fn(&JsContext, &[Value]) -> Result<Value, HostException> + Send + Sync>;
pub type DisplayFn = Arc<dyn Fn(&HostObject) -> Option<String> + Send + Sync>;

pub struct PropertyDescriptor {
    pub(crate) getter: Getter,
    pub(crate) setter: Option<Setter>,
}

impl PropertyDescriptor {
    pub fn is_writable(&self) -> bool {
        self.setter.is_some()
    }
}

/// Script-visible shape of one host type
pub struct TypeDescriptor {
    name: String,
    type_id: TypeId,
    properties: Vec<(String, PropertyDescriptor)>,
    methods: Vec<(String, Method)>,
    static_properties: Vec<(String, StaticGetter)>,
    static_methods: Vec<(String, StaticMethod)>,
    constructor: Option<StaticMethod>,
    display: Option<DisplayFn>,
}

impl TypeDescriptor {
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> TypeDescriptorBuilder<T> {
        TypeDescriptorBuilder {
            descriptor: TypeDescriptor {
                name: name.into(),
                type_id: TypeId::of::<T>(),
                properties: Vec::new(),
                methods: Vec::new(),
                static_properties: Vec::new(),
                static_methods: Vec::new(),
                constructor: None,
                display: None,
            },
            _type: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        find(&self.properties, name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        find(&self.methods, name)
    }

    pub fn static_property(&self, name: &str) -> Option<&StaticGetter> {
        find(&self.static_properties, name)
    }

    pub fn static_method(&self, name: &str) -> Option<&StaticMethod> {
        find(&self.static_methods, name)
    }

    pub fn constructor(&self) -> Option<&StaticMethod> {
        self.constructor.as_ref()
    }

    /// Whether `name` is an instance property or method
    pub fn has_member(&self, name: &str) -> bool {
        self.property(name).is_some() || self.method(name).is_some()
    }

    pub fn has_static_member(&self, name: &str) -> bool {
        self.static_property(name).is_some() || self.static_method(name).is_some()
    }

    /// Instance properties, then instance methods
    pub fn member_names(&self) -> Vec<String> {
        names(&self.properties).chain(names(&self.methods)).collect()
    }

    pub fn static_member_names(&self) -> Vec<String> {
        names(&self.static_properties)
            .chain(names(&self.static_methods))
            .collect()
    }

    /// Display text of `object`, `[object Name]` unless a display function
    /// is set
    pub fn display(&self, object: &HostObject) -> String {
        self.display
            .as_ref()
            .and_then(|display| display(object))
            .unwrap_or_else(|| format!("[object {}]", self.name))
    }
}

fn find<'a, T>(members: &'a [(String, T)], name: &str) -> Option<&'a T> {
    members
        .iter()
        .find(|(member, _)| member == name)
        .map(|(_, value)| value)
}

fn names<T>(members: &[(String, T)]) -> impl Iterator<Item = String> + '_ {
    members.iter().map(|(name, _)| name.clone())
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("members", &self.member_names())
            .field("static_members", &self.static_member_names())
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}

/// Receiver of the wrong type
fn receiver_error(type_name: &str) -> HostException {
    HostErrorInfo::new(format!("receiver is not a {}", type_name))
        .with_name("TypeError")
        .into()
}

// ============================================================================
// Builder
// ============================================================================

pub struct TypeDescriptorBuilder<T> {
    descriptor: TypeDescriptor,
    _type: PhantomData<fn(&T)>,
}

impl<T: Any + Send + Sync> TypeDescriptorBuilder<T> {
    fn downcast<'a>(object: &'a HostObject, type_name: &str) -> Result<&'a T, HostException> {
        object
            .downcast_ref::<T>()
            .ok_or_else(|| receiver_error(type_name))
    }

    /// Read-only property
    pub fn property<V, G>(mut self, name: impl Into<String>, get: G) -> Self
    where
        V: Into<Value>,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        let getter = self.getter(get);
        self.descriptor
            .properties
            .push((name.into(), PropertyDescriptor { getter, setter: None }));
        self
    }

    /// Read-write property
    pub fn property_mut<V, G, S>(mut self, name: impl Into<String>, get: G, set: S) -> Self
    where
        V: Into<Value>,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&T, Value) -> Result<(), HostException> + Send + Sync + 'static,
    {
        let getter = self.getter(get);
        let type_name = self.descriptor.name.clone();
        let setter: Setter = Arc::new(move |object: &HostObject, value: Value| {
            set(Self::downcast(object, &type_name)?, value)
        });
        self.descriptor.properties.push((
            name.into(),
            PropertyDescriptor {
                getter,
                setter: Some(setter),
            },
        ));
        self
    }

    fn getter<V, G>(&self, get: G) -> Getter
    where
        V: Into<Value>,
        G: Fn(&T) -> V + Send + Sync + 'static,
    {
        let type_name = self.descriptor.name.clone();
        Arc::new(move |object: &HostObject| Ok(get(Self::downcast(object, &type_name)?).into()))
    }

    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&JsContext, &T, &[Value]) -> Result<Value, HostException> + Send + Sync + 'static,
    {
        let type_name = self.descriptor.name.clone();
        let method: Method = Arc::new(move |cx: &JsContext, object: &HostObject, args: &[Value]| {
            f(cx, Self::downcast(object, &type_name)?, args)
        });
        self.descriptor.methods.push((name.into(), method));
        self
    }

    pub fn static_property<V, G>(mut self, name: impl Into<String>, get: G) -> Self
    where
        V: Into<Value>,
        G: Fn() -> V + Send + Sync + 'static,
    {
        let getter: StaticGetter = Arc::new(move || Ok(get().into()));
        self.descriptor.static_properties.push((name.into(), getter));
        self
    }

    pub fn static_method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&JsContext, &[Value]) -> Result<Value, HostException> + Send + Sync + 'static,
    {
        self.descriptor.static_methods.push((name.into(), Arc::new(f)));
        self
    }

    /// Construction from script code, by calling the type object
    pub fn constructor<F>(mut self, f: F) -> Self
    where
        F: Fn(&JsContext, &[Value]) -> Result<T, HostException> + Send + Sync + 'static,
    {
        self.descriptor.constructor = Some(Arc::new(move |cx: &JsContext, args: &[Value]| {
            Ok(Value::host(f(cx, args)?))
        }));
        self
    }

    pub fn display<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.descriptor.display = Some(Arc::new(move |object: &HostObject| {
            object.downcast_ref::<T>().map(&f)
        }));
        self
    }

    pub fn build(self) -> Arc<TypeDescriptor> {
        Arc::new(self.descriptor)
    }
}

// ============================================================================
// Catalog
// ============================================================================

static GLOBAL_CATALOG: Lazy<Arc<TypeCatalog>> = Lazy::new(|| Arc::new(TypeCatalog::new()));

/// Descriptors keyed by the Rust type they describe
#[derive(Default)]
pub struct TypeCatalog {
    types: RwLock<FxHashMap<TypeId, Arc<TypeDescriptor>>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide catalog used by default reflection settings
    pub fn global() -> Arc<TypeCatalog> {
        GLOBAL_CATALOG.clone()
    }

    /// Add a descriptor. A type that is already described keeps its first
    /// descriptor, which is returned.
    pub fn register(&self, descriptor: Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        self.types
            .write()
            .entry(descriptor.type_id())
            .or_insert(descriptor)
            .clone()
    }

    /// Descriptor of `T`, building it on first use
    pub fn describe<T: Any>(&self, build: impl FnOnce() -> Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        if let Some(descriptor) = self.get(TypeId::of::<T>()) {
            return descriptor;
        }
        self.register(build())
    }

    pub fn get(&self, type_id: TypeId) -> Option<Arc<TypeDescriptor>> {
        self.types.read().get(&type_id).cloned()
    }

    /// Descriptor of the value wrapped by `object`
    pub fn lookup(&self, object: &HostObject) -> Option<Arc<TypeDescriptor>> {
        self.get(object.type_id())
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }
}

impl fmt::Debug for TypeCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCatalog").field("types", &self.len()).finish()
    }
}
