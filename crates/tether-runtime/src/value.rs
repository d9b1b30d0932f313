//! Host-side values
//!
//! [`Value`] is what host code reads from and passes into script code. It
//! is converted to and from the boundary encoding by [`codec`](crate::codec).

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::exception::{HostErrorInfo, HostException};
use crate::object::{JsArray, JsFunction, JsObject};
use crate::reflect::HostFunction;

// ============================================================================
// HostObject
// ============================================================================

/// A shared host object exposed to script code.
///
/// Identity is the identity of the shared allocation: clones of one
/// `HostObject` occupy a single keep-alive slot and appear as the same
/// object to scripts.
#[derive(Clone)]
pub struct HostObject {
    inner: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Share an existing allocation
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    /// `TypeId` of the wrapped value
    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// Full Rust type name of the wrapped value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name without its module path
    pub fn short_type_name(&self) -> &'static str {
        let name = self.type_name.split('<').next().unwrap_or(self.type_name);
        name.rsplit("::").next().unwrap_or(name)
    }

    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        self.addr() == other.addr()
    }

    /// Address of the shared allocation
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostObject<{}>({:#x})", self.type_name, self.addr())
    }
}

// ============================================================================
// Value
// ============================================================================

/// A value passed between host code and script code
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Integer(i32),
    /// Unsigned index; reaches scripts as a number
    Index(u32),
    Number(f64),
    String(String),
    /// Millisecond precision
    Date(DateTime<Utc>),
    /// Script object
    Object(JsObject),
    /// Script array
    Array(JsArray),
    /// Script function
    Function(JsFunction),
    /// Host object
    Host(HostObject),
}

impl Value {
    /// Expose a host object
    pub fn host<T: Any + Send + Sync>(value: T) -> Self {
        Value::Host(HostObject::new(value))
    }

    /// Expose a host closure as a script function
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&crate::JsContext, &[Value]) -> Result<Value, HostException> + Send + Sync + 'static,
    {
        Value::Host(HostObject::new(HostFunction::new(f)))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral numbers that fit in `i32`
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::Integer(i) => Some(i),
            Value::Index(i) => i32::try_from(i).ok(),
            Value::Number(n)
                if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 =>
            {
                Some(n as i32)
            }
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Integer(i) => Some(f64::from(i)),
            Value::Index(i) => Some(f64::from(i)),
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(date) => Some(*date),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            Value::Object(object) => Some(object),
            Value::Array(array) => Some(array.as_object()),
            Value::Function(function) => Some(function.as_object()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&JsArray> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&JsFunction> {
        match self {
            Value::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_host_object(&self) -> Option<&HostObject> {
        match self {
            Value::Host(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_host<T: Any>(&self) -> Option<&T> {
        self.as_host_object()?.downcast_ref::<T>()
    }

    /// Error record of a host failure that was thrown into script code
    pub fn host_error(&self) -> Option<&HostErrorInfo> {
        self.as_host::<HostErrorInfo>()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Index(a), Value::Index(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Host(a), Value::Host(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

// ============================================================================
// Conversions
// ============================================================================

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Boolean,
    i8 => Integer,
    i16 => Integer,
    i32 => Integer,
    u8 => Integer,
    u16 => Integer,
    u32 => Index,
    f32 => Number,
    f64 => Number,
    String => String,
    &str => String,
    DateTime<Utc> => Date,
    HostObject => Host,
    JsObject => Object,
    JsArray => Array,
    JsFunction => Function,
}

// Scripts have a single double-precision number type. Wider integers are
// accepted with the precision loss that implies.
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Undefined
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    #[test]
    fn test_host_object_identity() {
        let a = HostObject::new(Marker);
        let b = a.clone();
        let c = HostObject::new(Marker);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert!(a.is::<Marker>());
        assert_eq!(a.type_id(), TypeId::of::<Marker>());
        assert_eq!(a.short_type_name(), "Marker");
        assert!(a.downcast_arc::<Marker>().is_some());
        assert!(a.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(5_u8), Value::Integer(5));
        assert_eq!(Value::from(7_u32), Value::Index(7));
        assert_eq!(Value::from("x"), Value::String("x".into()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(true)), Value::Boolean(true));
        assert_eq!(Value::from(()), Value::Undefined);
    }

    #[test]
    fn test_wide_integers_lose_precision_silently() {
        // 2^53 + 1 is not representable as a double
        let value = Value::from(9_007_199_254_740_993_i64);
        assert_eq!(value, Value::Number(9_007_199_254_740_992.0));
        assert_eq!(Value::from(u64::MAX).as_f64(), Some(18_446_744_073_709_551_615.0));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::Number(3.0).as_i32(), Some(3));
        assert_eq!(Value::Number(3.5).as_i32(), None);
        assert_eq!(Value::Index(u32::MAX).as_i32(), None);
        assert_eq!(Value::Integer(2).as_f64(), Some(2.0));
        assert!(Value::host(Marker).as_host::<Marker>().is_some());
        assert!(Value::host(HostErrorInfo::new("m")).host_error().is_some());
    }
}
