//! Handles to script objects
//!
//! A [`JsObject`] owns one pin on a script heap object, keeping it alive
//! across collections until the handle is disposed or its last clone is
//! dropped. [`JsArray`] and [`JsFunction`] add the operations specific to
//! arrays and functions.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tether_sdk::ObjectHandle;

use crate::codec;
use crate::context::JsContext;
use crate::error::{Error, Result};
use crate::value::Value;

struct ObjectInner {
    context: JsContext,
    handle: ObjectHandle,
    released: AtomicBool,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.context.release(self.handle);
        }
    }
}

/// A script object held by host code
#[derive(Clone)]
pub struct JsObject {
    inner: Arc<ObjectInner>,
}

impl JsObject {
    /// Take ownership of a pin the engine handed out
    pub(crate) fn new(context: JsContext, handle: ObjectHandle) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                context,
                handle,
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn handle(&self) -> ObjectHandle {
        self.inner.handle
    }

    pub fn context(&self) -> &JsContext {
        &self.inner.context
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst) || self.inner.context.is_disposed()
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.inner.released.load(Ordering::SeqCst) {
            return Err(Error::disposed("object"));
        }
        self.inner.context.ensure_alive()
    }

    /// Handle to pass to the engine behind `cx`
    pub(crate) fn handle_in(&self, cx: &JsContext) -> Result<ObjectHandle> {
        if !self.inner.context.ptr_eq(cx) {
            return Err(Error::Resolution(format!(
                "{:?} belongs to another context",
                self.inner.handle
            )));
        }
        self.ensure_alive()?;
        Ok(self.inner.handle)
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.ensure_alive()?;
        let handle = self.handle();
        self.context()
            .run(None, |native| Ok(native.get_property(handle, name)?))
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_alive()?;
        let cx = self.context();
        let tagged = codec::encode(&value.into(), cx)?;
        let handle = self.handle();
        cx.run(None, |native| Ok(native.set_property(handle, name, tagged)?))
            .map(drop)
    }

    pub fn get_index(&self, index: u32) -> Result<Value> {
        self.ensure_alive()?;
        let handle = self.handle();
        self.context()
            .run(None, |native| Ok(native.get_index(handle, index)?))
    }

    pub fn set_index(&self, index: u32, value: impl Into<Value>) -> Result<()> {
        self.ensure_alive()?;
        let cx = self.context();
        let tagged = codec::encode(&value.into(), cx)?;
        let handle = self.handle();
        cx.run(None, |native| Ok(native.set_index(handle, index, tagged)?))
            .map(drop)
    }

    /// `delete object[name]`
    pub fn delete(&self, name: &str) -> Result<bool> {
        self.ensure_alive()?;
        let handle = self.handle();
        let deleted = self
            .context()
            .run(None, |native| Ok(native.delete_property(handle, name)?))?;
        Ok(deleted.as_bool().unwrap_or(false))
    }

    /// Own enumerable property names
    pub fn property_names(&self) -> Result<Vec<String>> {
        self.ensure_alive()?;
        let handle = self.handle();
        let names = self
            .context()
            .run_raw(None, |native| Ok(native.property_names(handle)?))?;
        let names = names
            .into_values()
            .ok_or_else(|| Error::Internal("property names are not a value run".to_string()))?;
        Ok(names.into_iter().filter_map(|name| name.into_string()).collect())
    }

    /// Call the method `name` with this object as the receiver
    pub fn invoke_method(&self, name: &str, args: &[Value]) -> Result<Value> {
        self.ensure_alive()?;
        let cx = self.context();
        let args = encode_all(args, cx)?;
        let handle = self.handle();
        cx.run(None, |native| Ok(native.invoke_property(handle, name, args)?))
    }

    /// Release the pin now rather than when the last clone is dropped.
    /// Idempotent; later operations fail with [`Error::Disposed`].
    pub fn dispose(&self) {
        if !self.inner.released.swap(true, Ordering::SeqCst) {
            self.inner.context.release(self.inner.handle);
        }
    }
}

impl PartialEq for JsObject {
    fn eq(&self, other: &JsObject) -> bool {
        self.inner.context.ptr_eq(&other.inner.context) && self.inner.handle == other.inner.handle
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsObject")
            .field("context", &self.inner.context.id())
            .field("handle", &self.inner.handle)
            .finish()
    }
}

fn encode_all(values: &[Value], cx: &JsContext) -> Result<Vec<tether_sdk::TaggedValue>> {
    values.iter().map(|value| codec::encode(value, cx)).collect()
}

// ============================================================================
// JsArray
// ============================================================================

/// A script array held by host code
#[derive(Debug, Clone, PartialEq)]
pub struct JsArray(JsObject);

impl JsArray {
    pub(crate) fn new(object: JsObject) -> Self {
        Self(object)
    }

    pub fn as_object(&self) -> &JsObject {
        &self.0
    }

    pub fn len(&self) -> Result<u32> {
        self.0.ensure_alive()?;
        let handle = self.0.handle();
        self.0
            .context()
            .with_native(|native| Ok(native.array_length(handle)?))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, index: u32) -> Result<Value> {
        self.0.get_index(index)
    }

    pub fn set(&self, index: u32, value: impl Into<Value>) -> Result<()> {
        self.0.set_index(index, value)
    }

    /// Every element, in order
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        (0..self.len()?).map(|index| self.get(index)).collect()
    }
}

// ============================================================================
// JsFunction
// ============================================================================

/// A script function held by host code
#[derive(Debug, Clone, PartialEq)]
pub struct JsFunction(JsObject);

impl JsFunction {
    pub(crate) fn new(object: JsObject) -> Self {
        Self(object)
    }

    pub fn as_object(&self) -> &JsObject {
        &self.0
    }

    /// Call with `receiver` as `this`
    pub fn call(&self, receiver: impl Into<Value>, args: &[Value]) -> Result<Value> {
        self.0.ensure_alive()?;
        let cx = self.0.context();
        let receiver = codec::encode(&receiver.into(), cx)?;
        let args = encode_all(args, cx)?;
        let handle = self.0.handle();
        cx.run(None, |native| {
            Ok(native.invoke_function(handle, receiver, args)?)
        })
    }
}
