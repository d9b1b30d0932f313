//! Boundary value codec
//!
//! Converts host [`Value`]s to [`TaggedValue`]s and back. Encoding a host
//! object pins it in the context's keep-alive store and picks the template
//! that will service its proxy; extracting a script object wraps its pinned
//! handle in a host handle that releases the pin when dropped.

use chrono::DateTime;
use tether_engine::ScriptContext;
use tether_sdk::{EngineErrorInfo, TaggedValue};
use tracing::warn;

use crate::context::JsContext;
use crate::error::{Error, Result, ScriptError};
use crate::object::{JsArray, JsFunction, JsObject};
use crate::value::Value;

/// Encode `value` for the engine behind `cx`
pub fn encode(value: &Value, cx: &JsContext) -> Result<TaggedValue> {
    Ok(match value {
        Value::Undefined => TaggedValue::Undefined,
        Value::Null => TaggedValue::Null,
        Value::Boolean(b) => TaggedValue::Boolean(*b),
        Value::Integer(i) => TaggedValue::Integer(*i),
        Value::Index(i) => TaggedValue::Index(*i),
        Value::Number(n) => TaggedValue::Number(*n),
        Value::String(s) => TaggedValue::string(s),
        // Sub-millisecond precision is dropped
        Value::Date(date) => TaggedValue::Date(date.timestamp_millis() as f64),
        Value::Object(object) => TaggedValue::Object(object.handle_in(cx)?),
        Value::Array(array) => TaggedValue::JsArray(array.as_object().handle_in(cx)?),
        Value::Function(function) => TaggedValue::Function(function.as_object().handle_in(cx)?),
        Value::Host(object) => {
            let template = cx.inner.registry.read().select(object);
            let slot = cx.inner.keepalive.lock().insert(object.clone());
            TaggedValue::HostValue { slot, template }
        }
    })
}

/// Decode a value produced by the engine behind `cx`, taking ownership of
/// any pins it carries
pub fn extract(tagged: TaggedValue, cx: &JsContext) -> Result<Value> {
    Ok(match tagged {
        TaggedValue::Empty | TaggedValue::Undefined => Value::Undefined,
        TaggedValue::Null => Value::Null,
        TaggedValue::Boolean(b) => Value::Boolean(b),
        TaggedValue::Integer(i) => Value::Integer(i),
        TaggedValue::Index(i) => Value::Index(i),
        TaggedValue::Number(n) => Value::Number(n),
        TaggedValue::String(units) => Value::String(String::from_utf16_lossy(&units)),
        TaggedValue::Date(time) => date(time),
        TaggedValue::Object(handle) => Value::Object(JsObject::new(cx.clone(), handle)),
        TaggedValue::JsArray(handle) => {
            Value::Array(JsArray::new(JsObject::new(cx.clone(), handle)))
        }
        TaggedValue::Function(handle) => {
            Value::Function(JsFunction::new(JsObject::new(cx.clone(), handle)))
        }
        TaggedValue::HostValue { slot, .. } | TaggedValue::HostError { slot, .. } => {
            let object = cx.inner.keepalive.lock().get(slot)?;
            Value::Host(object)
        }
        TaggedValue::EngineError(info) => return Err(script_error(info, cx)),
        TaggedValue::Array(items) => {
            // Release whatever the run pinned before failing
            drop(extract_all(items.into_vec(), cx));
            return Err(Error::Internal("unexpected value run".to_string()));
        }
        TaggedValue::Termination => {
            return Err(Error::Internal("unexpected termination value".to_string()))
        }
    })
}

/// Decode every element. All elements are decoded even when one fails, so
/// no pin is left behind.
pub(crate) fn extract_all(values: Vec<TaggedValue>, cx: &JsContext) -> Result<Vec<Value>> {
    let decoded: Vec<Result<Value>> = values.into_iter().map(|value| extract(value, cx)).collect();
    decoded.into_iter().collect()
}

/// Release the pins held by a value that will not be decoded
pub(crate) fn discard(native: &ScriptContext, tagged: TaggedValue) {
    match tagged {
        TaggedValue::Object(handle) | TaggedValue::JsArray(handle) | TaggedValue::Function(handle) => {
            native.release_object(handle);
        }
        TaggedValue::Array(items) => {
            for item in items.into_vec() {
                discard(native, item);
            }
        }
        TaggedValue::EngineError(info) => discard(native, info.error),
        _ => {}
    }
}

/// Error for an uncaught script throw or a compilation failure. A thrown
/// value that cannot be decoded yields the decoding error instead.
pub(crate) fn script_error(mut info: Box<EngineErrorInfo>, cx: &JsContext) -> Error {
    if info.is_syntax_error() {
        return Error::Syntax(Box::new(ScriptError::new(*info, Value::Undefined)));
    }
    let thrown = std::mem::take(&mut info.error);
    match extract(thrown, cx) {
        Ok(value) => Error::Script(Box::new(ScriptError::new(*info, value))),
        Err(err) => {
            warn!(error = %err, thrown = %info.text, "thrown value could not be decoded");
            err
        }
    }
}

/// Invalid times have no date representation and stay numbers
fn date(time: f64) -> Value {
    if !time.is_finite() {
        return Value::Number(time);
    }
    match DateTime::from_timestamp_millis(time as i64) {
        Some(date) => Value::Date(date),
        None => Value::Number(time),
    }
}
