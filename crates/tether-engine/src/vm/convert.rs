//! Conversion between script values and boundary values

use std::sync::Arc;

use tether_sdk::{EngineErrorInfo, ObjectHandle, TaggedValue};

use crate::error::{NativeError, NativeResult};
use crate::parser::parser::ParseError;
use crate::vm::heap::{ObjectId, ObjectKind};
use crate::vm::realm::{Abrupt, Completion, Realm};
use crate::vm::value::Value;

/// Numbers that round-trip through `i32` without loss
fn as_integer(n: f64) -> Option<i32> {
    if n.fract() != 0.0 || n == 0.0 && n.is_sign_negative() {
        return None;
    }
    if n >= i32::MIN as f64 && n <= i32::MAX as f64 {
        Some(n as i32)
    } else {
        None
    }
}

impl Realm {
    /// Encode a value for the host. Objects gain a pin that the host
    /// releases with `release_object`.
    pub(crate) fn to_tagged(&self, value: &Value) -> TaggedValue {
        match value {
            Value::Undefined => TaggedValue::Undefined,
            Value::Null => TaggedValue::Null,
            Value::Bool(b) => TaggedValue::Boolean(*b),
            Value::Number(n) => match as_integer(*n) {
                Some(i) => TaggedValue::Integer(i),
                None => TaggedValue::Number(*n),
            },
            Value::String(s) => TaggedValue::string(s),
            Value::Object(id) => self.object_to_tagged(*id),
        }
    }

    fn object_to_tagged(&self, id: ObjectId) -> TaggedValue {
        enum Shape {
            Date(f64),
            Proxy(i32, tether_sdk::TemplateId),
            Array,
            Function,
            Object,
        }
        let shape = self
            .with_object(id, |o| match o.kind {
                ObjectKind::Date(time) => Shape::Date(time),
                ObjectKind::HostProxy { slot, template } => Shape::Proxy(slot, template),
                ObjectKind::Array(_) => Shape::Array,
                ObjectKind::Function(_) | ObjectKind::Native(_) => Shape::Function,
                _ => Shape::Object,
            })
            .unwrap_or(Shape::Object);
        let handle = ObjectHandle::from(id);
        match shape {
            Shape::Date(time) => TaggedValue::Date(time),
            Shape::Proxy(slot, template) => TaggedValue::HostValue { slot, template },
            Shape::Array => {
                self.pin(id);
                TaggedValue::JsArray(handle)
            }
            Shape::Function => {
                self.pin(id);
                TaggedValue::Function(handle)
            }
            Shape::Object => {
                self.pin(id);
                TaggedValue::Object(handle)
            }
        }
    }

    /// Decode a host value. Handles must refer to live objects.
    pub(crate) fn from_tagged(&self, value: TaggedValue) -> NativeResult<Value> {
        Ok(match value {
            TaggedValue::Empty | TaggedValue::Undefined | TaggedValue::Termination => {
                Value::Undefined
            }
            TaggedValue::Null => Value::Null,
            TaggedValue::Boolean(b) => Value::Bool(b),
            TaggedValue::Integer(i) => Value::Number(f64::from(i)),
            TaggedValue::Index(i) => Value::Number(f64::from(i)),
            TaggedValue::Number(n) => Value::Number(n),
            TaggedValue::String(units) => {
                Value::String(Arc::from(String::from_utf16_lossy(&units)))
            }
            TaggedValue::Date(time) => Value::Object(self.new_date(time)),
            TaggedValue::Array(items) => {
                let items = items
                    .into_vec()
                    .into_iter()
                    .map(|item| self.from_tagged(item))
                    .collect::<NativeResult<Vec<_>>>()?;
                Value::Object(self.new_array(items))
            }
            TaggedValue::Object(handle)
            | TaggedValue::Function(handle)
            | TaggedValue::JsArray(handle) => Value::Object(self.resolve(handle)?),
            TaggedValue::HostValue { slot, template } | TaggedValue::HostError { slot, template } => {
                match self.proxy_for(slot, template) {
                    Some(id) => Value::Object(id),
                    None => return Err(NativeError::UnknownTemplate(template)),
                }
            }
            TaggedValue::EngineError(info) => return self.from_tagged(info.error),
        })
    }

    /// Resolve a host-held handle to a live object
    pub(crate) fn resolve(&self, handle: ObjectHandle) -> NativeResult<ObjectId> {
        let id = ObjectId::from(handle);
        if self.heap.borrow().is_live(id) {
            Ok(id)
        } else {
            Err(NativeError::InvalidHandle(handle))
        }
    }

    /// Encode the outcome of an evaluation
    pub(crate) fn complete(&self, result: Completion<Value>) -> TaggedValue {
        match result {
            Ok(value) => self.to_tagged(&value),
            Err(Abrupt::Terminate) => TaggedValue::Termination,
            Err(Abrupt::Throw(value)) => TaggedValue::engine_error(self.error_info(value)),
        }
    }

    /// Describe an uncaught throw
    fn error_info(&self, thrown: Value) -> EngineErrorInfo {
        let site = self.take_throw_site();
        let mut info = EngineErrorInfo::default();
        if let Some(site) = &site {
            info.resource = site.resource.to_string();
            info.line = site.line;
            info.column = site.column;
            info.frames = site.frames.clone();
        }

        if let Value::Object(id) = &thrown {
            let frames = self
                .with_object(*id, |o| match &o.kind {
                    ObjectKind::Error(frames) => Some(frames.clone()),
                    _ => None,
                })
                .flatten();
            if let Some(frames) = frames {
                info.frames = frames;
                info.name = self.string_property(*id, "name");
                info.message = self.string_property(*id, "message");
                info.stack = self.string_property(*id, "stack");
            }
        }

        // Reading properties or converting may itself throw; the original
        // error is what gets reported.
        info.text = match self.to_js_string(&thrown) {
            Ok(text) => text.to_string(),
            Err(_) => match (&info.name, &info.message) {
                (Some(name), Some(message)) => format!("{}: {}", name, message),
                (Some(name), None) => name.clone(),
                _ => "Uncaught exception".to_string(),
            },
        };
        info.error = self.to_tagged(&thrown);
        info
    }

    fn string_property(&self, id: ObjectId, key: &str) -> Option<String> {
        match self.get_property(id, key) {
            Ok(Value::String(s)) => Some(s.to_string()),
            _ => None,
        }
    }
}

/// Describe a compilation failure
pub(crate) fn syntax_error_info(error: &ParseError, resource: &str) -> EngineErrorInfo {
    EngineErrorInfo {
        name: Some("SyntaxError".to_string()),
        message: Some(error.message.clone()),
        text: format!("SyntaxError: {}", error.message),
        resource: resource.to_string(),
        line: error.line,
        column: error.column.saturating_sub(1),
        stack: None,
        frames: Vec::new(),
        error: TaggedValue::Empty,
    }
}
