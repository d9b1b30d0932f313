//! Host proxy objects
//!
//! A proxy stands in for a host object identified by `(slot, template)`.
//! One slot may be presented under several templates; the slot is only
//! reported removed once its last proxy has been collected. Operations
//! consult the template's callbacks first; a callback that is absent or
//! answers `Empty` falls through to the proxy's own property bag and then
//! the prototype chain.

use std::sync::Arc;

use tether_sdk::{TaggedValue, TemplateId};
use tracing::trace;

use crate::parser::ast::Name;
use crate::stats;
use crate::vm::heap::{HeapObject, ObjectId, ObjectKind};
use crate::vm::realm::{Abrupt, Completion, ErrorKind, Realm};
use crate::vm::value::Value;

/// What a callback answered
enum Answer {
    NotHandled,
    Handled(Value),
}

impl Realm {
    /// Proxy for `(slot, template)`, created on first use
    pub(crate) fn proxy_for(&self, slot: i32, template: TemplateId) -> Option<ObjectId> {
        if let Some(&id) = self.proxies.borrow().get(&(slot, template)) {
            if self.heap.borrow().is_live(id) {
                return Some(id);
            }
        }
        let callbacks = self.template(template)?;

        let mut object = HeapObject::new(
            ObjectKind::HostProxy { slot, template },
            Some(self.intrinsics.object_proto),
        );
        if callbacks.value_of.is_some() {
            object.props.insert_hidden(
                Arc::from("valueOf"),
                Value::Object(self.intrinsics.host_value_of),
            );
        }
        if callbacks.to_string.is_some() {
            object.props.insert_hidden(
                Arc::from("toString"),
                Value::Object(self.intrinsics.host_to_string),
            );
        }
        let id = self.alloc(object);
        self.proxies.borrow_mut().insert((slot, template), id);
        stats::increment(&stats::HOST_PROXIES);
        trace!(slot, template = template.0, "created host proxy");
        Some(id)
    }

    /// Interpret a callback result. Must run after the callback returned so
    /// a termination requested from inside it is observed.
    fn answer(&self, result: TaggedValue) -> Completion<Answer> {
        if let Err(abrupt) = self.check_interrupt() {
            self.release_unclaimed(result);
            return Err(abrupt);
        }
        match result {
            TaggedValue::Empty => Ok(Answer::NotHandled),
            TaggedValue::HostError { slot, template } => Err(self.throw_host_error(slot, template)),
            other => match self.from_tagged(other) {
                Ok(value) => Ok(Answer::Handled(value)),
                Err(err) => Err(self.throw_error(ErrorKind::Error, err.to_string())),
            },
        }
    }

    /// Give back host slots in a callback result that will never be proxied.
    /// Slots that already have a proxy stay pinned until it is collected.
    fn release_unclaimed(&self, result: TaggedValue) {
        match result {
            TaggedValue::HostValue { slot, template } | TaggedValue::HostError { slot, template } => {
                if self.proxies.borrow().keys().any(|&(proxied, _)| proxied == slot) {
                    return;
                }
                trace!(slot, template = template.0, "releasing unclaimed host slot");
                if let Some(callbacks) = self.template(template) {
                    (callbacks.remove)(self.context_id, slot);
                }
            }
            TaggedValue::Array(items) => {
                for item in items.into_vec() {
                    self.release_unclaimed(item);
                }
            }
            _ => {}
        }
    }

    /// Throw the proxy of a host error record
    pub(crate) fn throw_host_error(&self, slot: i32, template: TemplateId) -> Abrupt {
        match self.proxy_for(slot, template) {
            Some(id) => self.throw_value(Value::Object(id)),
            None => self.throw_error(ErrorKind::Error, format!("Unknown template: {}", template)),
        }
    }

    pub(crate) fn proxy_get(
        &self,
        id: ObjectId,
        slot: i32,
        template: TemplateId,
        key: &str,
    ) -> Completion<Value> {
        if let Some(get) = self.template(template).and_then(|c| c.get_property) {
            trace!(slot, key, "proxy get");
            if let Answer::Handled(value) = self.answer(get(self.context_id, slot, key))? {
                return Ok(value);
            }
        }
        self.ordinary_get(id, key)
    }

    pub(crate) fn proxy_set(
        &self,
        id: ObjectId,
        slot: i32,
        template: TemplateId,
        key: Name,
        value: Value,
    ) -> Completion<()> {
        if let Some(set) = self.template(template).and_then(|c| c.set_property) {
            trace!(slot, key = &*key, "proxy set");
            let tagged = self.to_tagged(&value);
            if let Answer::Handled(_) = self.answer(set(self.context_id, slot, &key, tagged))? {
                return Ok(());
            }
        }
        self.ordinary_set(id, key, value)
    }

    pub(crate) fn proxy_delete(
        &self,
        id: ObjectId,
        slot: i32,
        template: TemplateId,
        key: &str,
    ) -> Completion<bool> {
        if let Some(delete) = self.template(template).and_then(|c| c.delete_property) {
            trace!(slot, key, "proxy delete");
            if let Answer::Handled(value) = self.answer(delete(self.context_id, slot, key))? {
                return Ok(match value {
                    Value::Bool(deleted) => deleted,
                    other => other.truthy(),
                });
            }
        }
        Ok(self.ordinary_delete(id, key))
    }

    /// Bag keys, then the keys reported by the template
    pub(crate) fn proxy_keys(
        &self,
        id: ObjectId,
        slot: i32,
        template: TemplateId,
    ) -> Completion<Vec<Name>> {
        let mut keys = self.ordinary_keys(id);
        if let Some(enumerate) = self.template(template).and_then(|c| c.enumerate_properties) {
            trace!(slot, "proxy enumerate");
            let result = enumerate(self.context_id, slot);
            if let Err(abrupt) = self.check_interrupt() {
                self.release_unclaimed(result);
                return Err(abrupt);
            }
            let names = match result {
                TaggedValue::HostError { slot, template } => {
                    return Err(self.throw_host_error(slot, template))
                }
                TaggedValue::Array(items) => items.into_vec(),
                TaggedValue::Empty => Vec::new(),
                other => vec![other],
            };
            for name in names {
                let Some(name) = name.into_string() else {
                    continue;
                };
                if !keys.iter().any(|k| **k == *name) {
                    keys.push(Arc::from(name));
                }
            }
        }
        Ok(keys)
    }

    pub(crate) fn proxy_invoke(
        &self,
        slot: i32,
        template: TemplateId,
        args: Vec<Value>,
    ) -> Completion<Value> {
        let Some(invoke) = self.template(template).and_then(|c| c.invoke) else {
            return Err(self.throw_error(ErrorKind::Type, "object is not a function"));
        };
        trace!(slot, args = args.len(), "proxy invoke");
        let args = args.iter().map(|arg| self.to_tagged(arg)).collect();
        match self.answer(invoke(self.context_id, slot, args))? {
            Answer::Handled(value) => Ok(value),
            Answer::NotHandled => Ok(Value::Undefined),
        }
    }

    fn proxy_target(&self, this: &Value) -> Option<(i32, TemplateId)> {
        let id = this.as_object()?;
        self.with_object(id, |o| match o.kind {
            ObjectKind::HostProxy { slot, template } => Some((slot, template)),
            _ => None,
        })
        .flatten()
    }

    pub(crate) fn proxy_value_of(&self, this: Value) -> Completion<Value> {
        let Some((slot, template)) = self.proxy_target(&this) else {
            return Ok(this);
        };
        let Some(value_of) = self.template(template).and_then(|c| c.value_of) else {
            return Ok(this);
        };
        match self.answer(value_of(self.context_id, slot))? {
            Answer::Handled(value) => Ok(value),
            Answer::NotHandled => Ok(this),
        }
    }

    pub(crate) fn proxy_to_string(&self, this: Value) -> Completion<Value> {
        let fallback = || Value::string("[object Object]");
        let Some((slot, template)) = self.proxy_target(&this) else {
            return Ok(fallback());
        };
        let Some(to_string) = self.template(template).and_then(|c| c.to_string) else {
            return Ok(fallback());
        };
        match self.answer(to_string(self.context_id, slot))? {
            Answer::Handled(value @ Value::String(_)) => Ok(value),
            Answer::Handled(value) => Ok(Value::String(self.to_js_string(&value)?)),
            Answer::NotHandled => Ok(fallback()),
        }
    }
}
