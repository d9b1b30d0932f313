//! Execution contexts
//!
//! A [`ScriptContext`] is one global environment with its own heap. Every
//! method takes `&self` so host callbacks running inside an execution can
//! call back into the same context.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tether_sdk::{ContextId, EngineErrorInfo, HostCallbacks, ObjectHandle, ScriptId, TaggedValue, TemplateId};
use tracing::{debug, trace};

use crate::engine::EngineShared;
use crate::error::{NativeError, NativeResult};
use crate::interrupt::TerminateHandle;
use crate::parser::ast::Program;
use crate::parser::parse_program;
use crate::stats;
use crate::vm::convert::syntax_error_info;
use crate::vm::realm::{Completion, ErrorKind, Realm};
use crate::vm::value::Value;

/// Resource name used when the caller supplies none
pub const DEFAULT_RESOURCE: &str = "<Unnamed Script>";

/// Per-context diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextStats {
    /// Objects currently allocated in the heap, intrinsics included
    pub heap_objects: usize,
    /// Live proxies of host objects
    pub host_proxies: usize,
    /// Pins held on behalf of the host
    pub pinned_handles: usize,
    /// Compiled scripts not yet disposed
    pub scripts: usize,
}

pub struct ScriptContext {
    id: ContextId,
    realm: Realm,
    scripts: RefCell<FxHashMap<ScriptId, Arc<Program>>>,
    next_script: Cell<u32>,
    // Keeps the engine's shared state alive for as long as the context
    _engine: Arc<EngineShared>,
}

impl ScriptContext {
    pub(crate) fn new(id: ContextId, engine: Arc<EngineShared>) -> Self {
        let realm = Realm::new(id, engine.interrupts.register(), &engine.options);
        stats::increment(&stats::CONTEXTS);
        debug!(context = id.0, "script context created");
        Self {
            id,
            realm,
            scripts: RefCell::new(FxHashMap::default()),
            next_script: Cell::new(1),
            _engine: engine,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Handle stopping this context only
    pub fn terminate_handle(&self) -> TerminateHandle {
        TerminateHandle::context(self.realm.interrupt.clone())
    }

    /// Whether script code is running on this context
    pub fn is_executing(&self) -> bool {
        self.realm.is_executing()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Parse and run `source`, returning its completion value
    pub fn execute(&self, source: &str, resource: Option<&str>) -> TaggedValue {
        let resource = resource.unwrap_or(DEFAULT_RESOURCE);
        trace!(context = self.id.0, resource, "execute");
        self.realm.enter(|| match parse_program(source, resource) {
            Ok(program) => {
                let result = self.realm.run_program(&program);
                self.realm.complete(result)
            }
            Err(err) => TaggedValue::engine_error(syntax_error_info(&err, resource)),
        })
    }

    /// Parse `source` for later execution
    pub fn compile(
        &self,
        source: &str,
        resource: Option<&str>,
    ) -> Result<ScriptId, Box<EngineErrorInfo>> {
        let resource = resource.unwrap_or(DEFAULT_RESOURCE);
        let program = parse_program(source, resource)
            .map_err(|err| Box::new(syntax_error_info(&err, resource)))?;
        let id = ScriptId(self.next_script.get());
        self.next_script.set(id.0 + 1);
        self.scripts.borrow_mut().insert(id, Arc::new(program));
        stats::increment(&stats::SCRIPTS);
        debug!(context = self.id.0, script = id.0, resource, "script compiled");
        Ok(id)
    }

    pub fn execute_script(&self, id: ScriptId) -> NativeResult<TaggedValue> {
        let program = self
            .scripts
            .borrow()
            .get(&id)
            .cloned()
            .ok_or(NativeError::UnknownScript(id))?;
        Ok(self.realm.enter(|| {
            let result = self.realm.run_program(&program);
            self.realm.complete(result)
        }))
    }

    /// Release a compiled script; unknown ids are ignored
    pub fn dispose_script(&self, id: ScriptId) -> bool {
        let removed = self.scripts.borrow_mut().remove(&id).is_some();
        if removed {
            stats::decrement(&stats::SCRIPTS);
            debug!(context = self.id.0, script = id.0, "script disposed");
        }
        removed
    }

    // ========================================================================
    // Globals
    // ========================================================================

    pub fn get_variable(&self, name: &str) -> TaggedValue {
        self.realm.enter(|| {
            let value = self
                .realm
                .lookup(self.realm.intrinsics.global, name)
                .unwrap_or(Value::Undefined);
            self.realm.to_tagged(&value)
        })
    }

    pub fn set_variable(&self, name: &str, value: TaggedValue) -> NativeResult<()> {
        self.realm.enter(|| {
            let value = self.realm.from_tagged(value)?;
            self.realm
                .declare(self.realm.intrinsics.global, Arc::from(name), value, true);
            Ok(())
        })
    }

    // ========================================================================
    // Objects
    // ========================================================================

    /// Run `f` against a live object and encode its completion
    fn with_handle(
        &self,
        handle: ObjectHandle,
        f: impl FnOnce(&Realm, crate::vm::heap::ObjectId) -> NativeResult<Completion<Value>>,
    ) -> NativeResult<TaggedValue> {
        self.realm.enter(|| {
            let id = self.realm.resolve(handle)?;
            let result = f(&self.realm, id)?;
            Ok(self.realm.complete(result))
        })
    }

    pub fn get_property(&self, handle: ObjectHandle, name: &str) -> NativeResult<TaggedValue> {
        self.with_handle(handle, |realm, id| Ok(realm.get_property(id, name)))
    }

    pub fn set_property(
        &self,
        handle: ObjectHandle,
        name: &str,
        value: TaggedValue,
    ) -> NativeResult<TaggedValue> {
        self.with_handle(handle, |realm, id| {
            let value = realm.from_tagged(value)?;
            Ok(realm
                .set_property(id, Arc::from(name), value)
                .map(|()| Value::Undefined))
        })
    }

    /// `delete object[name]`; a handled result is a boolean
    pub fn delete_property(&self, handle: ObjectHandle, name: &str) -> NativeResult<TaggedValue> {
        self.with_handle(handle, |realm, id| {
            Ok(realm.delete(&Value::Object(id), name).map(Value::Bool))
        })
    }

    pub fn get_index(&self, handle: ObjectHandle, index: u32) -> NativeResult<TaggedValue> {
        self.get_property(handle, &index.to_string())
    }

    pub fn set_index(
        &self,
        handle: ObjectHandle,
        index: u32,
        value: TaggedValue,
    ) -> NativeResult<TaggedValue> {
        self.set_property(handle, &index.to_string(), value)
    }

    /// Own enumerable property names as an `Array` of strings
    pub fn property_names(&self, handle: ObjectHandle) -> NativeResult<TaggedValue> {
        self.realm.enter(|| {
            let id = self.realm.resolve(handle)?;
            Ok(match self.realm.own_keys(id) {
                Ok(keys) => TaggedValue::from_names(keys),
                Err(abrupt) => self.realm.complete(Err(abrupt)),
            })
        })
    }

    pub fn array_length(&self, handle: ObjectHandle) -> NativeResult<u32> {
        let id = self.realm.resolve(handle)?;
        let items = self
            .realm
            .array_items(id)
            .ok_or(NativeError::NotAnArray(handle))?;
        Ok(u32::try_from(items.len()).unwrap_or(u32::MAX))
    }

    /// Call `object[name](...args)` with `object` as the receiver
    pub fn invoke_property(
        &self,
        handle: ObjectHandle,
        name: &str,
        args: Vec<TaggedValue>,
    ) -> NativeResult<TaggedValue> {
        self.with_handle(handle, |realm, id| {
            let args = decode_all(realm, args)?;
            Ok(realm.get_property(id, name).and_then(|method| {
                if !realm.is_callable(&method) {
                    return Err(realm.throw_error(
                        ErrorKind::Type,
                        format!("{} is not a function", name),
                    ));
                }
                realm.call(method, Value::Object(id), args)
            }))
        })
    }

    /// Call a function object with an explicit receiver
    pub fn invoke_function(
        &self,
        handle: ObjectHandle,
        receiver: TaggedValue,
        args: Vec<TaggedValue>,
    ) -> NativeResult<TaggedValue> {
        self.with_handle(handle, |realm, id| {
            let this = realm.from_tagged(receiver)?;
            let args = decode_all(realm, args)?;
            Ok(realm.call(Value::Object(id), this, args))
        })
    }

    /// Create an empty object; the result is a pinned `Object` handle
    pub fn new_object(&self) -> TaggedValue {
        let id = self.realm.new_object();
        self.realm.to_tagged(&Value::Object(id))
    }

    /// Create an array; the result is a pinned `JsArray` handle
    pub fn new_array(&self, items: Vec<TaggedValue>) -> NativeResult<TaggedValue> {
        let items = decode_all(&self.realm, items)?;
        let id = self.realm.new_array(items);
        Ok(self.realm.to_tagged(&Value::Object(id)))
    }

    /// Drop one pin taken when `handle` was handed out
    pub fn release_object(&self, handle: ObjectHandle) -> bool {
        self.realm.unpin(handle.into())
    }

    // ========================================================================
    // Templates and collection
    // ========================================================================

    /// Register a callback table; ids are assigned in registration order
    pub fn add_template(&self, callbacks: HostCallbacks) -> TemplateId {
        let mut templates = self.realm.templates.borrow_mut();
        let id = TemplateId(i32::try_from(templates.len()).unwrap_or(i32::MAX));
        templates.push(callbacks);
        trace!(context = self.id.0, template = id.0, "template added");
        id
    }

    /// Sweep unreachable objects. Does nothing while script code runs.
    pub fn collect_garbage(&self) -> usize {
        if self.realm.is_executing() {
            return 0;
        }
        let freed = self.realm.collect_garbage();
        debug!(context = self.id.0, freed, "garbage collected");
        freed
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            heap_objects: self.realm.heap.borrow().len(),
            host_proxies: self.realm.proxies.borrow().len(),
            pinned_handles: self.realm.pinned_count(),
            scripts: self.scripts.borrow().len(),
        }
    }
}

fn decode_all(realm: &Realm, values: Vec<TaggedValue>) -> NativeResult<Vec<Value>> {
    values
        .into_iter()
        .map(|value| realm.from_tagged(value))
        .collect()
}

impl Drop for ScriptContext {
    fn drop(&mut self) {
        stats::release(&stats::OBJECT_HANDLES, self.realm.pinned_count());
        stats::release(&stats::HOST_PROXIES, self.realm.proxies.borrow().len());
        stats::release(&stats::SCRIPTS, self.scripts.borrow().len());
        stats::decrement(&stats::CONTEXTS);
        debug!(context = self.id.0, "script context released");
    }
}
