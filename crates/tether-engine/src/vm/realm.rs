//! Realm: the heap, intrinsics and execution state of one context
//!
//! All interpreter entry points take `&self`. State lives behind `RefCell`s
//! and `Cell`s whose borrows never span a call into host code, so a host
//! callback may re-enter the context API while script code is running.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tether_sdk::{ContextId, HostCallbacks, StackFrame, TemplateId};

use crate::interrupt::Interrupt;
use crate::parser::ast::Name;
use crate::parser::token::Span;
use crate::stats;
use crate::vm::builtins::{self, Intrinsics};
use crate::vm::heap::{Binding, Heap, HeapObject, ObjectId, ObjectKind, Scope};
use crate::vm::value::{array_index, number_to_string, string_to_number, utf16_len, Value};

/// Abrupt completion of an evaluation
#[derive(Debug)]
pub(crate) enum Abrupt {
    /// A script-level throw
    Throw(Value),
    /// Termination requested; unwinds through catch and finally
    Terminate,
}

pub(crate) type Completion<T> = Result<T, Abrupt>;

/// Native error constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error = 0,
    Type = 1,
    Range = 2,
    Reference = 3,
    Syntax = 4,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Error,
        ErrorKind::Type,
        ErrorKind::Range,
        ErrorKind::Reference,
        ErrorKind::Syntax,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::Type => "TypeError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Reference => "ReferenceError",
            ErrorKind::Syntax => "SyntaxError",
        }
    }
}

/// ToPrimitive hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hint {
    Default,
    Number,
    String,
}

/// Activation record used for stack traces and `this`
#[derive(Debug)]
pub(crate) struct Frame {
    pub function: Option<Name>,
    pub resource: Name,
    pub line: u32,
    pub column: u32,
    pub this: Value,
}

/// Where the most recent throw happened
#[derive(Debug, Clone)]
pub(crate) struct ThrowSite {
    pub resource: Name,
    pub line: u32,
    /// 0-based
    pub column: u32,
    pub frames: Vec<StackFrame>,
}

/// Engine tuning knobs
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Nested script calls allowed before a `RangeError` is thrown
    pub max_call_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self { max_call_depth: 100 }
    }
}

impl EngineOptions {
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

pub(crate) struct Realm {
    pub(crate) heap: RefCell<Heap>,
    pub(crate) intrinsics: Intrinsics,
    pub(crate) context_id: ContextId,
    pub(crate) interrupt: Arc<Interrupt>,
    pub(crate) templates: RefCell<Vec<HostCallbacks>>,
    pub(crate) proxies: RefCell<FxHashMap<(i32, TemplateId), ObjectId>>,
    pub(crate) pins: RefCell<FxHashMap<ObjectId, u32>>,
    frames: RefCell<Vec<Frame>>,
    /// Nesting depth of API entry points currently executing
    active: Cell<u32>,
    last_throw: RefCell<Option<ThrowSite>>,
    max_call_depth: usize,
}

impl Realm {
    pub(crate) fn new(
        context_id: ContextId,
        interrupt: Arc<Interrupt>,
        options: &EngineOptions,
    ) -> Self {
        let mut heap = Heap::new();
        let intrinsics = builtins::install(&mut heap);
        Self {
            heap: RefCell::new(heap),
            intrinsics,
            context_id,
            interrupt,
            templates: RefCell::new(Vec::new()),
            proxies: RefCell::new(FxHashMap::default()),
            pins: RefCell::new(FxHashMap::default()),
            frames: RefCell::new(Vec::new()),
            active: Cell::new(0),
            last_throw: RefCell::new(None),
            max_call_depth: options.max_call_depth.max(1),
        }
    }

    // ========================================================================
    // Entry and interruption
    // ========================================================================

    /// Run `f` as an API entry point. This context's termination request
    /// is withdrawn when the outermost entry returns.
    pub(crate) fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        if self.active.get() == 0 {
            self.interrupt.set_running(true);
        }
        self.active.set(self.active.get() + 1);
        let result = f();
        let depth = self.active.get() - 1;
        self.active.set(depth);
        if depth == 0 {
            self.interrupt.set_running(false);
            self.interrupt.cancel();
            self.last_throw.borrow_mut().take();
        }
        result
    }

    pub(crate) fn is_executing(&self) -> bool {
        self.active.get() > 0
    }

    #[inline]
    pub(crate) fn check_interrupt(&self) -> Completion<()> {
        if self.interrupt.is_requested() {
            Err(Abrupt::Terminate)
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Frames
    // ========================================================================

    pub(crate) fn push_frame(&self, frame: Frame) -> Completion<()> {
        let mut frames = self.frames.borrow_mut();
        if frames.len() >= self.max_call_depth {
            drop(frames);
            return Err(self.throw_error(ErrorKind::Range, "Maximum call stack size exceeded"));
        }
        frames.push(frame);
        Ok(())
    }

    pub(crate) fn pop_frame(&self) {
        self.frames.borrow_mut().pop();
    }

    /// Record the position currently executing in the innermost frame
    pub(crate) fn set_position(&self, span: Span) {
        if let Some(frame) = self.frames.borrow_mut().last_mut() {
            frame.line = span.line;
            frame.column = span.column;
        }
    }

    pub(crate) fn this_value(&self) -> Value {
        self.frames
            .borrow()
            .last()
            .map(|frame| frame.this.clone())
            .unwrap_or(Value::Undefined)
    }

    /// Frames innermost first
    pub(crate) fn capture_frames(&self) -> Vec<StackFrame> {
        self.frames
            .borrow()
            .iter()
            .rev()
            .map(|frame| StackFrame {
                resource: frame.resource.to_string(),
                function: frame.function.as_ref().map(|f| f.to_string()),
                line: frame.line,
                column: frame.column,
            })
            .collect()
    }

    pub(crate) fn take_throw_site(&self) -> Option<ThrowSite> {
        self.last_throw.borrow_mut().take()
    }

    // ========================================================================
    // Throwing
    // ========================================================================

    /// Throw `value` from the current position of the innermost frame
    pub(crate) fn throw_value(&self, value: Value) -> Abrupt {
        let site = {
            let frames = self.frames.borrow();
            frames.last().map(|frame| ThrowSite {
                resource: frame.resource.clone(),
                line: frame.line,
                column: frame.column.saturating_sub(1),
                frames: Vec::new(),
            })
        };
        if let Some(mut site) = site {
            site.frames = self.capture_frames();
            *self.last_throw.borrow_mut() = Some(site);
        }
        Abrupt::Throw(value)
    }

    /// Throw `value` from a `throw` statement at `span`
    pub(crate) fn throw_at(&self, value: Value, span: Span) -> Abrupt {
        self.set_position(span);
        self.throw_value(value)
    }

    /// Construct and throw a native error
    pub(crate) fn throw_error(&self, kind: ErrorKind, message: impl AsRef<str>) -> Abrupt {
        let error = self.make_error(kind, Some(Arc::from(message.as_ref())));
        self.throw_value(Value::Object(error))
    }

    /// Allocate an error object, capturing the current frames
    pub(crate) fn make_error(&self, kind: ErrorKind, message: Option<Arc<str>>) -> ObjectId {
        let frames = self.capture_frames();
        let head = match message.as_deref() {
            Some(m) if !m.is_empty() => format!("{}: {}", kind.name(), m),
            _ => kind.name().to_string(),
        };
        let stack: String = std::iter::once(head)
            .chain(frames.iter().map(|frame| format!("\n    at {}", frame)))
            .collect();
        let proto = self.intrinsics.error_protos[kind as usize];
        let mut object = HeapObject::new(ObjectKind::Error(frames), Some(proto));
        if let Some(message) = message {
            object.props.insert_hidden(Arc::from("message"), Value::String(message));
        }
        object
            .props
            .insert_hidden(Arc::from("stack"), Value::String(Arc::from(stack)));
        self.alloc(object)
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    pub(crate) fn alloc(&self, object: HeapObject) -> ObjectId {
        self.heap.borrow_mut().alloc(object)
    }

    pub(crate) fn new_object(&self) -> ObjectId {
        self.alloc(HeapObject::new(
            ObjectKind::Ordinary,
            Some(self.intrinsics.object_proto),
        ))
    }

    pub(crate) fn new_array(&self, items: Vec<Value>) -> ObjectId {
        self.alloc(HeapObject::new(
            ObjectKind::Array(items),
            Some(self.intrinsics.array_proto),
        ))
    }

    pub(crate) fn new_date(&self, time: f64) -> ObjectId {
        self.alloc(HeapObject::new(
            ObjectKind::Date(time),
            Some(self.intrinsics.date_proto),
        ))
    }

    pub(crate) fn new_scope(&self, parent: Option<ObjectId>) -> ObjectId {
        self.alloc(HeapObject::new(
            ObjectKind::Scope(Scope {
                vars: FxHashMap::default(),
                parent,
            }),
            None,
        ))
    }

    /// Inspect an object; `None` when the id is stale
    pub(crate) fn with_object<R>(&self, id: ObjectId, f: impl FnOnce(&HeapObject) -> R) -> Option<R> {
        self.heap.borrow().get(id).map(f)
    }

    pub(crate) fn with_object_mut<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&mut HeapObject) -> R,
    ) -> Option<R> {
        self.heap.borrow_mut().get_mut(id).map(f)
    }

    pub(crate) fn array_items(&self, id: ObjectId) -> Option<Vec<Value>> {
        self.with_object(id, |object| match &object.kind {
            ObjectKind::Array(items) => Some(items.clone()),
            _ => None,
        })
        .flatten()
    }

    pub(crate) fn is_array(&self, value: &Value) -> bool {
        value.as_object().is_some_and(|id| {
            self.with_object(id, |o| matches!(o.kind, ObjectKind::Array(_)))
                .unwrap_or(false)
        })
    }

    // ========================================================================
    // Scopes
    // ========================================================================

    /// Create or overwrite a binding in `scope`
    pub(crate) fn declare(&self, scope: ObjectId, name: Name, value: Value, mutable: bool) {
        self.with_object_mut(scope, |object| {
            if let ObjectKind::Scope(scope) = &mut object.kind {
                scope.vars.insert(name, Binding { value, mutable });
            }
        });
    }

    /// Declare `name` as `undefined` unless it is already bound in `scope`
    pub(crate) fn declare_hoisted(&self, scope: ObjectId, name: &Name) {
        self.with_object_mut(scope, |object| {
            if let ObjectKind::Scope(scope) = &mut object.kind {
                scope.vars.entry(name.clone()).or_insert(Binding {
                    value: Value::Undefined,
                    mutable: true,
                });
            }
        });
    }

    /// Resolve a binding along the scope chain
    pub(crate) fn lookup(&self, scope: ObjectId, name: &str) -> Option<Value> {
        let heap = self.heap.borrow();
        let mut current = Some(scope);
        while let Some(id) = current {
            let ObjectKind::Scope(scope) = &heap.get(id)?.kind else {
                return None;
            };
            if let Some(binding) = scope.vars.get(name) {
                return Some(binding.value.clone());
            }
            current = scope.parent;
        }
        None
    }

    /// Assign to the nearest binding of `name`; unresolved names become
    /// globals.
    pub(crate) fn assign(&self, scope: ObjectId, name: &Name, value: Value) -> Completion<()> {
        enum Outcome {
            Done,
            Constant,
            Unresolved,
        }
        let outcome = {
            let mut heap = self.heap.borrow_mut();
            let mut current = Some(scope);
            let mut outcome = Outcome::Unresolved;
            while let Some(id) = current {
                let Some(HeapObject {
                    kind: ObjectKind::Scope(scope),
                    ..
                }) = heap.get_mut(id)
                else {
                    break;
                };
                if let Some(binding) = scope.vars.get_mut(name) {
                    outcome = if binding.mutable {
                        binding.value = value.clone();
                        Outcome::Done
                    } else {
                        Outcome::Constant
                    };
                    break;
                }
                current = scope.parent;
            }
            outcome
        };
        match outcome {
            Outcome::Done => Ok(()),
            Outcome::Constant => {
                Err(self.throw_error(ErrorKind::Type, "Assignment to constant variable."))
            }
            Outcome::Unresolved => {
                self.declare(self.intrinsics.global, name.clone(), value, true);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Property access
    // ========================================================================

    fn proxy_of(&self, id: ObjectId) -> Option<(i32, TemplateId)> {
        self.with_object(id, |object| match object.kind {
            ObjectKind::HostProxy { slot, template } => Some((slot, template)),
            _ => None,
        })
        .flatten()
    }

    /// Property read on any value
    pub(crate) fn get(&self, target: &Value, key: &str) -> Completion<Value> {
        let proto = match target {
            Value::Object(id) => return self.get_property(*id, key),
            Value::Undefined | Value::Null => {
                return Err(self.throw_error(
                    ErrorKind::Type,
                    format!(
                        "Cannot read properties of {} (reading '{}')",
                        self.primitive_string(target),
                        key
                    ),
                ))
            }
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(utf16_len(s) as f64));
                }
                if let Some(index) = array_index(key) {
                    let unit = s.encode_utf16().nth(index as usize);
                    return Ok(unit
                        .map(|u| Value::String(Arc::from(String::from_utf16_lossy(&[u]))))
                        .unwrap_or(Value::Undefined));
                }
                self.intrinsics.string_proto
            }
            Value::Number(_) => self.intrinsics.number_proto,
            Value::Bool(_) => self.intrinsics.boolean_proto,
        };
        self.ordinary_get(proto, key)
    }

    /// Property read on an object, dispatching to host templates for proxies
    pub(crate) fn get_property(&self, id: ObjectId, key: &str) -> Completion<Value> {
        match self.proxy_of(id) {
            Some((slot, template)) => self.proxy_get(id, slot, template, key),
            None => self.ordinary_get(id, key),
        }
    }

    /// Own properties then the prototype chain, without host dispatch
    pub(crate) fn ordinary_get(&self, id: ObjectId, key: &str) -> Completion<Value> {
        let heap = self.heap.borrow();
        let mut current = Some(id);
        while let Some(id) = current {
            let Some(object) = heap.get(id) else {
                break;
            };
            if let ObjectKind::Array(items) = &object.kind {
                if key == "length" {
                    return Ok(Value::Number(items.len() as f64));
                }
                if let Some(index) = array_index(key) {
                    if let Some(item) = items.get(index as usize) {
                        return Ok(item.clone());
                    }
                }
            }
            if let Some(property) = object.props.get(key) {
                return Ok(property.value.clone());
            }
            current = object.proto;
        }
        Ok(Value::Undefined)
    }

    /// Property write on any value
    pub(crate) fn put(&self, target: &Value, key: Name, value: Value) -> Completion<()> {
        match target {
            Value::Object(id) => self.set_property(*id, key, value),
            Value::Undefined | Value::Null => Err(self.throw_error(
                ErrorKind::Type,
                format!(
                    "Cannot set properties of {} (setting '{}')",
                    self.primitive_string(target),
                    key
                ),
            )),
            // Writes to primitives are dropped
            _ => Ok(()),
        }
    }

    pub(crate) fn set_property(&self, id: ObjectId, key: Name, value: Value) -> Completion<()> {
        match self.proxy_of(id) {
            Some((slot, template)) => self.proxy_set(id, slot, template, key, value),
            None => self.ordinary_set(id, key, value),
        }
    }

    pub(crate) fn ordinary_set(&self, id: ObjectId, key: Name, value: Value) -> Completion<()> {
        let invalid_length = {
            let mut heap = self.heap.borrow_mut();
            let Some(object) = heap.get_mut(id) else {
                return Ok(());
            };
            let mut invalid_length = false;
            let mut stored = false;
            if let ObjectKind::Array(items) = &mut object.kind {
                if &*key == "length" {
                    match value {
                        Value::Number(n) if n >= 0.0 && n.fract() == 0.0 && n < 4294967296.0 => {
                            items.resize(n as usize, Value::Undefined);
                        }
                        _ => invalid_length = true,
                    }
                    stored = true;
                } else if let Some(index) = array_index(&key) {
                    let index = index as usize;
                    // Sparse writes far past the end are kept as plain properties
                    if index < items.len() + 1_000_000 {
                        if index >= items.len() {
                            items.resize(index + 1, Value::Undefined);
                        }
                        items[index] = value.clone();
                        stored = true;
                    }
                }
            }
            if !stored {
                object.props.insert(key, value);
            }
            invalid_length
        };
        if invalid_length {
            return Err(self.throw_error(ErrorKind::Range, "Invalid array length"));
        }
        Ok(())
    }

    /// `delete target[key]`
    pub(crate) fn delete(&self, target: &Value, key: &str) -> Completion<bool> {
        match target {
            Value::Object(id) => match self.proxy_of(*id) {
                Some((slot, template)) => self.proxy_delete(*id, slot, template, key),
                None => Ok(self.ordinary_delete(*id, key)),
            },
            Value::Undefined | Value::Null => Err(self.throw_error(
                ErrorKind::Type,
                format!(
                    "Cannot convert {} to object",
                    self.primitive_string(target)
                ),
            )),
            _ => Ok(true),
        }
    }

    pub(crate) fn ordinary_delete(&self, id: ObjectId, key: &str) -> bool {
        self.with_object_mut(id, |object| {
            if let ObjectKind::Array(items) = &mut object.kind {
                if key == "length" {
                    return false;
                }
                if let Some(index) = array_index(key) {
                    if let Some(item) = items.get_mut(index as usize) {
                        *item = Value::Undefined;
                        return true;
                    }
                }
            }
            object.props.remove(key);
            true
        })
        .unwrap_or(true)
    }

    /// Own enumerable keys in property order
    pub(crate) fn own_keys(&self, id: ObjectId) -> Completion<Vec<Name>> {
        if let Some((slot, template)) = self.proxy_of(id) {
            return self.proxy_keys(id, slot, template);
        }
        Ok(self.ordinary_keys(id))
    }

    pub(crate) fn ordinary_keys(&self, id: ObjectId) -> Vec<Name> {
        self.with_object(id, |object| {
            let mut keys: Vec<Name> = match &object.kind {
                ObjectKind::Array(items) => (0..items.len())
                    .map(|i| Arc::from(i.to_string().as_str()))
                    .collect(),
                _ => Vec::new(),
            };
            keys.extend(object.props.keys());
            keys
        })
        .unwrap_or_default()
    }

    /// Own property check without consulting host templates
    pub(crate) fn has_own(&self, id: ObjectId, key: &str) -> bool {
        self.with_object(id, |object| {
            if let ObjectKind::Array(items) = &object.kind {
                if key == "length" || array_index(key).is_some_and(|i| (i as usize) < items.len()) {
                    return true;
                }
            }
            object.props.contains(key)
        })
        .unwrap_or(false)
    }

    /// `key in object`
    pub(crate) fn has_property(&self, id: ObjectId, key: &str) -> Completion<bool> {
        if self.proxy_of(id).is_some() {
            if self.has_own(id, key) {
                return Ok(true);
            }
            let value = self.get_property(id, key)?;
            return Ok(value != Value::Undefined);
        }
        let mut current = Some(id);
        while let Some(id) = current {
            if self.has_own(id, key) {
                return Ok(true);
            }
            current = self.with_object(id, |o| o.proto).flatten();
        }
        Ok(false)
    }

    pub(crate) fn proto_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.with_object(id, |o| o.proto).flatten()
    }

    // ========================================================================
    // Type conversion
    // ========================================================================

    pub(crate) fn is_callable(&self, value: &Value) -> bool {
        let Some(id) = value.as_object() else {
            return false;
        };
        match self.proxy_of(id) {
            Some((_, template)) => self
                .template(template)
                .is_some_and(|callbacks| callbacks.invoke.is_some()),
            None => self.with_object(id, HeapObject::is_callable).unwrap_or(false),
        }
    }

    pub(crate) fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) if self.is_callable(value) => "function",
            Value::Object(_) => "object",
        }
    }

    /// String form of a primitive; objects render as `[object Object]`
    pub(crate) fn primitive_string(&self, value: &Value) -> String {
        match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.to_string(),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }

    pub(crate) fn to_primitive(&self, value: Value, hint: Hint) -> Completion<Value> {
        let Value::Object(id) = value else {
            return Ok(value);
        };
        let hint = match hint {
            Hint::Default => {
                let is_date = self
                    .with_object(id, |o| matches!(o.kind, ObjectKind::Date(_)))
                    .unwrap_or(false);
                if is_date {
                    Hint::String
                } else {
                    Hint::Number
                }
            }
            other => other,
        };
        let order = if hint == Hint::String {
            ["toString", "valueOf"]
        } else {
            ["valueOf", "toString"]
        };
        for name in order {
            let method = self.get_property(id, name)?;
            if self.is_callable(&method) {
                let result = self.call(method, Value::Object(id), Vec::new())?;
                if !matches!(result, Value::Object(_)) {
                    return Ok(result);
                }
            }
        }
        Err(self.throw_error(ErrorKind::Type, "Cannot convert object to primitive value"))
    }

    pub(crate) fn to_number(&self, value: &Value) -> Completion<f64> {
        Ok(match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => {
                let primitive = self.to_primitive(value.clone(), Hint::Number)?;
                return self.to_number(&primitive);
            }
        })
    }

    pub(crate) fn to_js_string(&self, value: &Value) -> Completion<Arc<str>> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Object(_) => {
                let primitive = self.to_primitive(value.clone(), Hint::String)?;
                self.to_js_string(&primitive)
            }
            other => Ok(Arc::from(self.primitive_string(other))),
        }
    }

    /// ToPropertyKey
    pub(crate) fn to_key(&self, value: &Value) -> Completion<Name> {
        self.to_js_string(value)
    }

    pub(crate) fn template(&self, id: TemplateId) -> Option<HostCallbacks> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.templates.borrow().get(index).cloned())
    }

    // ========================================================================
    // Collection
    // ========================================================================

    /// Mark/sweep from the global scope, intrinsics and pinned handles.
    /// A slot whose last proxy was swept is reported to the `remove`
    /// callback of that proxy's template, once.
    pub(crate) fn collect_garbage(&self) -> usize {
        let roots: Vec<ObjectId> = self
            .intrinsics
            .roots()
            .chain(self.pins.borrow().keys().copied())
            .collect();
        let collection = self.heap.borrow_mut().collect(roots);
        if collection.proxies.is_empty() {
            return collection.freed;
        }

        let released: Vec<(i32, TemplateId)> = {
            let mut proxies = self.proxies.borrow_mut();
            for key in &collection.proxies {
                proxies.remove(key);
            }
            let live: FxHashSet<i32> = proxies.keys().map(|&(slot, _)| slot).collect();
            let mut seen = FxHashSet::default();
            collection
                .proxies
                .iter()
                .copied()
                .filter(|&(slot, _)| !live.contains(&slot) && seen.insert(slot))
                .collect()
        };
        stats::release(&stats::HOST_PROXIES, collection.proxies.len());
        for (slot, template) in released {
            if let Some(callbacks) = self.template(template) {
                (callbacks.remove)(self.context_id, slot);
            }
        }
        collection.freed
    }

    // ========================================================================
    // Pins
    // ========================================================================

    pub(crate) fn pin(&self, id: ObjectId) {
        *self.pins.borrow_mut().entry(id).or_insert(0) += 1;
        stats::increment(&stats::OBJECT_HANDLES);
    }

    /// Drop one pin; unknown ids are ignored
    pub(crate) fn unpin(&self, id: ObjectId) -> bool {
        let mut pins = self.pins.borrow_mut();
        let Some(count) = pins.get_mut(&id) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            pins.remove(&id);
        }
        stats::decrement(&stats::OBJECT_HANDLES);
        true
    }

    pub(crate) fn pinned_count(&self) -> usize {
        self.pins.borrow().values().map(|&n| n as usize).sum()
    }
}
