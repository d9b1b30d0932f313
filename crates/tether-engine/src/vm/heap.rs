//! Object arena with mark/sweep collection
//!
//! Objects are addressed by [`ObjectId`] (slot index plus generation). A
//! collected slot bumps its generation, so ids issued before the collection
//! no longer resolve.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tether_sdk::{ObjectHandle, StackFrame, TemplateId};

use crate::parser::ast::{FunctionNode, Name};
use crate::vm::builtins::Builtin;
use crate::vm::value::{array_index, Value};

/// Address of a heap object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl From<ObjectId> for ObjectHandle {
    fn from(id: ObjectId) -> Self {
        ObjectHandle::new(id.index, id.generation)
    }
}

impl From<ObjectHandle> for ObjectId {
    fn from(handle: ObjectHandle) -> Self {
        ObjectId {
            index: handle.index(),
            generation: handle.generation(),
        }
    }
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone)]
pub struct Property {
    pub value: Value,
    pub enumerable: bool,
}

/// Ordered own-property map.
///
/// Key order follows the script language: canonical array indices ascending
/// first, then string keys in insertion order.
#[derive(Debug, Default)]
pub struct PropertyMap {
    entries: Vec<(Name, Property)>,
    index: FxHashMap<Name, usize>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Set a property, keeping the enumerable flag of an existing entry
    pub fn insert(&mut self, key: Name, value: Value) {
        self.define(key, value, true);
    }

    /// Define a non-enumerable property
    pub fn insert_hidden(&mut self, key: Name, value: Value) {
        self.define(key, value, false);
    }

    fn define(&mut self, key: Name, value: Value, enumerable: bool) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1.value = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, Property { value, enumerable }));
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let Some(position) = self.index.remove(key) else {
            return false;
        };
        self.entries.remove(position);
        for (name, _) in &self.entries[position..] {
            if let Some(i) = self.index.get_mut(name) {
                *i -= 1;
            }
        }
        true
    }

    /// Enumerable keys in property order
    pub fn keys(&self) -> Vec<Name> {
        let mut indices: Vec<(u32, Name)> = Vec::new();
        let mut named = Vec::new();
        for (key, property) in &self.entries {
            if !property.enumerable {
                continue;
            }
            match array_index(key) {
                Some(i) => indices.push((i, key.clone())),
                None => named.push(key.clone()),
            }
        }
        indices.sort_by_key(|(i, _)| *i);
        indices.into_iter().map(|(_, k)| k).chain(named).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, p)| &p.value)
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Variable binding in a scope record
#[derive(Debug, Clone)]
pub struct Binding {
    pub value: Value,
    pub mutable: bool,
}

#[derive(Debug)]
pub struct Scope {
    pub vars: FxHashMap<Name, Binding>,
    pub parent: Option<ObjectId>,
}

#[derive(Debug, Clone)]
pub struct Closure {
    pub node: Arc<FunctionNode>,
    pub scope: ObjectId,
}

#[derive(Debug)]
pub enum ObjectKind {
    Ordinary,
    Array(Vec<Value>),
    Function(Closure),
    Native(Builtin),
    /// Error instance with the frames captured at construction
    Error(Vec<StackFrame>),
    /// Milliseconds since the epoch; NaN for an invalid date
    Date(f64),
    Scope(Scope),
    /// Stand-in for a host object; `props` is the fallback property bag
    HostProxy {
        slot: i32,
        template: TemplateId,
    },
}

#[derive(Debug)]
pub struct HeapObject {
    pub kind: ObjectKind,
    pub proto: Option<ObjectId>,
    pub props: PropertyMap,
}

impl HeapObject {
    pub fn new(kind: ObjectKind, proto: Option<ObjectId>) -> Self {
        Self {
            kind,
            proto,
            props: PropertyMap::new(),
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self.kind,
            ObjectKind::Function(_) | ObjectKind::Native(_) | ObjectKind::HostProxy { .. }
        )
    }

    /// Object ids referenced from this object
    fn trace(&self, out: &mut Vec<ObjectId>) {
        out.extend(self.proto);
        for value in self.props.values() {
            out.extend(value.as_object());
        }
        match &self.kind {
            ObjectKind::Array(items) => out.extend(items.iter().filter_map(Value::as_object)),
            ObjectKind::Function(closure) => out.push(closure.scope),
            ObjectKind::Scope(scope) => {
                out.extend(scope.parent);
                out.extend(scope.vars.values().filter_map(|b| b.value.as_object()));
            }
            _ => {}
        }
    }
}

// ============================================================================
// Heap
// ============================================================================

struct Slot {
    generation: u32,
    object: Option<HeapObject>,
}

/// Result of a collection cycle
#[derive(Debug, Default)]
pub struct Collection {
    pub freed: usize,
    /// `(slot, template)` of every host proxy that was swept
    pub proxies: Vec<(i32, TemplateId)>,
}

#[derive(Default)]
pub struct Heap {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live objects
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn alloc(&mut self, object: HeapObject) -> ObjectId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            return ObjectId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            object: Some(object),
        });
        ObjectId {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<&HeapObject> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut HeapObject> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.object.as_mut())
    }

    pub fn is_live(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    /// Mark everything reachable from `roots` and free the rest.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjectId>) -> Collection {
        let mut marked: FxHashSet<u32> = FxHashSet::default();
        let mut worklist: Vec<ObjectId> = roots.into_iter().collect();
        let mut children = Vec::new();

        while let Some(id) = worklist.pop() {
            let Some(object) = self.get(id) else {
                continue;
            };
            if !marked.insert(id.index) {
                continue;
            }
            children.clear();
            object.trace(&mut children);
            worklist.extend(children.iter().copied());
        }

        let mut collection = Collection::default();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.is_none() || marked.contains(&(index as u32)) {
                continue;
            }
            if let Some(HeapObject {
                kind: ObjectKind::HostProxy { slot: host_slot, template },
                ..
            }) = slot.object.take()
            {
                collection.proxies.push((host_slot, template));
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index as u32);
            collection.freed += 1;
        }
        self.live -= collection.freed;
        collection
    }
}
