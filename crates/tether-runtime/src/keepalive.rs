//! Keep-alive store
//!
//! Pins host objects referenced from the script heap and gives each a
//! stable integer slot. The engine only ever names host objects by slot, so
//! everything a proxy needs must stay reachable from here until the engine
//! reports the proxy collected.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::value::HostObject;

#[derive(Debug, Default)]
pub struct KeepAliveStore {
    objects: FxHashMap<i32, HostObject>,
    /// Allocation address to slot
    slots: FxHashMap<usize, i32>,
    next_slot: i32,
    max_slots: usize,
}

impl KeepAliveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `object`. An object that is already pinned keeps its slot.
    pub fn insert(&mut self, object: HostObject) -> i32 {
        let addr = object.addr();
        if let Some(&slot) = self.slots.get(&addr) {
            return slot;
        }
        let slot = self.next_slot;
        self.next_slot = self.next_slot.wrapping_add(1);
        self.objects.insert(slot, object);
        self.slots.insert(addr, slot);
        self.max_slots = self.max_slots.max(self.objects.len());
        slot
    }

    pub fn get(&self, slot: i32) -> Result<HostObject> {
        self.objects
            .get(&slot)
            .cloned()
            .ok_or_else(|| Error::Resolution(format!("keep-alive slot {} not found", slot)))
    }

    /// Unpin the object in `slot`. Unknown slots are ignored.
    pub fn remove(&mut self, slot: i32) -> Option<HostObject> {
        let object = self.objects.remove(&slot)?;
        self.slots.remove(&object.addr());
        Some(object)
    }

    /// Unpin everything, handing the objects back so the caller can drop
    /// them outside any lock.
    pub fn clear(&mut self) -> Vec<HostObject> {
        self.slots.clear();
        self.objects.drain().map(|(_, object)| object).collect()
    }

    pub fn contains(&self, slot: i32) -> bool {
        self.objects.contains_key(&slot)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Most objects pinned at once
    pub fn max_slots(&self) -> usize {
        self.max_slots
    }
}
