//! Process-wide allocation counters.
//!
//! Incremented and decremented by the engine as native resources are
//! created and released; read through [`allocation_stats`].

use std::sync::atomic::{AtomicUsize, Ordering};

use tether_sdk::AllocationStats;

pub(crate) static ENGINES: AtomicUsize = AtomicUsize::new(0);
pub(crate) static CONTEXTS: AtomicUsize = AtomicUsize::new(0);
pub(crate) static SCRIPTS: AtomicUsize = AtomicUsize::new(0);
pub(crate) static HOST_PROXIES: AtomicUsize = AtomicUsize::new(0);
pub(crate) static OBJECT_HANDLES: AtomicUsize = AtomicUsize::new(0);

#[inline]
pub(crate) fn increment(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn decrement(counter: &AtomicUsize) {
    release(counter, 1);
}

pub(crate) fn release(counter: &AtomicUsize, count: usize) {
    if count > 0 {
        counter.fetch_sub(count, Ordering::Relaxed);
    }
}

/// Snapshot of the live native resources in this process
pub fn allocation_stats() -> AllocationStats {
    AllocationStats {
        engines: ENGINES.load(Ordering::Relaxed),
        contexts: CONTEXTS.load(Ordering::Relaxed),
        scripts: SCRIPTS.load(Ordering::Relaxed),
        host_proxies: HOST_PROXIES.load(Ordering::Relaxed),
        object_handles: OBJECT_HANDLES.load(Ordering::Relaxed),
    }
}
