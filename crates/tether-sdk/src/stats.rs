//! Allocation counters

use std::fmt;

/// Snapshot of live native resources.
///
/// Read-only diagnostics; tests use it to assert that every engine, context,
/// script, host proxy and pinned handle has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocationStats {
    /// Live engines
    pub engines: usize,
    /// Live contexts
    pub contexts: usize,
    /// Live compiled scripts
    pub scripts: usize,
    /// Live engine-side proxies of host objects
    pub host_proxies: usize,
    /// Engine objects currently pinned for the host
    pub object_handles: usize,
}

impl AllocationStats {
    /// True when nothing is allocated
    pub fn is_empty(&self) -> bool {
        *self == AllocationStats::default()
    }
}

impl fmt::Display for AllocationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "engines={} contexts={} scripts={} host_proxies={} object_handles={}",
            self.engines, self.contexts, self.scripts, self.host_proxies, self.object_handles
        )
    }
}
