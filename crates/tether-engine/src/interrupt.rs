//! Cross-thread termination requests
//!
//! Every context owns its own request flag. A context handle stops that
//! context only; an engine handle stops whichever of the engine's contexts
//! are running when it is used. A request is withdrawn when the context's
//! outermost execution returns, so a request never leaks from one context
//! into another.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Termination state of one context
#[derive(Debug, Default)]
pub(crate) struct Interrupt {
    requested: AtomicBool,
    running: AtomicBool,
}

impl Interrupt {
    pub(crate) fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub(crate) fn cancel(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }

    fn request_if_running(&self) -> bool {
        if self.running.load(Ordering::SeqCst) {
            self.request();
            true
        } else {
            false
        }
    }
}

/// The interrupts of every live context of one engine
#[derive(Debug, Default)]
pub(crate) struct InterruptSet {
    contexts: Mutex<Vec<Weak<Interrupt>>>,
}

impl InterruptSet {
    /// Interrupt for a new context
    pub(crate) fn register(&self) -> Arc<Interrupt> {
        let interrupt = Arc::new(Interrupt::default());
        let mut contexts = self.contexts.lock();
        contexts.retain(|weak| weak.strong_count() > 0);
        contexts.push(Arc::downgrade(&interrupt));
        interrupt
    }

    fn live(&self) -> Vec<Arc<Interrupt>> {
        self.contexts.lock().iter().filter_map(Weak::upgrade).collect()
    }
}

#[derive(Debug, Clone)]
enum Target {
    Context(Arc<Interrupt>),
    Engine(Arc<InterruptSet>),
}

/// Handle used to request that running script code terminates.
///
/// Cloneable and `Send + Sync`; a watchdog thread may hold one while the
/// engine executes on another thread. Requests are idempotent: asking twice
/// before the request is consumed has the same effect as asking once.
#[derive(Debug, Clone)]
pub struct TerminateHandle {
    target: Target,
}

impl TerminateHandle {
    pub(crate) fn context(interrupt: Arc<Interrupt>) -> Self {
        Self {
            target: Target::Context(interrupt),
        }
    }

    pub(crate) fn engine(set: Arc<InterruptSet>) -> Self {
        Self {
            target: Target::Engine(set),
        }
    }

    /// Request termination at the next checked interruption point.
    ///
    /// On a context handle the request stands until that context's
    /// outermost execution returns; a request made while the context is
    /// idle stops its next execution. On an engine handle only contexts
    /// that are running are asked to stop.
    pub fn terminate(&self) {
        match &self.target {
            Target::Context(interrupt) => interrupt.request(),
            Target::Engine(set) => {
                for interrupt in set.live() {
                    interrupt.request_if_running();
                }
            }
        }
    }

    /// Request termination only if script code is running. Returns whether
    /// any request was made.
    pub fn terminate_if_running(&self) -> bool {
        match &self.target {
            Target::Context(interrupt) => interrupt.request_if_running(),
            Target::Engine(set) => set
                .live()
                .iter()
                .fold(false, |any, interrupt| interrupt.request_if_running() || any),
        }
    }

    /// Withdraw a request that has not been consumed yet.
    pub fn cancel(&self) {
        match &self.target {
            Target::Context(interrupt) => interrupt.cancel(),
            Target::Engine(set) => set.live().iter().for_each(|interrupt| interrupt.cancel()),
        }
    }

    /// Whether a request is pending
    pub fn is_requested(&self) -> bool {
        match &self.target {
            Target::Context(interrupt) => interrupt.is_requested(),
            Target::Engine(set) => set.live().iter().any(|interrupt| interrupt.is_requested()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminate_is_idempotent_and_shared() {
        let handle = TerminateHandle::context(Arc::new(Interrupt::default()));
        let other = handle.clone();
        other.terminate();
        other.terminate();
        assert!(handle.is_requested());
        handle.cancel();
        assert!(!other.is_requested());
    }

    #[test]
    fn test_engine_handle_reaches_running_contexts_only() {
        let set = Arc::new(InterruptSet::default());
        let running = set.register();
        let idle = set.register();
        running.set_running(true);

        let engine = TerminateHandle::engine(set.clone());
        engine.terminate();
        assert!(running.is_requested());
        assert!(!idle.is_requested());
        assert!(engine.is_requested());

        engine.cancel();
        assert!(!running.is_requested());
        assert!(engine.terminate_if_running());
        assert!(running.is_requested());

        running.set_running(false);
        engine.cancel();
        assert!(!engine.terminate_if_running());
        assert!(!engine.is_requested());
    }

    #[test]
    fn test_context_requests_stay_with_their_context() {
        let set = Arc::new(InterruptSet::default());
        let first = set.register();
        let second = set.register();

        TerminateHandle::context(first.clone()).terminate();
        second.cancel();
        assert!(first.is_requested());
        assert!(!second.is_requested());
        assert!(!TerminateHandle::context(second).terminate_if_running());
    }

    #[test]
    fn test_dropped_contexts_leave_the_set() {
        let set = InterruptSet::default();
        let kept = set.register();
        drop(set.register());
        let _third = set.register();
        assert_eq!(set.live().len(), 2);
        drop(kept);
        assert_eq!(set.live().len(), 1);
    }
}
