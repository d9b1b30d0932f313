//! Execution deadlines
//!
//! A [`Watchdog`] runs on its own thread for the duration of one timed
//! execution. If the deadline passes first it marks the session as timed
//! out and requests termination; disarming it wakes the thread and joins it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tether_engine::TerminateHandle;
use tracing::debug;

use crate::error::{Error, Result};

pub(crate) struct Watchdog {
    disarm: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    fired: Arc<AtomicBool>,
}

impl Watchdog {
    pub(crate) fn arm(
        timeout: Duration,
        terminate: TerminateHandle,
        timed_out: Arc<AtomicBool>,
    ) -> Result<Self> {
        let (disarm, wait) = channel::bounded::<()>(1);
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let thread = thread::Builder::new()
            .name("tether-watchdog".to_string())
            .spawn(move || {
                if let Err(RecvTimeoutError::Timeout) = wait.recv_timeout(timeout) {
                    flag.store(true, Ordering::SeqCst);
                    timed_out.store(true, Ordering::SeqCst);
                    terminate.terminate();
                    debug!(?timeout, "execution deadline passed");
                }
            })
            .map_err(|err| Error::Internal(format!("failed to start watchdog: {}", err)))?;
        Ok(Self {
            disarm: Some(disarm),
            thread: Some(thread),
            fired,
        })
    }

    /// Stop the watchdog; returns whether the deadline had passed
    pub(crate) fn disarm(mut self) -> bool {
        self.stop();
        self.fired.load(Ordering::SeqCst)
    }

    fn stop(&mut self) {
        // Dropping the sender wakes the thread with a disconnect
        self.disarm.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
