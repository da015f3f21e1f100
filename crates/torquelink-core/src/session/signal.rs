//! Manual-reset signal

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::transport::DataReady;

/// A boolean flag that threads can wait on.
///
/// Stays set until explicitly reset; every waiter is released while it is set.
#[derive(Debug, Default)]
pub struct Signal {
    state: Mutex<bool>,
    changed: Condvar,
}

impl Signal {
    /// A signal in the given initial state
    pub fn new(initially_set: bool) -> Self {
        Self {
            state: Mutex::new(initially_set),
            changed: Condvar::new(),
        }
    }

    /// Set the signal and release all waiters
    pub fn set(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = true;
        self.changed.notify_all();
    }

    /// Clear the signal; later waits block again
    pub fn reset(&self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Current state without waiting
    pub fn is_set(&self) -> bool {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until set or until `timeout` elapses. Returns the final state.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while !*state {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

impl DataReady for Signal {
    fn wait(&self, timeout: Duration) -> bool {
        self.wait_timeout(timeout)
    }
}
