//! Session notifications
//!
//! Observers are kept in registration order and called synchronously on the
//! thread that raised the notification. Dispatch works on a snapshot of the
//! registry, so observers may subscribe or unsubscribe (themselves included)
//! from inside a callback; a change takes effect from the next notification.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered registry of callbacks for one notification kind
pub struct Observers<T: ?Sized> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T: ?Sized> Observers<T> {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Register `callback`; it runs after every observer registered before it
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns `false` if `id` was not registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Number of registered observers
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no observer is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every registered observer in registration order
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Callback<T>> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in snapshot {
            callback(value);
        }
    }
}

impl<T: ?Sized> Default for Observers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.len())
            .finish()
    }
}

/// The notification channels of a device session.
///
/// `async_data` and `abrupt_disconnect` may fire on the background reader
/// thread, concurrently with foreground calls.
#[derive(Debug, Default)]
pub struct SessionEvents {
    /// Unsolicited data drained by the background reader
    pub async_data: Observers<[u8]>,
    /// The transport reported that the device is gone
    pub abrupt_disconnect: Observers<()>,
    /// Bytes handed to the transport by `send`
    pub data_sent: Observers<[u8]>,
    /// Bytes returned by a foreground `receive`
    pub data_received: Observers<[u8]>,
}
