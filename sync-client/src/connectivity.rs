//! Connectivity monitoring.
//!
//! Reachability sensing belongs to the platform. The engine only needs a way
//! to be told "connected: yes/no", immediately and on every change.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Listener invoked with the current reachability.
pub type ConnectivityListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Source of reachability readings.
pub trait ConnectivityMonitor: Send + Sync {
    /// Register a listener.
    ///
    /// The listener is invoked with the current reading right away (if the
    /// platform has resolved one) and again on every change, until the
    /// returned handle is cancelled or dropped.
    fn observe(&self, listener: ConnectivityListener) -> ObserverHandle;
}

/// Registration of a connectivity listener. Dropping it unregisters.
pub struct ObserverHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl ObserverHandle {
    /// Wrap the closure that unregisters the listener.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unregister now. Safe to call more than once.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// True until cancelled.
    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Connectivity monitor driven by explicit readings.
///
/// A platform binding calls [`ManualConnectivity::set_connected`] from its
/// reachability callback; tests call it directly. Starts unresolved.
/// Listeners are only notified when the reading actually changes.
#[derive(Default, Clone)]
pub struct ManualConnectivity {
    inner: Arc<Mutex<ManualConnectivityInner>>,
}

#[derive(Default)]
struct ManualConnectivityInner {
    current: Option<bool>,
    listeners: BTreeMap<u64, ConnectivityListener>,
    next_id: u64,
}

fn lock(inner: &Mutex<ManualConnectivityInner>) -> MutexGuard<'_, ManualConnectivityInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ManualConnectivity {
    /// Create a monitor with no reading yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a monitor that already has a reading.
    pub fn with_reading(is_connected: bool) -> Self {
        let monitor = Self::new();
        lock(&monitor.inner).current = Some(is_connected);
        monitor
    }

    /// Report a new reading.
    pub fn set_connected(&self, is_connected: bool) {
        let listeners: Vec<ConnectivityListener> = {
            let mut inner = lock(&self.inner);
            if inner.current == Some(is_connected) {
                return;
            }
            inner.current = Some(is_connected);
            inner.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener(is_connected);
        }
    }

    /// Last reading, `None` if unresolved.
    pub fn current(&self) -> Option<bool> {
        lock(&self.inner).current
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }
}

impl fmt::Debug for ManualConnectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("ManualConnectivity")
            .field("current", &inner.current)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn observe(&self, listener: ConnectivityListener) -> ObserverHandle {
        let (id, current) = {
            let mut inner = lock(&self.inner);
            inner.next_id += 1;
            let id = inner.next_id;
            inner.listeners.insert(id, Arc::clone(&listener));
            (id, inner.current)
        };

        if let Some(is_connected) = current {
            listener(is_connected);
        }

        let shared = Arc::clone(&self.inner);
        ObserverHandle::new(move || {
            lock(&shared).listeners.remove(&id);
        })
    }
}
