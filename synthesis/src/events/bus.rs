//! Event bus for one debate session
//!
//! Synchronous pub/sub: listeners are invoked in registration order on the
//! publisher's thread, each isolated so one faulty observer cannot block the
//! rest or the publisher. The registry is per-session, owned by the session
//! controller and torn down with it.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use super::types::Envelope;

/// Handle identifying one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Boxed listener callback
pub type Listener = Arc<dyn Fn(&Envelope) + Send + Sync>;

/// Shared reference to EventBus
pub type SharedEventBus = Arc<EventBus>;

/// Per-session pub/sub hub with per-listener fault isolation
pub struct EventBus {
    /// Registered listeners in registration order
    listeners: Mutex<Vec<(ListenerId, Listener)>>,

    /// Source of listener ids
    next_id: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with no listeners
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a shared reference to this event bus
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    fn registry(&self) -> MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                // Nothing user-supplied runs under the lock, so the registry
                // itself is intact.
                warn!("listener registry lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Register a listener; dispatch order follows registration order
    pub fn subscribe(&self, listener: impl Fn(&Envelope) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.registry().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener; unknown ids are a no-op
    pub fn unsubscribe(&self, id: ListenerId) {
        self.registry().retain(|(lid, _)| *lid != id);
    }

    /// Remove all listeners; used on session teardown
    pub fn clear(&self) {
        self.registry().clear();
    }

    /// Number of currently registered listeners
    pub fn listener_count(&self) -> usize {
        self.registry().len()
    }

    /// Deliver an envelope to every registered listener, in order.
    ///
    /// Dispatch iterates a snapshot taken before the first invocation, so a
    /// listener that unsubscribes itself (or others) mid-dispatch cannot
    /// corrupt the iteration; it still receives the in-flight envelope. A
    /// panicking listener is caught, logged, and skipped.
    pub fn publish(&self, envelope: &Envelope) {
        let snapshot: Vec<(ListenerId, Listener)> = self.registry().clone();
        let count = snapshot.len();

        for (id, listener) in snapshot {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| listener(envelope)));
            if outcome.is_err() {
                warn!(
                    listener = id.0,
                    kind = envelope.kind(),
                    "listener panicked during dispatch, skipping"
                );
            }
        }

        debug!(
            kind = envelope.kind(),
            request_id = envelope.request_id(),
            listeners = count,
            "Envelope published"
        );
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
