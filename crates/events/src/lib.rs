//! Listener-registry event emitter
//!
//! A small observer utility: events are grouped by a `Kind` key, listeners
//! register per kind and receive every emitted event of that kind by
//! reference. Supports bulk removal of a kind's listeners, which teardown
//! paths use to guarantee no further delivery.
//!
//! # Example
//!
//! ```
//! use peercall_events::{Emitter, Event};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! enum Ping {
//!     Hello,
//! }
//!
//! impl Event for Ping {
//!     type Kind = u8;
//!     fn kind(&self) -> u8 {
//!         0
//!     }
//! }
//!
//! let emitter: Emitter<Ping> = Emitter::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let seen2 = Arc::clone(&seen);
//! emitter.on(0, move |_ev| {
//!     seen2.fetch_add(1, Ordering::SeqCst);
//! });
//! emitter.emit(&Ping::Hello);
//! assert_eq!(seen.load(Ordering::SeqCst), 1);
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// An emittable event, keyed by a per-variant kind
pub trait Event: Send + Sync {
    /// Discriminant used to route the event to its listeners
    type Kind: Copy + Eq + Hash + Send;

    /// The kind of this particular event value
    fn kind(&self) -> Self::Kind;
}

/// Handle returned by [`Emitter::on`], used to unregister a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Event emitter with per-kind listener lists
///
/// Listeners of one kind are invoked in registration order. The registry lock
/// is released before callbacks run, so a listener may register or remove
/// listeners (including itself) without deadlocking.
pub struct Emitter<E: Event> {
    listeners: Mutex<HashMap<E::Kind, Vec<(ListenerId, Callback<E>)>>>,
    next_id: AtomicU64,
}

impl<E: Event> Emitter<E> {
    /// Create an emitter with no listeners
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener for the given kind
    pub fn on(&self, kind: E::Kind, callback: impl Fn(&E) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove one listener; returns whether it was registered for that kind
    pub fn off(&self, kind: E::Kind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        if let Some(entries) = listeners.get_mut(&kind) {
            let before = entries.len();
            entries.retain(|(entry_id, _)| *entry_id != id);
            return entries.len() != before;
        }
        false
    }

    /// Remove every listener registered for the given kind
    pub fn remove_all(&self, kind: E::Kind) {
        self.listeners.lock().remove(&kind);
    }

    /// Deliver an event to all listeners of its kind; returns how many ran
    pub fn emit(&self, event: &E) -> usize {
        let callbacks: Vec<Callback<E>> = {
            let listeners = self.listeners.lock();
            match listeners.get(&event.kind()) {
                Some(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return 0,
            }
        };
        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    /// Number of listeners currently registered for a kind
    pub fn listener_count(&self, kind: E::Kind) -> usize {
        self.listeners
            .lock()
            .get(&kind)
            .map_or(0, |entries| entries.len())
    }
}

impl<E: Event> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}
