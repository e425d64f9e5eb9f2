//! Observable/Observer registry.
//!
//! An [`ObserverRegistry`] owns an ordered list of non-owning observer
//! references. Any object that wants to be observable composes one registry
//! and implements [`Observable`] by returning it; the trait supplies the
//! rest of the publish/subscribe API. Objects that react to notifications
//! implement [`Observer`]. An object may implement both.
//!
//! Dispatch is synchronous and depth-first. [`ObserverRegistry::notify`]
//! snapshots the registered observers, releases its lock, then calls
//! `update` on each in registration order, so observers may freely add or
//! remove observers (including themselves) while being notified. An
//! observer removed mid-dispatch that has not been reached yet is skipped.
//!
//! Failing observers abort the dispatch: the first `Err` returned by an
//! `update` is propagated to the caller and the remaining observers are not
//! notified. Callers needing isolation must wrap their observers.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::QuantResult;

/// Optional payload carried by a notification.
pub type Payload = serde_json::Value;

static NEXT_OBSERVABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identifier of an observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObservableId(u64);

impl ObservableId {
    fn next() -> Self {
        Self(NEXT_OBSERVABLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObservableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs:{}", self.0)
    }
}

/// Receives change notifications from observables it registered with.
pub trait Observer: Send + Sync {
    /// Called when an observable this observer is registered with changes.
    ///
    /// Returning an error aborts the notification in progress.
    fn update(&self, source: ObservableId, payload: Option<&Payload>) -> QuantResult<()>;

    /// Name used in logs and errors.
    fn observer_name(&self) -> String {
        String::from("observer")
    }
}

/// Downgrades a shared observer into the non-owning form the registry stores.
pub fn downgrade_observer<O: Observer + 'static>(observer: &Arc<O>) -> Weak<dyn Observer> {
    let weak: Weak<O> = Arc::downgrade(observer);
    weak
}

/// Identity of an observer: the address of its shared allocation.
fn observer_key(observer: &Weak<dyn Observer>) -> usize {
    observer.as_ptr() as *const () as usize
}

struct Entry {
    key: usize,
    observer: Weak<dyn Observer>,
}

impl Entry {
    fn is_alive(&self) -> bool {
        self.observer.strong_count() > 0
    }
}

/// Ordered set of observers attached to one observable.
///
/// An observer appears at most once. Entries whose observer has been
/// dropped are pruned lazily and never dispatched to.
pub struct ObserverRegistry {
    id: ObservableId,
    label: String,
    observers: Mutex<Vec<Entry>>,
}

impl ObserverRegistry {
    /// Creates an empty registry with a diagnostic label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: ObservableId::next(),
            label: label.into(),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Returns the identifier passed to observers as the notification source.
    pub fn id(&self) -> ObservableId {
        self.id
    }

    /// Returns the diagnostic label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Registers an observer. Returns false if it was already registered.
    pub fn add(&self, observer: Weak<dyn Observer>) -> bool {
        let key = observer_key(&observer);
        let mut observers = self.observers.lock();
        // A dead entry may share an address with a new allocation.
        observers.retain(Entry::is_alive);
        if observers.iter().any(|e| e.key == key) {
            return false;
        }
        observers.push(Entry { key, observer });
        true
    }

    /// Deregisters an observer. Returns false if it was not registered.
    pub fn remove(&self, observer: &Weak<dyn Observer>) -> bool {
        let key = observer_key(observer);
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|e| e.key != key);
        observers.len() != before
    }

    /// Returns true if the observer is currently registered.
    pub fn contains(&self, observer: &Weak<dyn Observer>) -> bool {
        self.contains_key(observer_key(observer))
    }

    fn contains_key(&self, key: usize) -> bool {
        self.observers
            .lock()
            .iter()
            .any(|e| e.key == key && e.is_alive())
    }

    /// Number of live observers.
    pub fn len(&self) -> usize {
        let mut observers = self.observers.lock();
        observers.retain(Entry::is_alive);
        observers.len()
    }

    /// Returns true if no live observer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live observers in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.observers
            .lock()
            .iter()
            .filter_map(|e| e.observer.upgrade())
            .collect()
    }

    /// Removes every observer.
    pub fn clear(&self) {
        self.observers.lock().clear();
    }

    /// Notifies every registered observer in registration order.
    ///
    /// Stops at the first failing observer and returns its error.
    pub fn notify(&self, payload: Option<&Payload>) -> QuantResult<()> {
        let pending: Vec<(usize, Weak<dyn Observer>)> = {
            let mut observers = self.observers.lock();
            observers.retain(Entry::is_alive);
            observers
                .iter()
                .map(|e| (e.key, e.observer.clone()))
                .collect()
        };

        tracing::trace!(
            observable = %self.label,
            id = %self.id,
            observers = pending.len(),
            "Notifying observers"
        );

        for (key, weak) in pending {
            // Deregistered by an earlier observer in this same dispatch.
            if !self.contains_key(key) {
                continue;
            }
            let Some(observer) = weak.upgrade() else {
                continue;
            };
            if let Err(e) = observer.update(self.id, payload) {
                tracing::warn!(
                    observable = %self.label,
                    observer = %observer.observer_name(),
                    error = %e,
                    "Notification aborted by failing observer"
                );
                return Err(e);
            }
        }

        Ok(())
    }
}

impl fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("observers", &self.observers.lock().len())
            .finish()
    }
}

/// Capability of being observed.
///
/// Implementors only provide [`Observable::observers`]; the publish/subscribe
/// operations are derived from it.
pub trait Observable: Send + Sync {
    /// The registry holding this object's observers.
    fn observers(&self) -> &ObserverRegistry;

    /// Identifier passed to observers as the notification source.
    fn observable_id(&self) -> ObservableId {
        self.observers().id()
    }

    /// Registers an observer. Registering twice is a no-op.
    fn add_observer(&self, observer: Weak<dyn Observer>) {
        self.observers().add(observer);
    }

    /// Deregisters an observer. Deregistering a stranger is a no-op.
    fn delete_observer(&self, observer: &Weak<dyn Observer>) {
        self.observers().remove(observer);
    }

    /// Notifies all observers, fail-fast.
    fn notify_observers(&self, payload: Option<&Payload>) -> QuantResult<()> {
        self.observers().notify(payload)
    }

    /// Number of live observers.
    fn count_observers(&self) -> usize {
        self.observers().len()
    }

    /// Live observers in registration order.
    fn get_observers(&self) -> Vec<Arc<dyn Observer>> {
        self.observers().snapshot()
    }

    /// Removes every observer.
    fn delete_observers(&self) {
        self.observers().clear();
    }
}

impl Observable for ObserverRegistry {
    fn observers(&self) -> &ObserverRegistry {
        self
    }
}
