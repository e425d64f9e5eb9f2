//! Memoized, invalidation-driven calculations.
//!
//! A [`LazyObject`] wraps a [`Calculation`]. It starts dirty, caches the
//! output of its first successful calculation, and serves that cached value
//! until one of the observables it is registered with notifies it. The next
//! read after an invalidation recalculates exactly once.
//!
//! ```text
//!            update()                      calculate() ok
//!   Fresh ───────────────> Dirty ──────────────────────────> Fresh
//!     ^                      │ calculate() err: stays Dirty
//!     └──── cached read ─────┘ frozen: serves last cached value
//! ```
//!
//! Every invalidation bumps a [`Revision`]. A calculation clears the dirty
//! flag only if the revision it started from is still current, so an update
//! that lands while the calculation is running is never lost.
//!
//! Two signals travel the graph. An upstream invalidation ("an input
//! changed") marks observers dirty. With
//! [`LazyOptions::notify_on_recalculate`] a lazy object also announces its
//! own new value after recalculating; see [`is_recalculation_notice`]. That
//! announcement is ignored by an observer whose running calculation is the
//! one reading the new value.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{QuantResult, QuantwireError};
use crate::observable::{Observable, ObservableId, Observer, ObserverRegistry, Payload};

// =============================================================================
// OPTIONS
// =============================================================================

/// When an invalidated lazy object re-raises the notification to its own
/// observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardPolicy {
    /// Forward every notification received.
    #[default]
    Always,
    /// Forward only on the Fresh to Dirty transition.
    ///
    /// Notifications reaching an object that is already dirty stop there.
    /// An observer that recalculated without reading this object since its
    /// last forward misses them, so use this only where every observer
    /// reads this object whenever it recalculates.
    FirstInvalidation,
    /// Never forward.
    Never,
}

/// Behavioural options of a lazy object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LazyOptions {
    /// Forwarding of upstream invalidations.
    pub forward_policy: ForwardPolicy,
    /// Notify own observers after each successful recalculation.
    pub notify_on_recalculate: bool,
}

impl LazyOptions {
    /// Options that forward every notification.
    pub fn always_forward() -> Self {
        Self {
            forward_policy: ForwardPolicy::Always,
            ..Self::default()
        }
    }

    /// Sets the forwarding policy.
    pub fn with_forward_policy(mut self, policy: ForwardPolicy) -> Self {
        self.forward_policy = policy;
        self
    }

    /// Enables or disables notification after recalculation.
    pub fn with_notify_on_recalculate(mut self, enabled: bool) -> Self {
        self.notify_on_recalculate = enabled;
        self
    }
}

/// Payload key of the notice sent after a recalculation.
const RECALCULATED: &str = "recalculated";

fn recalculation_notice(name: &str) -> Payload {
    let mut notice = serde_json::Map::new();
    notice.insert(RECALCULATED.to_string(), Payload::String(name.to_string()));
    Payload::Object(notice)
}

/// Returns true for the payload a lazy object sends after recalculating
/// with [`LazyOptions::notify_on_recalculate`] enabled.
pub fn is_recalculation_notice(payload: Option<&Payload>) -> bool {
    payload.is_some_and(|p| p.get(RECALCULATED).is_some())
}

// =============================================================================
// REVISION TRACKING
// =============================================================================

/// Invalidation counter of a lazy object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Revision(pub u64);

impl Revision {
    /// Returns the next revision.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rev:{}", self.0)
    }
}

/// Counters describing a lazy object's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LazyStats {
    /// Successful recalculations.
    pub recalculations: u64,
    /// Failed recalculations.
    pub failures: u64,
    /// Invalidations received.
    pub invalidations: u64,
    /// Current revision.
    pub revision: Revision,
}

// =============================================================================
// CALCULATION TRAIT
// =============================================================================

/// The expensive step a [`LazyObject`] memoizes.
pub trait Calculation: Send + Sync + 'static {
    /// Value produced by a successful calculation.
    type Output: Clone + Send + Sync + 'static;

    /// Name used in logs and errors.
    fn name(&self) -> String;

    /// Observables the lazy object registers with on construction.
    fn dependencies(&self) -> Vec<&dyn Observable> {
        Vec::new()
    }

    /// Runs the calculation.
    fn perform_calculations(&self) -> QuantResult<Self::Output>;
}

// =============================================================================
// LAZY OBJECT
// =============================================================================

struct LazyState<V> {
    cached: Option<V>,
    dirty: bool,
    frozen: bool,
    /// A forward was swallowed while frozen.
    suppressed: bool,
    stats: LazyStats,
}

/// Resets the in-calculation flag even if the calculation panics.
struct CalculatingGuard<'a>(&'a AtomicBool);

impl Drop for CalculatingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A cached calculation invalidated by notifications.
pub struct LazyObject<C: Calculation> {
    calculation: C,
    name: String,
    options: LazyOptions,
    registry: ObserverRegistry,
    state: Mutex<LazyState<C::Output>>,
    calculating: AtomicBool,
    forwarding: AtomicBool,
    me: Weak<LazyObject<C>>,
}

impl<C: Calculation> LazyObject<C> {
    /// Wraps `calculation` with default options.
    pub fn new(calculation: C) -> Arc<Self> {
        Self::with_options(calculation, LazyOptions::default())
    }

    /// Wraps `calculation` and registers with its dependencies.
    pub fn with_options(calculation: C, options: LazyOptions) -> Arc<Self> {
        let name = calculation.name();
        let lazy = Arc::new_cyclic(|me| Self {
            calculation,
            registry: ObserverRegistry::new(name.clone()),
            name,
            options,
            state: Mutex::new(LazyState {
                cached: None,
                dirty: true,
                frozen: false,
                suppressed: false,
                stats: LazyStats::default(),
            }),
            calculating: AtomicBool::new(false),
            forwarding: AtomicBool::new(false),
            me: me.clone(),
        });

        let me = lazy.as_observer();
        for dependency in lazy.calculation.dependencies() {
            dependency.add_observer(me.clone());
        }
        lazy
    }

    /// Name of the wrapped calculation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped calculation.
    pub fn calculation(&self) -> &C {
        &self.calculation
    }

    /// Options given at construction.
    pub fn options(&self) -> LazyOptions {
        self.options
    }

    /// This object in the form observables store.
    pub fn as_observer(&self) -> Weak<dyn Observer> {
        self.me.clone()
    }

    /// Registers with an additional observable.
    pub fn register_with<O: Observable + ?Sized>(&self, observable: &O) {
        observable.add_observer(self.as_observer());
    }

    /// Deregisters from an observable.
    pub fn unregister_with<O: Observable + ?Sized>(&self, observable: &O) {
        observable.delete_observer(&self.as_observer());
    }

    /// Returns the cached output, recalculating first if dirty.
    ///
    /// Fresh objects return the cached value without recalculating. Frozen
    /// objects return the last cached value even if dirty.
    ///
    /// # Errors
    ///
    /// Propagates calculation failures (the object stays dirty), returns
    /// `CycleDetected` if called from within its own calculation, and fails
    /// if frozen before the first successful calculation.
    ///
    /// With `notify_on_recalculate`, an observer rejecting the notice is
    /// returned as well. The new value is cached by then and the object is
    /// fresh, so the next call returns it without recalculating.
    pub fn calculate(&self) -> QuantResult<C::Output> {
        let start = {
            let state = self.state.lock();
            if let (false, Some(value)) = (state.dirty, &state.cached) {
                return Ok(value.clone());
            }
            if state.frozen {
                return state.cached.clone().ok_or_else(|| {
                    QuantwireError::calculation(&self.name, "frozen before first calculation")
                });
            }
            state.stats.revision
        };

        let value = self.run(start)?;
        if self.options.notify_on_recalculate {
            self.registry.notify(Some(&recalculation_notice(&self.name)))?;
        }
        Ok(value)
    }

    /// Recalculates unconditionally, ignoring the dirty and frozen flags,
    /// then notifies observers.
    ///
    /// The frozen flag is restored afterwards. Observers are notified whether
    /// or not the calculation succeeded.
    pub fn recalculate(&self) -> QuantResult<C::Output> {
        let (was_frozen, start) = {
            let mut state = self.state.lock();
            let was_frozen = state.frozen;
            state.frozen = false;
            state.dirty = true;
            (was_frozen, state.stats.revision)
        };

        let result = self.run(start);
        self.state.lock().frozen = was_frozen;

        let notified = self.registry.notify(None);
        let value = result?;
        notified?;
        Ok(value)
    }

    fn run(&self, start: Revision) -> QuantResult<C::Output> {
        if self.calculating.swap(true, Ordering::SeqCst) {
            tracing::warn!(object = %self.name, "Re-entrant calculation detected");
            return Err(QuantwireError::cycle_detected(&self.name));
        }

        let started = Instant::now();
        let outcome = {
            let _guard = CalculatingGuard(&self.calculating);
            self.calculation.perform_calculations()
        };
        let elapsed_us = started.elapsed().as_micros() as u64;

        let mut state = self.state.lock();
        match outcome {
            Ok(value) => {
                state.cached = Some(value.clone());
                state.dirty = state.stats.revision != start;
                state.stats.recalculations += 1;
                let (revision, dirty) = (state.stats.revision, state.dirty);
                drop(state);

                tracing::debug!(
                    object = %self.name,
                    revision = revision.0,
                    elapsed_us,
                    invalidated_meanwhile = dirty,
                    "Recalculated"
                );
                Ok(value)
            }
            Err(e) => {
                state.dirty = true;
                state.stats.failures += 1;
                drop(state);

                tracing::warn!(object = %self.name, error = %e, "Recalculation failed");
                Err(e)
            }
        }
    }

    /// Marks the object dirty as if an upstream observable had notified it.
    pub fn invalidate(&self) -> QuantResult<()> {
        self.invalidate_with(None)
    }

    /// Marks the object dirty without notifying anyone.
    pub fn mark_dirty(&self) {
        let mut state = self.state.lock();
        state.stats.revision = state.stats.revision.next();
        state.dirty = true;
    }

    fn invalidate_with(&self, payload: Option<&Payload>) -> QuantResult<()> {
        let forward = {
            let mut state = self.state.lock();
            state.stats.revision = state.stats.revision.next();
            state.stats.invalidations += 1;
            let was_fresh = !state.dirty;
            state.dirty = true;

            let wanted = match self.options.forward_policy {
                ForwardPolicy::FirstInvalidation => was_fresh,
                ForwardPolicy::Always => true,
                ForwardPolicy::Never => false,
            };
            if wanted && state.frozen {
                state.suppressed = true;
                false
            } else {
                wanted
            }
        };

        if !forward {
            return Ok(());
        }
        // A notification cycle led back here; the first pass is still running.
        if self.forwarding.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let result = self.registry.notify(payload);
        self.forwarding.store(false, Ordering::SeqCst);
        result
    }

    /// Suppresses recalculation until [`LazyObject::unfreeze`].
    pub fn freeze(&self) {
        self.state.lock().frozen = true;
    }

    /// Lifts a freeze. Does not recalculate; re-raises one notification if
    /// one was suppressed while frozen.
    pub fn unfreeze(&self) -> QuantResult<()> {
        let pending = {
            let mut state = self.state.lock();
            if !state.frozen {
                return Ok(());
            }
            state.frozen = false;
            std::mem::take(&mut state.suppressed)
        };
        if pending {
            self.registry.notify(None)?;
        }
        Ok(())
    }

    /// Returns true if the cached value is stale or missing.
    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Returns true if recalculation is suppressed.
    pub fn is_frozen(&self) -> bool {
        self.state.lock().frozen
    }

    /// Last successfully calculated value, stale or not.
    pub fn cached(&self) -> Option<C::Output> {
        self.state.lock().cached.clone()
    }

    /// Counters for this object.
    pub fn stats(&self) -> LazyStats {
        self.state.lock().stats
    }
}

impl<C: Calculation> Observer for LazyObject<C> {
    fn update(&self, source: ObservableId, payload: Option<&Payload>) -> QuantResult<()> {
        // An input read by the running calculation announcing its new value.
        if is_recalculation_notice(payload) && self.calculating.load(Ordering::SeqCst) {
            tracing::trace!(object = %self.name, %source, "Input recalculated during calculation");
            return Ok(());
        }
        self.invalidate_with(payload)
    }

    fn observer_name(&self) -> String {
        self.name.clone()
    }
}

impl<C: Calculation> Observable for LazyObject<C> {
    fn observers(&self) -> &ObserverRegistry {
        &self.registry
    }
}

impl<C: Calculation> Drop for LazyObject<C> {
    fn drop(&mut self) {
        let me: Weak<dyn Observer> = self.me.clone();
        for dependency in self.calculation.dependencies() {
            dependency.delete_observer(&me);
        }
    }
}

impl<C: Calculation> fmt::Debug for LazyObject<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LazyObject")
            .field("name", &self.name)
            .field("dirty", &state.dirty)
            .field("frozen", &state.frozen)
            .field("stats", &state.stats)
            .finish()
    }
}
