//! Relinkable, shared handles to observables.
//!
//! A [`Handle`] points at a shared [`Link`] slot. Cloning a handle clones the
//! pointer, not the slot: relinking through any copy is seen by all copies,
//! and observers registered through any copy are registered on the slot.
//!
//! The link is both an observer of its current target (when subscribed) and
//! an observable in its own right. Notifications from the target are passed
//! through unchanged; replacing the target raises one notification of its
//! own, so consumers never need to know whether the object behind a handle
//! was swapped or merely mutated.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::error::{QuantResult, QuantwireError};
use crate::observable::{Observable, ObservableId, Observer, ObserverRegistry, Payload};

/// What a link currently points at.
enum Target<T: ?Sized> {
    Empty,
    Owned(Arc<T>),
    /// The handle does not keep the target alive; liveness is checked on use.
    Unowned(Weak<T>),
}

impl<T: ?Sized> Target<T> {
    fn upgrade(&self) -> Option<Arc<T>> {
        match self {
            Self::Empty => None,
            Self::Owned(target) => Some(target.clone()),
            Self::Unowned(target) => target.upgrade(),
        }
    }

    fn address(&self) -> Option<usize> {
        match self {
            Self::Empty => None,
            Self::Owned(target) => Some(Arc::as_ptr(target) as *const () as usize),
            Self::Unowned(target) => Some(target.as_ptr() as *const () as usize),
        }
    }

    fn is_owned(&self) -> bool {
        matches!(self, Self::Owned(_))
    }
}

struct LinkState<T: ?Sized> {
    target: Target<T>,
    subscribed: bool,
}

/// The shared slot behind every copy of a handle.
pub struct Link<T: ?Sized + Observable + 'static> {
    registry: ObserverRegistry,
    state: RwLock<LinkState<T>>,
    me: Weak<Link<T>>,
}

impl<T: ?Sized + Observable + 'static> Link<T> {
    fn new(label: String, target: Target<T>, subscribed: bool) -> Arc<Self> {
        let link = Arc::new_cyclic(|me| Self {
            registry: ObserverRegistry::new(label),
            state: RwLock::new(LinkState {
                target: Target::Empty,
                subscribed: false,
            }),
            me: me.clone(),
        });
        if subscribed {
            if let Some(observable) = target.upgrade() {
                observable.add_observer(link.as_observer());
            }
        }
        *link.state.write() = LinkState { target, subscribed };
        link
    }

    fn as_observer(&self) -> Weak<dyn Observer> {
        self.me.clone()
    }

    fn current(&self) -> Option<Arc<T>> {
        self.state.read().target.upgrade()
    }

    fn relink(&self, target: Target<T>, subscribed: bool) -> QuantResult<()> {
        let (previous, next) = {
            let mut state = self.state.write();
            if state.target.address() == target.address()
                && state.target.is_owned() == target.is_owned()
                && state.subscribed == subscribed
            {
                return Ok(());
            }

            let previous = if state.subscribed {
                state.target.upgrade()
            } else {
                None
            };
            state.target = target;
            state.subscribed = subscribed;
            let next = if subscribed {
                state.target.upgrade()
            } else {
                None
            };
            (previous, next)
        };

        let me = self.as_observer();
        if let Some(previous) = previous {
            previous.delete_observer(&me);
        }
        if let Some(next) = next {
            next.add_observer(me);
        }

        tracing::debug!(handle = %self.registry.label(), subscribed, "Handle relinked");
        self.registry.notify(None)
    }
}

impl<T: ?Sized + Observable + 'static> Observer for Link<T> {
    fn update(&self, _source: ObservableId, payload: Option<&Payload>) -> QuantResult<()> {
        self.registry.notify(payload)
    }

    fn observer_name(&self) -> String {
        self.registry.label().to_string()
    }
}

impl<T: ?Sized + Observable + 'static> Drop for Link<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.subscribed {
            if let Some(target) = state.target.upgrade() {
                let me: Weak<dyn Observer> = self.me.clone();
                target.delete_observer(&me);
            }
        }
    }
}

/// Shared, relinkable handle to an observable.
pub struct Handle<T: ?Sized + Observable + 'static> {
    link: Arc<Link<T>>,
}

impl<T: ?Sized + Observable + 'static> Handle<T> {
    fn label() -> String {
        let name = std::any::type_name::<T>();
        let short = name.rsplit("::").next().unwrap_or(name);
        format!("Handle<{short}>")
    }

    /// Creates a handle with no target, awaiting wire-up.
    pub fn empty() -> Self {
        Self {
            link: Link::new(Self::label(), Target::Empty, false),
        }
    }

    /// Creates a handle to `target`, subscribed to its notifications.
    pub fn new(target: Arc<T>) -> Self {
        Self::with_subscription(target, true)
    }

    /// Creates a handle to `target`, subscribed only if `subscribe` is set.
    pub fn with_subscription(target: Arc<T>, subscribe: bool) -> Self {
        Self {
            link: Link::new(Self::label(), Target::Owned(target), subscribe),
        }
    }

    /// Creates a subscribed handle that does not keep `target` alive.
    ///
    /// Once every owner drops the target the handle reports empty.
    pub fn unowned(target: &Arc<T>) -> Self {
        Self {
            link: Link::new(Self::label(), Target::Unowned(Arc::downgrade(target)), true),
        }
    }

    /// Returns true if the handle has no live target.
    pub fn is_empty(&self) -> bool {
        self.link.current().is_none()
    }

    /// Returns the current target.
    ///
    /// # Errors
    ///
    /// Returns `QuantwireError::EmptyHandle` if nothing is linked, or if an
    /// unowned target has been dropped.
    pub fn get_link(&self) -> QuantResult<Arc<T>> {
        self.link
            .current()
            .ok_or_else(|| QuantwireError::empty_handle(self.link.registry.label()))
    }

    /// Returns the current target, if any.
    pub fn current_link(&self) -> Option<Arc<T>> {
        self.link.current()
    }

    /// Returns true if the link observes its target.
    pub fn is_subscribed(&self) -> bool {
        self.link.state.read().subscribed
    }

    /// Points every copy of this handle at `target`.
    ///
    /// A no-op if the target and the subscription flag are unchanged.
    /// Otherwise the link moves its subscription from the old target to the
    /// new one and notifies its own observers once.
    pub fn set_link(&self, target: Arc<T>, subscribe: bool) -> QuantResult<()> {
        self.link.relink(Target::Owned(target), subscribe)
    }

    /// Like [`Handle::set_link`] but without keeping `target` alive.
    pub fn set_link_unowned(&self, target: &Arc<T>, subscribe: bool) -> QuantResult<()> {
        self.link
            .relink(Target::Unowned(Arc::downgrade(target)), subscribe)
    }

    /// Empties every copy of this handle.
    pub fn unlink(&self) -> QuantResult<()> {
        self.link.relink(Target::Empty, false)
    }

    /// Returns true if both handles share one link.
    pub fn same_link(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.link, &other.link)
    }
}

impl<T: ?Sized + Observable + 'static> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            link: self.link.clone(),
        }
    }
}

impl<T: ?Sized + Observable + 'static> Default for Handle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized + Observable + 'static> Observable for Handle<T> {
    fn observers(&self) -> &ObserverRegistry {
        &self.link.registry
    }
}

impl<T: ?Sized + Observable + 'static> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("label", &self.link.registry.label())
            .field("empty", &self.is_empty())
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}
