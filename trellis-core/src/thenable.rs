//! Async dependencies a component can suspend on.
//!
//! A [`Thenable`] is a single-assignment cell that is either pending,
//! fulfilled or rejected. Reading a pending thenable through
//! [`RenderCx::use_thenable`](crate::RenderCx::use_thenable) unwinds the
//! render pass to the nearest suspense boundary; the reconciler subscribes
//! to the thenable and retries once it settles.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a wakeable, used as the key of a root's ping cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WakeableId(u64);

impl WakeableId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for WakeableId {
    fn default() -> Self {
        Self::new()
    }
}

/// Anything the reconciler can wait on.
pub trait Wakeable {
    fn id(&self) -> WakeableId;

    /// Call `listener` once the value settles, either way. A wakeable that
    /// already settled calls it right away.
    fn subscribe(&self, listener: Box<dyn FnOnce()>);
}

/// Settlement state of a [`Thenable`].
#[derive(Debug, Clone, PartialEq)]
pub enum ThenableState<T> {
    Pending,
    Fulfilled(T),
    Rejected(Rc<str>),
}

struct ThenableInner<T> {
    id: WakeableId,
    state: RefCell<ThenableState<T>>,
    listeners: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Shared handle to an eventually available value.
///
/// Clones share the same cell.
pub struct Thenable<T> {
    inner: Rc<ThenableInner<T>>,
}

impl<T> Clone for Thenable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Thenable<T> {
    /// A thenable that has not settled yet.
    pub fn pending() -> Self {
        Self::with_state(ThenableState::Pending)
    }

    /// A thenable that is already fulfilled.
    pub fn resolved(value: T) -> Self {
        Self::with_state(ThenableState::Fulfilled(value))
    }

    fn with_state(state: ThenableState<T>) -> Self {
        Self {
            inner: Rc::new(ThenableInner {
                id: WakeableId::new(),
                state: RefCell::new(state),
                listeners: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Fulfill the thenable and notify listeners. Settling twice is ignored.
    pub fn resolve(&self, value: T) {
        self.settle(ThenableState::Fulfilled(value));
    }

    /// Reject the thenable and notify listeners. Settling twice is ignored.
    pub fn reject(&self, reason: impl Into<Rc<str>>) {
        self.settle(ThenableState::Rejected(reason.into()));
    }

    fn settle(&self, next: ThenableState<T>) {
        {
            let mut state = self.inner.state.borrow_mut();
            if !matches!(*state, ThenableState::Pending) {
                return;
            }
            *state = next;
        }

        let listeners = std::mem::take(&mut *self.inner.listeners.borrow_mut());
        for listener in listeners {
            listener();
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.inner.state.borrow(), ThenableState::Pending)
    }

    pub fn wakeable_id(&self) -> WakeableId {
        self.inner.id
    }

    /// Type-erased handle used by the reconciler.
    pub(crate) fn as_wakeable(&self) -> Rc<dyn Wakeable> {
        Rc::new(self.clone())
    }
}

impl<T: Clone> Thenable<T> {
    /// Snapshot of the current state.
    pub fn state(&self) -> ThenableState<T> {
        self.inner.state.borrow().clone()
    }
}

impl<T: 'static> Wakeable for Thenable<T> {
    fn id(&self) -> WakeableId {
        self.inner.id
    }

    fn subscribe(&self, listener: Box<dyn FnOnce()>) {
        if self.is_pending() {
            self.inner.listeners.borrow_mut().push(listener);
        } else {
            listener();
        }
    }
}

impl<T> fmt::Debug for Thenable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match *self.inner.state.borrow() {
            ThenableState::Pending => "pending",
            ThenableState::Fulfilled(_) => "fulfilled",
            ThenableState::Rejected(_) => "rejected",
        };
        f.debug_struct("Thenable")
            .field("id", &self.inner.id)
            .field("status", &status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn resolve_notifies_listeners_once() {
        let thenable = Thenable::<i32>::pending();
        let calls = Rc::new(Cell::new(0));

        let seen = calls.clone();
        thenable.subscribe(Box::new(move || seen.set(seen.get() + 1)));
        assert_eq!(calls.get(), 0);

        thenable.resolve(7);
        thenable.resolve(8);
        assert_eq!(calls.get(), 1);
        assert_eq!(thenable.state(), ThenableState::Fulfilled(7));
    }

    #[test]
    fn subscribe_after_settle_fires_immediately() {
        let thenable = Thenable::resolved("ready");
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        thenable.subscribe(Box::new(move || flag.set(true)));
        assert!(fired.get());
    }

    #[test]
    fn reject_records_reason() {
        let thenable = Thenable::<()>::pending();
        thenable.reject("offline");
        assert_eq!(thenable.state(), ThenableState::Rejected("offline".into()));
        assert!(!thenable.is_pending());
    }

    #[test]
    fn clones_share_identity() {
        let a = Thenable::<u8>::pending();
        let b = a.clone();
        assert_eq!(a.wakeable_id(), b.wakeable_id());
        assert_ne!(a.wakeable_id(), Thenable::<u8>::pending().wakeable_id());
    }
}
