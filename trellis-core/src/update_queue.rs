//! Update Queue
//!
//! Every stateful unit (a state hook, a root) owns a shared queue of pending
//! updates. Dispatching appends to the queue; rendering drains it into the
//! unit's *base queue* and replays the base queue against the *base state*.
//!
//! # How Priority-Aware Replay Works
//!
//! 1. Updates whose lane is not part of the render lane are skipped. They
//!    are copied into the new base queue and reported through `on_skip` so
//!    the owner keeps their lane pending.
//!
//! 2. The first skip freezes the new base state at the state *before* that
//!    update. Every later pass restarts from there.
//!
//! 3. Updates applied after a skip are still copied into the new base queue,
//!    with their lane degraded to [`Lanes::NONE`], so the replay keeps the
//!    original order.
//!
//! This lets a high-priority update jump ahead of pending low-priority ones
//! without losing or reordering them.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::fiber::{FiberArena, FiberId};
use crate::lanes::{Lane, Lanes};

/// What an update does to the state.
pub enum Action<S> {
    /// Replace the state.
    Value(S),
    /// Compute the next state from the previous one.
    Apply(Rc<dyn Fn(&S) -> S>),
}

impl<S: Clone> Action<S> {
    pub fn apply(&self, state: &S) -> S {
        match self {
            Action::Value(value) => value.clone(),
            Action::Apply(f) => f(state),
        }
    }
}

impl<S: Clone> Clone for Action<S> {
    fn clone(&self) -> Self {
        match self {
            Action::Value(value) => Action::Value(value.clone()),
            Action::Apply(f) => Action::Apply(Rc::clone(f)),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Action<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Action::Apply(_) => f.write_str("Apply(..)"),
        }
    }
}

/// A single state transition.
#[derive(Clone, Debug)]
pub struct Update<S> {
    pub action: Action<S>,
    pub lane: Lane,
    /// State computed at dispatch time when the queue was known to be empty.
    pub eager_state: Option<S>,
}

impl<S> Update<S> {
    pub fn new(action: Action<S>, lane: Lane) -> Self {
        Self {
            action,
            lane,
            eager_state: None,
        }
    }
}

impl<S: Clone> Update<S> {
    /// Copy for the base queue. The eager state only holds for the position
    /// the update was dispatched at, so it is not carried over.
    fn requeued(&self, lane: Lane) -> Self {
        Update::new(self.action.clone(), lane)
    }
}

/// Pending updates of one stateful unit, in dispatch order.
pub struct UpdateQueue<S> {
    pending: Vec<Update<S>>,
    last_rendered_state: Option<S>,
}

/// Queue shared between both copies of a node and every dispatcher.
pub type SharedQueue<S> = Rc<RefCell<UpdateQueue<S>>>;

impl<S> UpdateQueue<S> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            last_rendered_state: None,
        }
    }

    pub fn push(&mut self, update: Update<S>) {
        self.pending.push(update);
    }

    pub fn take_pending(&mut self) -> Vec<Update<S>> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn last_rendered_state(&self) -> Option<&S> {
        self.last_rendered_state.as_ref()
    }

    pub fn set_last_rendered_state(&mut self, state: S) {
        self.last_rendered_state = Some(state);
    }
}

impl<S> Default for UpdateQueue<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Append `update` to `queue` and record `lane` as outstanding work on
/// `fiber` and its alternate, so a bail-out check on either copy sees it.
pub(crate) fn enqueue_update<S>(
    queue: &SharedQueue<S>,
    update: Update<S>,
    arena: &mut FiberArena,
    fiber: FiberId,
    lane: Lane,
) {
    queue.borrow_mut().push(update);

    let Some(node) = arena.get_mut(fiber) else {
        return;
    };
    node.lanes |= lane;
    let alternate = node.alternate;
    if let Some(alt) = alternate.and_then(|id| arena.get_mut(id)) {
        alt.lanes |= lane;
    }
}

/// Outcome of replaying a base queue.
#[derive(Debug)]
pub struct ProcessedQueue<S> {
    /// State this render pass observes.
    pub memoized_state: S,
    /// State future passes restart from.
    pub base_state: S,
    /// Updates future passes must replay.
    pub base_queue: Vec<Update<S>>,
}

/// Replay `updates` over `base_state` for a pass rendering `render_lane`.
pub fn process_update_queue<S, F>(
    base_state: S,
    updates: Vec<Update<S>>,
    render_lane: Lane,
    mut on_skip: F,
) -> ProcessedQueue<S>
where
    S: Clone,
    F: FnMut(&Update<S>),
{
    let mut state = base_state.clone();
    let mut new_base_state: Option<S> = None;
    let mut new_base_queue: Vec<Update<S>> = Vec::new();

    for update in updates {
        if !render_lane.contains(update.lane) {
            let skipped = update.requeued(update.lane);
            on_skip(&skipped);
            if new_base_queue.is_empty() {
                new_base_state = Some(state.clone());
            }
            new_base_queue.push(skipped);
            continue;
        }

        if !new_base_queue.is_empty() {
            new_base_queue.push(update.requeued(Lanes::NONE));
        }

        state = match update.eager_state {
            Some(eager) => eager,
            None => update.action.apply(&state),
        };
    }

    ProcessedQueue {
        base_state: new_base_state.unwrap_or_else(|| state.clone()),
        memoized_state: state,
        base_queue: new_base_queue,
    }
}

/// Persisted state of one stateful unit for one tree version.
///
/// Records are immutable apart from `base_queue`, which a render pass
/// extends on the *current* record before replaying it. Pending updates
/// drained by an abandoned pass are therefore never lost.
pub struct StateRecord<S> {
    pub memoized_state: S,
    pub base_state: S,
    pub base_queue: RefCell<Vec<Update<S>>>,
    pub queue: SharedQueue<S>,
}

impl<S: Clone> StateRecord<S> {
    pub fn new(initial: S, queue: SharedQueue<S>) -> Self {
        queue.borrow_mut().set_last_rendered_state(initial.clone());
        Self {
            memoized_state: initial.clone(),
            base_state: initial,
            base_queue: RefCell::new(Vec::new()),
            queue,
        }
    }

    /// Drain pending updates into this record's base queue and replay it for
    /// `render_lane`, producing the record of the next tree version.
    pub fn process<F>(&self, render_lane: Lane, on_skip: F) -> StateRecord<S>
    where
        F: FnMut(&Update<S>),
    {
        let pending = self.queue.borrow_mut().take_pending();
        let updates = {
            let mut base_queue = self.base_queue.borrow_mut();
            base_queue.extend(pending);
            base_queue.clone()
        };

        let next = if updates.is_empty() {
            StateRecord {
                memoized_state: self.memoized_state.clone(),
                base_state: self.base_state.clone(),
                base_queue: RefCell::new(Vec::new()),
                queue: Rc::clone(&self.queue),
            }
        } else {
            let result = process_update_queue(self.base_state.clone(), updates, render_lane, on_skip);
            StateRecord {
                memoized_state: result.memoized_state,
                base_state: result.base_state,
                base_queue: RefCell::new(result.base_queue),
                queue: Rc::clone(&self.queue),
            }
        };

        next.queue
            .borrow_mut()
            .set_last_rendered_state(next.memoized_state.clone());
        next
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
