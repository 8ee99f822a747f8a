//! State hook and its dispatcher.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use super::{Hook, RenderCx};
use crate::error::RenderResult;
use crate::fiber::FiberId;
use crate::lanes::Lanes;
use crate::root::{ensure_root_is_scheduled, schedule_update_on_fiber, RootCell};
use crate::update_queue::{enqueue_update, Action, SharedQueue, StateRecord, Update, UpdateQueue};

struct StateHook<T> {
    record: StateRecord<T>,
    setter: SetState<T>,
}

struct Dispatch<T> {
    fiber: FiberId,
    queue: SharedQueue<T>,
    root: Weak<RootCell>,
}

/// Setter returned by [`RenderCx::use_state`].
///
/// The same setter is returned on every render of a component, so it can be
/// captured by effects and callbacks freely.
pub struct SetState<T> {
    inner: Rc<Dispatch<T>>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for SetState<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SetState").field(&self.inner.fiber).finish()
    }
}

impl<T: Clone + PartialEq + 'static> SetState<T> {
    /// Replace the state.
    pub fn set(&self, value: T) {
        self.dispatch(Action::Value(value));
    }

    /// Derive the next state from the previous one.
    pub fn update<F>(&self, f: F)
    where
        F: Fn(&T) -> T + 'static,
    {
        self.dispatch(Action::Apply(Rc::new(f)));
    }

    fn dispatch(&self, action: Action<T>) {
        let Some(cell) = self.inner.root.upgrade() else {
            debug!(fiber = ?self.inner.fiber, "state update after the root was dropped");
            return;
        };
        let fiber = self.inner.fiber;
        let lane = cell.reconciler.request_update_lane();

        {
            let Ok(mut guard) = cell.root.try_borrow_mut() else {
                warn!(?fiber, "state update while rendering is ignored");
                return;
            };
            let root = &mut *guard;
            let Some(node) = root.arena.get(fiber) else {
                warn!(?fiber, "state update on an unmounted component is ignored");
                return;
            };

            let mut update = Update::new(action, lane);

            // With no work queued on either copy, the next state can be
            // computed now. If nothing changes there is nothing to render.
            let alternate_lanes = node
                .alternate
                .and_then(|id| root.arena.get(id))
                .map_or(Lanes::NONE, |alt| alt.lanes);
            if node.lanes.is_empty() && alternate_lanes.is_empty() {
                let last = self.inner.queue.borrow().last_rendered_state().cloned();
                if let Some(last) = last {
                    let eager = update.action.apply(&last);
                    if eager == last {
                        trace!(?fiber, "eager state unchanged, skipping render");
                        update.lane = Lanes::NONE;
                        update.eager_state = Some(eager);
                        enqueue_update(&self.inner.queue, update, &mut root.arena, fiber, Lanes::NONE);
                        return;
                    }
                    update.eager_state = Some(eager);
                }
            }

            enqueue_update(&self.inner.queue, update, &mut root.arena, fiber, lane);
            schedule_update_on_fiber(root, fiber, lane);
        }

        ensure_root_is_scheduled(&cell);
    }
}

impl<'a> RenderCx<'a> {
    /// Declare a state value, initialised to `initial` on mount.
    pub fn use_state<T>(&mut self, initial: T) -> RenderResult<(T, SetState<T>)>
    where
        T: Clone + PartialEq + 'static,
    {
        self.use_state_with(move || initial)
    }

    /// Like [`use_state`](Self::use_state), computing the initial value only
    /// on mount.
    pub fn use_state_with<T, F>(&mut self, init: F) -> RenderResult<(T, SetState<T>)>
    where
        T: Clone + PartialEq + 'static,
        F: FnOnce() -> T,
    {
        let hook = match self.current_hook()? {
            None => {
                let queue: SharedQueue<T> = Rc::new(RefCell::new(UpdateQueue::new()));
                let setter = SetState {
                    inner: Rc::new(Dispatch {
                        fiber: self.wip,
                        queue: Rc::clone(&queue),
                        root: Rc::downgrade(self.root),
                    }),
                };
                StateHook {
                    record: StateRecord::new(init(), queue),
                    setter,
                }
            }
            Some(hook) => {
                let previous = match &hook {
                    Hook::State(any) => Rc::clone(any).downcast::<StateHook<T>>().ok(),
                    _ => None,
                };
                let Some(previous) = previous else {
                    return Err(self.mismatch("state", &hook));
                };

                let mut skipped = Lanes::NONE;
                let record = previous
                    .record
                    .process(self.render_lane, |update| skipped |= update.lane);
                if !skipped.is_empty() {
                    self.arena[self.wip].lanes |= skipped;
                }
                if record.memoized_state != previous.record.memoized_state {
                    self.did_receive_update = true;
                }

                StateHook {
                    record,
                    setter: previous.setter.clone(),
                }
            }
        };

        let value = hook.record.memoized_state.clone();
        let setter = hook.setter.clone();
        self.hooks.push(Hook::State(Rc::new(hook)));
        Ok((value, setter))
    }
}
