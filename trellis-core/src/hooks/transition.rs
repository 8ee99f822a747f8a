//! Transition hook.

use std::fmt;
use std::rc::{Rc, Weak};

use super::{RenderCx, SetState};
use crate::error::RenderResult;
use crate::root::RootCell;

/// Starter returned by [`RenderCx::use_transition`].
#[derive(Clone)]
pub struct StartTransition {
    set_pending: SetState<bool>,
    root: Weak<RootCell>,
}

impl StartTransition {
    /// Mark the transition pending, then run `scope` so that every update
    /// it dispatches is scheduled at transition priority.
    pub fn start<F: FnOnce()>(&self, scope: F) {
        self.set_pending.set(true);

        let Some(cell) = self.root.upgrade() else {
            scope();
            return;
        };
        let previous = cell.reconciler.enter_transition();
        scope();
        self.set_pending.set(false);
        cell.reconciler.exit_transition(previous);
    }
}

impl fmt::Debug for StartTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StartTransition").field(&self.set_pending).finish()
    }
}

impl<'a> RenderCx<'a> {
    /// Returns whether a transition started here is still pending, and a
    /// starter for new ones.
    pub fn use_transition(&mut self) -> RenderResult<(bool, StartTransition)> {
        let (is_pending, set_pending) = self.use_state(false)?;
        let root = Rc::downgrade(self.root);
        let start = self.use_ref_with(move || StartTransition { set_pending, root })?;
        let start = start.get();
        Ok((is_pending, start))
    }
}
