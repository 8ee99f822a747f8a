//! Root scheduling: turning pending lanes into render passes.
//!
//! Sync work is queued on the reconciler's sync queue and drained at the
//! next host microtask. Everything else becomes a task on the external
//! scheduler, rendered in slices that yield between units of work.

use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};

use super::{FiberRoot, RootCell};
use crate::commit::{commit_root, flush_passive_effects};
use crate::error::ReconcilerError;
use crate::fiber::{FiberArena, FiberId};
use crate::lanes::{Lane, Lanes, RootLanes};
use crate::scheduler::SchedulerTask;
use crate::work_loop::{render_root, RootExitStatus};

/// Record `lane` on the path from `fiber` up to the root, both copies of
/// every ancestor included.
pub(crate) fn mark_update_lane_from_fiber_to_root(arena: &mut FiberArena, fiber: FiberId, lane: Lane) {
    let mut parent = arena.get(fiber).and_then(|node| node.return_fiber);

    while let Some(id) = parent {
        let Some(node) = arena.get_mut(id) else {
            break;
        };
        node.child_lanes |= lane;
        parent = node.return_fiber;
        let alternate = node.alternate;
        if let Some(alt) = alternate.and_then(|alt| arena.get_mut(alt)) {
            alt.child_lanes |= lane;
        }
    }
}

/// Record an update at `lane` on `fiber` with the root.
///
/// The caller already marked the fiber itself and is expected to call
/// [`ensure_root_is_scheduled`] once it released the root.
pub(crate) fn schedule_update_on_fiber(root: &mut FiberRoot, fiber: FiberId, lane: Lane) {
    mark_update_lane_from_fiber_to_root(&mut root.arena, fiber, lane);
    root.lanes.mark_updated(lane);

    if root.in_commit_callbacks {
        root.nested_update_scheduled = true;
    }

    // The paused pass may already be past the updated node.
    if root.session.is_rendering() && root.session.render_lane.intersects(lane) {
        trace!(root = root.id, ?lane, "update interleaved with a paused pass, restarting");
        root.session.render_lane = Lanes::NONE;
    }
}

/// Make sure exactly one callback services the root's most urgent lane.
pub(crate) fn ensure_root_is_scheduled(cell: &Rc<RootCell>) {
    let Ok(mut root) = cell.root.try_borrow_mut() else {
        return;
    };
    let scheduler = cell.reconciler.scheduler();
    let lane = root.lanes.next_lane();
    let existing = root.callback_node;

    if lane.is_empty() {
        if let Some(handle) = existing {
            scheduler.cancel(handle);
        }
        root.callback_node = None;
        root.callback_priority = Lanes::NONE;
        return;
    }

    if lane == root.callback_priority {
        return;
    }

    if let Some(handle) = existing {
        trace!(root = root.id, ?handle, "cancelling superseded callback");
        scheduler.cancel(handle);
    }

    let weak = Rc::downgrade(cell);
    if lane == Lanes::SYNC {
        debug!(root = root.id, "scheduling sync render");
        root.callback_node = None;
        cell.reconciler.schedule_sync_callback(Box::new(move || {
            if let Some(cell) = weak.upgrade() {
                perform_sync_work_on_root(&cell);
            }
        }));
    } else {
        let priority = lane.to_priority();
        let handle = scheduler.schedule(priority, concurrent_task(weak));
        debug!(root = root.id, ?lane, ?priority, ?handle, "scheduling concurrent render");
        root.callback_node = Some(handle);
    }
    root.callback_priority = lane;
}

fn concurrent_task(root: Weak<RootCell>) -> SchedulerTask {
    SchedulerTask::new(move |did_timeout| perform_concurrent_work_on_root(root, did_timeout))
}

/// Drop every pending lane when commit callbacks keep scheduling updates
/// on this root. Returns whether the root was reset.
fn check_nested_updates(root: &mut FiberRoot, limit: u32) -> bool {
    if !root.nested_update_scheduled || root.nested_update_count < limit {
        return false;
    }

    error!(root = root.id, limit, "too many nested updates, dropping pending work");
    root.error = Some(ReconcilerError::NestedUpdateLimit { limit });
    root.lanes = RootLanes::default();
    root.session.reset();
    root.nested_update_scheduled = false;
    root.nested_update_count = 0;
    true
}

fn report_session_error(root: &mut FiberRoot) {
    if let Some(err) = root.session.error.take() {
        root.error = Some(err);
    }
}

fn perform_sync_work_on_root(cell: &Rc<RootCell>) {
    flush_passive_effects(cell);

    let Ok(mut guard) = cell.root.try_borrow_mut() else {
        return;
    };
    let root = &mut *guard;
    // The queued callback is being consumed.
    if root.callback_priority == Lanes::SYNC {
        root.callback_priority = Lanes::NONE;
    }

    let lane = root.lanes.next_lane();
    if lane != Lanes::SYNC {
        drop(guard);
        ensure_root_is_scheduled(cell);
        return;
    }

    let limit = cell.reconciler.config().nested_update_limit;
    if check_nested_updates(root, limit) {
        return;
    }

    let status = render_root(root, cell, lane, false);
    report_session_error(root);
    finish_render(guard, cell, lane, status);
}

fn perform_concurrent_work_on_root(weak: Weak<RootCell>, did_timeout: bool) -> Option<SchedulerTask> {
    let cell = weak.upgrade()?;
    let original = cell.root.try_borrow().ok()?.callback_node;

    if flush_passive_effects(&cell) && cell.root.try_borrow().ok()?.callback_node != original {
        // An effect scheduled more urgent work.
        return None;
    }

    let mut guard = cell.root.try_borrow_mut().ok()?;
    let root = &mut *guard;
    let lane = root.lanes.next_lane();
    if lane.is_empty() {
        root.callback_node = None;
        root.callback_priority = Lanes::NONE;
        return None;
    }

    // This task was scheduled for another lane. Let the scheduling step pick
    // the right callback (the sync queue for the sync lane).
    if lane != root.callback_priority {
        trace!(root = root.id, ?lane, scheduled = ?root.callback_priority, "lane changed, rescheduling");
        drop(guard);
        ensure_root_is_scheduled(&cell);
        let still_ours = cell.root.try_borrow().ok()?.callback_node == original;
        return still_ours.then(|| concurrent_task(weak));
    }

    let limit = cell.reconciler.config().nested_update_limit;
    if check_nested_updates(root, limit) {
        root.callback_node = None;
        root.callback_priority = Lanes::NONE;
        return None;
    }

    let should_time_slice = cell.reconciler.config().time_slice && !did_timeout && lane != Lanes::SYNC;
    let status = render_root(root, &cell, lane, should_time_slice);
    report_session_error(root);

    if status == RootExitStatus::InComplete {
        if root.callback_node != original {
            return None;
        }
        trace!(root = root.id, ?lane, "yielding, continuation scheduled");
        return Some(concurrent_task(weak));
    }

    root.callback_node = None;
    root.callback_priority = Lanes::NONE;
    finish_render(guard, &cell, lane, status);
    None
}

/// Commit or park the outcome of a pass that ran to an end.
fn finish_render(
    mut guard: std::cell::RefMut<'_, FiberRoot>,
    cell: &Rc<RootCell>,
    lane: Lane,
    status: RootExitStatus,
) {
    let root = &mut *guard;
    match status {
        RootExitStatus::Completed => {
            let current = root.current;
            root.finished_work = root.arena[current].alternate;
            root.finished_lane = lane;
            root.session.reset();
            drop(guard);
            commit_root(cell);
        }
        RootExitStatus::DidNotComplete => {
            debug!(root = root.id, ?lane, "lane suspended");
            root.lanes.mark_suspended(lane);
            root.session.reset();
            drop(guard);
            ensure_root_is_scheduled(cell);
        }
        RootExitStatus::Fatal => {
            root.lanes.pending = root.lanes.pending.remove(lane);
            root.session.reset();
            drop(guard);
            ensure_root_is_scheduled(cell);
        }
        RootExitStatus::InProgress | RootExitStatus::InComplete => {
            error!(root = root.id, ?status, "render pass ended without finishing");
        }
    }
}
