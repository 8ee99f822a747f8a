//! Suspension and unwinding.

use std::rc::{Rc, Weak};

use tracing::{debug, error, trace, warn};

use super::RootExitStatus;
use crate::element::ElementType;
use crate::error::{ReconcilerError, RenderError};
use crate::fiber::{FiberId, Flags, WorkTag};
use crate::lanes::{Lane, Lanes};
use crate::root::{ensure_root_is_scheduled, mark_update_lane_from_fiber_to_root, FiberRoot, RootCell};
use crate::thenable::{Wakeable, WakeableId};

/// Handle an error returned while beginning `unit`.
pub(super) fn throw_and_unwind(root: &mut FiberRoot, cell: &Rc<RootCell>, unit: FiberId, thrown: RenderError) {
    let lane = root.session.render_lane;
    match thrown {
        RenderError::Suspended(signal) => {
            debug!(fiber = ?unit, "component suspended");
            throw_exception(root, cell, signal.wakeable, lane);
            unwind_unit_of_work(root, unit);
        }
        RenderError::Thrown(thrown) => {
            error!(fiber = ?unit, error = %thrown, "component threw, abandoning render pass");
            abandon(root, RootExitStatus::DidNotComplete, ReconcilerError::Thrown(thrown));
        }
        RenderError::Usage(usage) => {
            error!(fiber = ?unit, error = %usage, "render pass aborted");
            abandon(root, RootExitStatus::Fatal, ReconcilerError::Usage(usage));
        }
    }
}

fn abandon(root: &mut FiberRoot, status: RootExitStatus, error: ReconcilerError) {
    root.session.exit_status = status;
    root.session.error = Some(error);
    root.session.wip = None;
}

/// Flag the nearest suspense boundary that is not already showing its
/// fallback, and arrange for the root to be retried at `lane` once
/// `wakeable` settles.
fn throw_exception(root: &mut FiberRoot, cell: &Rc<RootCell>, wakeable: Rc<dyn Wakeable>, lane: Lane) {
    let boundary = root
        .session
        .suspense_handlers
        .iter()
        .rev()
        .copied()
        .find(|id| !root.arena[*id].flags.contains(Flags::DID_CAPTURE));
    if let Some(boundary) = boundary {
        root.arena[boundary].flags |= Flags::SHOULD_CAPTURE;
    }
    attach_ping_listener(root, cell, wakeable, lane, boundary);
}

fn attach_ping_listener(
    root: &mut FiberRoot,
    cell: &Rc<RootCell>,
    wakeable: Rc<dyn Wakeable>,
    lane: Lane,
    boundary: Option<FiberId>,
) {
    let id = wakeable.id();
    let waiting = root.ping_cache.entry(id).or_insert(Lanes::NONE);
    if waiting.contains(lane) {
        return;
    }
    *waiting |= lane;

    let weak = Rc::downgrade(cell);
    wakeable.subscribe(Box::new(move || {
        let Some(cell) = weak.upgrade() else {
            return;
        };
        // Settling may happen in the middle of a render; retry from a clean
        // stack instead.
        let weak = Rc::downgrade(&cell);
        cell.reconciler
            .host()
            .borrow_mut()
            .schedule_microtask(Box::new(move || ping_root(&weak, id, lane, boundary)));
    }));
}

fn ping_root(cell: &Weak<RootCell>, wakeable: WakeableId, lane: Lane, boundary: Option<FiberId>) {
    let Some(cell) = cell.upgrade() else {
        return;
    };

    {
        let Ok(mut guard) = cell.root.try_borrow_mut() else {
            warn!(?wakeable, "ping arrived while the root was busy");
            return;
        };
        let root = &mut *guard;
        debug!(root = root.id, ?wakeable, ?lane, "pinged");

        root.ping_cache.remove(&wakeable);
        root.lanes.mark_pinged(lane);
        root.lanes.mark_updated(lane);

        // A paused pass at this lane already took the suspended branch and
        // would commit the fallback.
        if root.session.is_rendering() && root.session.render_lane.intersects(lane) {
            trace!(root = root.id, ?lane, "ping during a paused pass, restarting");
            root.session.render_lane = Lanes::NONE;
        }

        if let Some(boundary) = boundary.filter(|id| root.arena.contains(*id)) {
            let node = &mut root.arena[boundary];
            node.lanes |= lane;
            let alternate = node.alternate;
            if let Some(alt) = alternate.and_then(|id| root.arena.get_mut(id)) {
                alt.lanes |= lane;
            }
            mark_update_lane_from_fiber_to_root(&mut root.arena, boundary, lane);
        }
    }

    ensure_root_is_scheduled(&cell);
}

/// Walk up from `unit`, popping what each abandoned node pushed, until a
/// suspense boundary captures the suspension.
fn unwind_unit_of_work(root: &mut FiberRoot, unit: FiberId) {
    let mut incomplete = Some(unit);

    while let Some(id) = incomplete {
        if let Some(next) = unwind_work(root, id) {
            root.session.wip = Some(next);
            return;
        }

        let parent = root.arena[id].return_fiber;
        if let Some(parent) = parent {
            let node = &mut root.arena[parent];
            node.deletions.clear();
            node.flags.remove(Flags::CHILD_DELETION);
        }
        incomplete = parent;
    }

    debug!("no boundary captured the suspension");
    root.session.exit_status = RootExitStatus::DidNotComplete;
    root.session.wip = None;
}

fn unwind_work(root: &mut FiberRoot, id: FiberId) -> Option<FiberId> {
    match root.arena[id].tag {
        WorkTag::SuspenseComponent => {
            root.session.suspense_handlers.pop();
            let flags = root.arena[id].flags;
            if flags.contains(Flags::SHOULD_CAPTURE) && !flags.contains(Flags::DID_CAPTURE) {
                let node = &mut root.arena[id];
                node.flags.remove(Flags::SHOULD_CAPTURE);
                node.flags |= Flags::DID_CAPTURE;
                return Some(id);
            }
            None
        }
        WorkTag::ContextProvider => {
            if let Some(ElementType::Provider(handle)) = &root.arena[id].element_type {
                let context = handle.id();
                root.session.providers.pop(context);
            }
            None
        }
        _ => None,
    }
}
