//! Commit Phase
//!
//! Applies a completed work-in-progress tree to the host and makes it the
//! current tree. Unlike rendering, a commit is never interrupted.
//!
//! # How It Works
//!
//! 1. **Mutation**: walk the nodes whose subtree carries effect flags and
//!    apply placements, attribute updates, deletions and visibility flips
//!    through the host adapter. Deleted components hand their effects over
//!    for cleanup; old refs are queued for detaching.
//!
//! 2. **Swap**: the finished tree becomes `current`.
//!
//! 3. **Layout**: refs of new or re-referenced host instances are attached.
//!    Ref callbacks run after the root borrow is released, detaches first.
//!
//! 4. **Passive**: effect lists collected during mutation are flushed later
//!    by a normal-priority scheduler task (or by the next sync render,
//!    whichever comes first).

mod mutation;
mod passive;

pub(crate) use passive::flush_passive_effects;

use std::rc::{Rc, Weak};

use tracing::{debug, debug_span, trace, warn};

use crate::element::ElementRef;
use crate::fiber::Flags;
use crate::host::HostNodeId;
use crate::lanes::Lanes;
use crate::root::{ensure_root_is_scheduled, RootCell};
use crate::scheduler::{Priority, SchedulerTask};

/// Ref changes collected during commit, applied once the root is released.
#[derive(Default)]
pub(crate) struct RefOps {
    detach: Vec<ElementRef>,
    attach: Vec<(ElementRef, HostNodeId)>,
}

impl RefOps {
    fn is_empty(&self) -> bool {
        self.detach.is_empty() && self.attach.is_empty()
    }

    fn run(self) {
        for node_ref in self.detach {
            node_ref.apply(None);
        }
        for (node_ref, instance) in self.attach {
            node_ref.apply(Some(instance));
        }
    }
}

/// Commit the root's finished work.
pub(crate) fn commit_root(cell: &Rc<RootCell>) {
    let Ok(mut guard) = cell.root.try_borrow_mut() else {
        warn!("commit requested while the root is busy");
        return;
    };
    let root = &mut *guard;
    let Some(finished) = root.finished_work.take() else {
        return;
    };
    let lane = std::mem::replace(&mut root.finished_lane, Lanes::NONE);

    let span = debug_span!("commit_root", root = root.id, ?lane);
    let _enter = span.enter();

    root.lanes.mark_finished(lane);
    root.callback_node = None;
    root.callback_priority = Lanes::NONE;

    if root.nested_update_scheduled {
        root.nested_update_count += 1;
        root.nested_update_scheduled = false;
    } else {
        root.nested_update_count = 0;
    }

    let flags = root.arena[finished].flags | root.arena[finished].subtree_flags;

    if flags.intersects(Flags::PASSIVE_MASK) && !root.passive_flush_scheduled {
        root.passive_flush_scheduled = true;
        let weak = Rc::downgrade(cell);
        let handle = cell
            .reconciler
            .scheduler()
            .schedule(Priority::Normal, passive_flush_task(weak));
        trace!(?handle, "passive effect flush scheduled");
    }

    let mut refs = RefOps::default();
    if flags.intersects(Flags::MUTATION_MASK | Flags::PASSIVE_MASK) {
        let host = Rc::clone(cell.reconciler.host());
        let mut host = host.borrow_mut();
        let stats = mutation::commit_mutation_effects(root, &mut *host, finished, &mut refs);
        debug!(
            placements = stats.placements,
            updates = stats.updates,
            deletions = stats.deletions,
            "mutations applied"
        );
    }

    root.current = finished;
    let freed = root.arena.sweep(finished);
    trace!(freed, live = root.arena.len(), "swept stale nodes");

    if !refs.is_empty() {
        root.in_commit_callbacks = true;
        drop(guard);
        refs.run();
        if let Ok(mut root) = cell.root.try_borrow_mut() {
            root.in_commit_callbacks = false;
        }
    } else {
        drop(guard);
    }

    ensure_root_is_scheduled(cell);
}

fn passive_flush_task(root: Weak<RootCell>) -> SchedulerTask {
    SchedulerTask::new(move |_| {
        if let Some(cell) = root.upgrade() {
            flush_passive_effects(&cell);
        }
        None
    })
}
