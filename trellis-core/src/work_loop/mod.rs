//! Render Phase
//!
//! Builds the work-in-progress tree for one lane by walking it depth-first
//! with a single cursor, using the tree's own `child`, `sibling` and
//! `return` links instead of recursion. Because all traversal state lives in
//! the root's [`RenderSession`], a concurrent pass can stop between any two
//! units of work and resume later.
//!
//! # How It Works
//!
//! 1. **Begin** a node: decide whether it can bail out, otherwise render it
//!    and reconcile its children. Descend into the first child.
//!
//! 2. With no child left, **complete** the node: create or diff its host
//!    instance and bubble flags and lanes up. Continue with the sibling, or
//!    complete the parent.
//!
//! 3. If begin returns an error, the pass **unwinds**: stack entries pushed
//!    by the nodes being abandoned are popped until a suspense boundary
//!    claims the suspension, or the root is reached and the pass is dropped.
//!
//! The pass is finished when the cursor climbs past the root.

mod begin;
mod complete;
mod unwind;

use std::rc::Rc;

use tracing::{debug, debug_span};

use crate::context::ProviderStack;
use crate::error::ReconcilerError;
use crate::fiber::{create_work_in_progress, FiberId, FiberProps};
use crate::lanes::{Lane, Lanes};
use crate::root::{FiberRoot, RootCell};

/// How a render pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum RootExitStatus {
    /// Still running.
    #[default]
    InProgress,
    /// Yielded with work left.
    InComplete,
    /// The whole tree completed and is ready to commit.
    Completed,
    /// Abandoned for this lane, nothing to commit.
    DidNotComplete,
    /// Aborted by an error that must be reported.
    Fatal,
}

/// Traversal state of the render pass in progress on one root.
#[derive(Default)]
pub(crate) struct RenderSession {
    pub wip: Option<FiberId>,
    pub render_lane: Lane,
    pub exit_status: RootExitStatus,
    pub providers: ProviderStack,
    pub suspense_handlers: Vec<FiberId>,
    /// Error to report once the pass is over.
    pub error: Option<ReconcilerError>,
}

impl RenderSession {
    /// Forget the pass. The next render of any lane starts fresh.
    pub fn reset(&mut self) {
        self.wip = None;
        self.render_lane = Lanes::NONE;
        self.exit_status = RootExitStatus::InProgress;
        self.providers.clear();
        self.suspense_handlers.clear();
    }

    pub fn is_rendering(&self) -> bool {
        self.wip.is_some()
    }
}

fn prepare_fresh_stack(root: &mut FiberRoot, lane: Lane) {
    root.finished_work = None;
    root.session.reset();
    root.session.error = None;

    let current = root.current;
    let wip = create_work_in_progress(&mut root.arena, current, FiberProps::Empty);
    root.session.wip = Some(wip);
    root.session.render_lane = lane;
}

/// Render `lane` on `root`, resuming an interrupted pass of the same lane.
///
/// With `should_time_slice`, the pass polls the scheduler between units of
/// work and returns [`RootExitStatus::InComplete`] when asked to yield.
pub(crate) fn render_root(
    root: &mut FiberRoot,
    cell: &Rc<RootCell>,
    lane: Lane,
    should_time_slice: bool,
) -> RootExitStatus {
    let span = debug_span!("render_root", root = root.id, ?lane, concurrent = should_time_slice);
    let _enter = span.enter();

    if root.session.render_lane != lane || !root.session.is_rendering() {
        debug!("preparing fresh stack");
        prepare_fresh_stack(root, lane);
    }

    let scheduler = Rc::clone(cell.reconciler.scheduler());
    while let Some(unit) = root.session.wip {
        if should_time_slice && scheduler.should_yield() {
            break;
        }
        perform_unit_of_work(root, cell, unit);
    }

    let status = match root.session.exit_status {
        RootExitStatus::InProgress if root.session.is_rendering() => RootExitStatus::InComplete,
        RootExitStatus::InProgress => RootExitStatus::Completed,
        status => status,
    };
    debug!(?status, "render pass exited");
    status
}

fn perform_unit_of_work(root: &mut FiberRoot, cell: &Rc<RootCell>, unit: FiberId) {
    let lane = root.session.render_lane;
    match begin::begin_work(root, cell, unit, lane) {
        Ok(next) => {
            let node = &mut root.arena[unit];
            node.memoized_props = node.pending_props.clone();
            match next {
                Some(child) => root.session.wip = Some(child),
                None => complete_unit_of_work(root, cell, unit),
            }
        }
        Err(error) => unwind::throw_and_unwind(root, cell, unit, error),
    }
}

fn complete_unit_of_work(root: &mut FiberRoot, cell: &Rc<RootCell>, unit: FiberId) {
    let mut node = Some(unit);
    while let Some(id) = node {
        complete::complete_work(root, cell, id);

        if let Some(sibling) = root.arena[id].sibling {
            root.session.wip = Some(sibling);
            return;
        }
        node = root.arena[id].return_fiber;
        root.session.wip = node;
    }
}
