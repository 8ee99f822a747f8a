//! Roots
//!
//! A root owns one tree: its node arena, the committed (`current`) tree,
//! lane bookkeeping, the render pass in progress and the passive effects
//! waiting to be flushed. Embedders reach it through a [`RootHandle`].
//!
//! # Borrowing
//!
//! All mutable root state sits behind a single `RefCell`. The driver holds
//! the borrow for a whole render slice or commit, and releases it before
//! running user code that may dispatch updates (effects, ref callbacks).
//! An update dispatched while the borrow is held is dropped with a warning,
//! since it can only come from a component body.

mod driver;

pub(crate) use driver::{ensure_root_is_scheduled, mark_update_lane_from_fiber_to_root, schedule_update_on_fiber};

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::element::Child;
use crate::error::ReconcilerError;
use crate::fiber::{create_host_root_fiber, FiberArena, FiberId, FiberUpdateQueue};
use crate::hooks::EffectRecord;
use crate::host::HostNodeId;
use crate::lanes::{Lane, Lanes, RootLanes};
use crate::reconciler::Reconciler;
use crate::scheduler::CallbackHandle;
use crate::thenable::WakeableId;
use crate::update_queue::{enqueue_update, Action, Update};
use crate::work_loop::RenderSession;

/// Effects collected by commits and not yet run.
#[derive(Default)]
pub(crate) struct PendingPassiveEffects {
    /// Effects of deleted components, whose cleanup must run.
    pub unmount: Vec<Rc<EffectRecord>>,
    /// Effect lists of components that rendered with a changed effect.
    pub update: Vec<Rc<[Rc<EffectRecord>]>>,
}

impl PendingPassiveEffects {
    pub fn is_empty(&self) -> bool {
        self.unmount.is_empty() && self.update.is_empty()
    }
}

/// Mutable state of one root.
pub(crate) struct FiberRoot {
    pub id: u32,
    pub container: HostNodeId,
    pub arena: FiberArena,
    /// Root node of the committed tree.
    pub current: FiberId,
    /// Completed tree waiting to be committed.
    pub finished_work: Option<FiberId>,
    pub finished_lane: Lane,
    pub lanes: RootLanes,
    /// Scheduler task rendering this root, if any.
    pub callback_node: Option<CallbackHandle>,
    pub callback_priority: Lane,
    pub pending_passive_effects: PendingPassiveEffects,
    pub passive_flush_scheduled: bool,
    /// Lanes already waiting on each wakeable, so a wakeable is subscribed
    /// to once per lane.
    pub ping_cache: HashMap<WakeableId, Lanes>,
    pub session: RenderSession,
    /// Set while effects and ref callbacks run after a commit.
    pub in_commit_callbacks: bool,
    /// An update was scheduled from commit callbacks.
    pub nested_update_scheduled: bool,
    /// Consecutive sync commits caused by commit callbacks.
    pub nested_update_count: u32,
    pub error: Option<ReconcilerError>,
}

impl FiberRoot {
    fn new(id: u32, container: HostNodeId) -> Self {
        let mut arena = FiberArena::new();
        let current = create_host_root_fiber(&mut arena, container);
        Self {
            id,
            container,
            arena,
            current,
            finished_work: None,
            finished_lane: Lanes::NONE,
            lanes: RootLanes::default(),
            callback_node: None,
            callback_priority: Lanes::NONE,
            pending_passive_effects: PendingPassiveEffects::default(),
            passive_flush_scheduled: false,
            ping_cache: HashMap::new(),
            session: RenderSession::default(),
            in_commit_callbacks: false,
            nested_update_scheduled: false,
            nested_update_count: 0,
            error: None,
        }
    }

    /// Queue `element` as the new top-level child at `lane`.
    fn enqueue_root_render(&mut self, element: Child, lane: Lane) {
        let current = self.current;
        let FiberUpdateQueue::Root(queue) = self.arena[current].update_queue.clone() else {
            return;
        };
        enqueue_update(&queue, Update::new(Action::Value(element), lane), &mut self.arena, current, lane);
        schedule_update_on_fiber(self, current, lane);
    }
}

impl fmt::Debug for FiberRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiberRoot")
            .field("id", &self.id)
            .field("container", &self.container)
            .field("current", &self.current)
            .field("lanes", &self.lanes)
            .field("nodes", &self.arena.len())
            .finish()
    }
}

/// A root plus the reconciler it belongs to.
pub(crate) struct RootCell {
    pub(crate) root: RefCell<FiberRoot>,
    pub(crate) reconciler: Reconciler,
}

impl RootCell {
    pub(crate) fn new(reconciler: Reconciler, id: u32, container: HostNodeId) -> Rc<Self> {
        Rc::new(Self {
            root: RefCell::new(FiberRoot::new(id, container)),
            reconciler,
        })
    }
}

/// Handle to a root created by [`Reconciler::create_root`].
///
/// Cloning the handle does not create a new root.
#[derive(Clone)]
pub struct RootHandle {
    cell: Rc<RootCell>,
}

impl RootHandle {
    pub(crate) fn new(cell: Rc<RootCell>) -> Self {
        Self { cell }
    }

    /// Render `element` into the container at the sync lane.
    ///
    /// The pass runs at the next microtask checkpoint (or the next
    /// [`Reconciler::flush_sync_callbacks`]), so several calls in a row are
    /// batched into one commit of the last element.
    pub fn render(&self, element: impl Into<Child>) {
        self.render_at(element.into(), Lanes::SYNC);
    }

    /// Render `element` at the lane of the current update context: the
    /// transition lane inside [`Reconciler::start_transition`], otherwise the
    /// lane matching the scheduler's current priority.
    pub fn render_deferred(&self, element: impl Into<Child>) {
        let lane = self.cell.reconciler.request_update_lane();
        self.render_at(element.into(), lane);
    }

    fn render_at(&self, element: Child, lane: Lane) {
        {
            let Ok(mut root) = self.cell.root.try_borrow_mut() else {
                warn!("render called while the root is busy");
                return;
            };
            debug!(root = root.id, ?lane, "render requested");
            root.enqueue_root_render(element, lane);
        }
        ensure_root_is_scheduled(&self.cell);
    }

    /// Render nothing. Every mounted component is unmounted and its effect
    /// cleanups run.
    pub fn unmount(&self) {
        self.render(Child::Empty);
    }

    /// Container the root renders into.
    pub fn container(&self) -> HostNodeId {
        self.cell.root.borrow().container
    }

    /// Take the last error reported by a render pass or commit.
    pub fn take_error(&self) -> Option<ReconcilerError> {
        self.cell.root.try_borrow_mut().ok().and_then(|mut root| root.error.take())
    }

    /// Run pending passive effects now instead of waiting for the scheduled
    /// flush. Returns whether anything ran.
    pub fn flush_passive_effects(&self) -> bool {
        crate::commit::flush_passive_effects(&self.cell)
    }

    /// Whether updates are pending or effects are waiting to run.
    pub fn has_pending_work(&self) -> bool {
        let root = self.cell.root.borrow();
        !root.lanes.pending.is_empty() || !root.pending_passive_effects.is_empty()
    }

    /// Lanes with pending updates.
    pub fn pending_lanes(&self) -> Lanes {
        self.cell.root.borrow().lanes.pending
    }

    /// Number of live work nodes, both trees included.
    pub fn fiber_count(&self) -> usize {
        self.cell.root.borrow().arena.len()
    }
}

impl fmt::Debug for RootHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.root.try_borrow() {
            Ok(root) => root.fmt(f),
            Err(_) => f.write_str("FiberRoot(<busy>)"),
        }
    }
}
