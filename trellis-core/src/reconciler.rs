//! Reconciler Facade
//!
//! A [`Reconciler`] bundles what every root of one host shares: the host
//! adapter, the external scheduler, configuration, the queue of pending
//! synchronous renders and the transition flag. Roots are created from it
//! and keep a clone.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::element::{h, text};
//! use trellis_core::testing::TestRuntime;
//!
//! let rt = TestRuntime::new();
//! let root = rt.create_root();
//! root.render(h("p").child(text("hello")));
//! rt.run_until_idle();
//! assert_eq!(rt.dump(&root), "<p>hello</p>");
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::config::ReconcilerConfig;
use crate::host::{HostAdapter, HostNodeId};
use crate::lanes::{Lane, Lanes};
use crate::root::{RootCell, RootHandle};
use crate::scheduler::Scheduler;

type SyncCallback = Box<dyn FnOnce()>;

struct Shared {
    host: Rc<RefCell<dyn HostAdapter>>,
    scheduler: Rc<dyn Scheduler>,
    config: ReconcilerConfig,
    sync_queue: RefCell<Vec<SyncCallback>>,
    sync_flush_scheduled: Cell<bool>,
    flushing_sync: Cell<bool>,
    in_transition: Cell<bool>,
    next_root_id: Cell<u32>,
}

/// Shared context of a set of roots rendering into one host.
#[derive(Clone)]
pub struct Reconciler {
    shared: Rc<Shared>,
}

impl Reconciler {
    pub fn new(host: Rc<RefCell<dyn HostAdapter>>, scheduler: Rc<dyn Scheduler>) -> Self {
        Self::with_config(host, scheduler, ReconcilerConfig::default())
    }

    pub fn with_config(
        host: Rc<RefCell<dyn HostAdapter>>,
        scheduler: Rc<dyn Scheduler>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                host,
                scheduler,
                config,
                sync_queue: RefCell::new(Vec::new()),
                sync_flush_scheduled: Cell::new(false),
                flushing_sync: Cell::new(false),
                in_transition: Cell::new(false),
                next_root_id: Cell::new(0),
            }),
        }
    }

    /// Create a root rendering into `container`.
    pub fn create_root(&self, container: HostNodeId) -> RootHandle {
        let id = self.shared.next_root_id.get();
        self.shared.next_root_id.set(id + 1);
        debug!(root = id, ?container, "root created");
        RootHandle::new(RootCell::new(self.clone(), id, container))
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.shared.config
    }

    pub(crate) fn host(&self) -> &Rc<RefCell<dyn HostAdapter>> {
        &self.shared.host
    }

    pub(crate) fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.shared.scheduler
    }

    /// Lane for an update dispatched right now.
    pub(crate) fn request_update_lane(&self) -> Lane {
        if self.shared.in_transition.get() {
            return Lanes::TRANSITION;
        }
        Lanes::from_priority(self.shared.scheduler.current_priority())
    }

    pub(crate) fn enter_transition(&self) -> bool {
        self.shared.in_transition.replace(true)
    }

    pub(crate) fn exit_transition(&self, previous: bool) {
        self.shared.in_transition.set(previous);
    }

    /// Run `scope` so that every update it dispatches (and every
    /// [`RootHandle::render_deferred`]) gets the transition lane.
    pub fn start_transition<F: FnOnce()>(&self, scope: F) {
        let previous = self.enter_transition();
        scope();
        self.exit_transition(previous);
    }

    /// Queue a synchronous render. The queue drains at the next host
    /// microtask.
    pub(crate) fn schedule_sync_callback(&self, callback: SyncCallback) {
        self.shared.sync_queue.borrow_mut().push(callback);
        if self.shared.sync_flush_scheduled.replace(true) {
            return;
        }

        let weak: Weak<Shared> = Rc::downgrade(&self.shared);
        self.shared.host.borrow_mut().schedule_microtask(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                Reconciler { shared }.flush_sync_callbacks();
            }
        }));
    }

    /// Run every queued synchronous render now, including the ones queued
    /// while draining. Reentrant calls return immediately.
    pub fn flush_sync_callbacks(&self) {
        if self.shared.flushing_sync.replace(true) {
            return;
        }
        self.shared.sync_flush_scheduled.set(false);

        loop {
            let batch = std::mem::take(&mut *self.shared.sync_queue.borrow_mut());
            if batch.is_empty() {
                break;
            }
            trace!(callbacks = batch.len(), "flushing sync callbacks");
            for callback in batch {
                callback();
            }
        }

        self.shared.flushing_sync.set(false);
    }

    /// Whether synchronous renders are queued.
    pub fn has_pending_sync_work(&self) -> bool {
        !self.shared.sync_queue.borrow().is_empty()
    }
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.shared.config)
            .field("pending_sync", &self.shared.sync_queue.borrow().len())
            .finish()
    }
}
