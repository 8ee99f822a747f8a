//! Test doubles for driving a reconciler deterministically.
//!
//! [`TestRuntime`] wires a [`MemoryHost`] and a [`TestScheduler`] into a
//! [`Reconciler`] and exposes the handful of operations tests need: run
//! everything, look at the host tree, click a button.

mod memory_host;
mod test_scheduler;

pub use memory_host::{HostOp, MemoryHost};
pub use test_scheduler::{MicrotaskQueue, TestScheduler};

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::ReconcilerConfig;
use crate::host::{HostAdapter, HostNodeId};
use crate::reconciler::Reconciler;
use crate::root::RootHandle;

/// A reconciler over an in-memory host and a manual scheduler.
pub struct TestRuntime {
    pub host: Rc<RefCell<MemoryHost>>,
    pub scheduler: TestScheduler,
    pub reconciler: Reconciler,
}

impl TestRuntime {
    pub fn new() -> Self {
        Self::with_config(ReconcilerConfig::default())
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        let scheduler = TestScheduler::new();
        let host = Rc::new(RefCell::new(MemoryHost::new(scheduler.microtasks())));
        let adapter: Rc<RefCell<dyn HostAdapter>> = host.clone();
        let reconciler = Reconciler::with_config(adapter, Rc::new(scheduler.clone()), config);
        Self {
            host,
            scheduler,
            reconciler,
        }
    }

    /// A root rendering into a fresh container.
    pub fn create_root(&self) -> RootHandle {
        let container = self.host.borrow_mut().create_container();
        self.reconciler.create_root(container)
    }

    /// Drain microtasks and scheduler tasks until nothing is left.
    pub fn run_until_idle(&self) -> usize {
        self.scheduler.run_until_idle()
    }

    /// Run pending microtasks only: sync renders happen, scheduled tasks
    /// (concurrent renders, passive effects) stay queued.
    pub fn flush_microtasks(&self) -> usize {
        self.scheduler.flush_microtasks()
    }

    /// Visible markup rendered by `root`.
    pub fn dump(&self, root: &RootHandle) -> String {
        self.host.borrow().dump(root.container())
    }

    /// Markup rendered by `root`, hidden nodes included.
    pub fn dump_all(&self, root: &RootHandle) -> String {
        self.host.borrow().dump_all(root.container())
    }

    pub fn take_ops(&self) -> Vec<HostOp> {
        self.host.borrow_mut().take_ops()
    }

    pub fn clear_ops(&self) {
        self.host.borrow_mut().clear_ops();
    }

    /// Find the element with attribute `id` below `root`.
    pub fn find(&self, root: &RootHandle, id: &str) -> Option<HostNodeId> {
        self.host.borrow().find_by_id(root.container(), id)
    }

    /// Invoke the `on_click` callback of the element with attribute `id`,
    /// outside any scheduler task, like a discrete host event. Returns
    /// whether a handler was found.
    pub fn click(&self, root: &RootHandle, id: &str) -> bool {
        self.fire(root, id, "on_click")
    }

    /// Invoke the callback attribute `event` of the element with attribute
    /// `id`.
    pub fn fire(&self, root: &RootHandle, id: &str, event: &str) -> bool {
        let callback = {
            let host = self.host.borrow();
            host.find_by_id(root.container(), id)
                .and_then(|node| host.callback(node, event))
        };
        match callback {
            Some(callback) => {
                callback.call();
                true
            }
            None => false,
        }
    }
}

impl Default for TestRuntime {
    fn default() -> Self {
        Self::new()
    }
}
