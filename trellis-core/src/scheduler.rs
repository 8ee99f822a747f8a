//! Cooperative Scheduler Interface
//!
//! The reconciler never runs its own event loop. Concurrent render passes
//! and deferred passive-effect flushes are handed to an external
//! cooperative scheduler through the [`Scheduler`] trait.
//!
//! A scheduled task may return a continuation. The scheduler must keep the
//! task under the same handle and run the continuation again later at the
//! same priority instead of treating the task as finished.

use std::fmt;

/// Scheduler priority levels, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Immediate,
    UserBlocking,
    Normal,
    Low,
    Idle,
}

/// Identity of a scheduled task.
///
/// The reconciler compares handles to detect that a task it is running has
/// been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackHandle(u64);

impl CallbackHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

/// A unit of schedulable work.
///
/// The argument tells the task whether its deadline already passed. A task
/// that still has work left returns the continuation to run next.
pub struct SchedulerTask {
    run: Box<dyn FnOnce(bool) -> Option<SchedulerTask>>,
}

impl SchedulerTask {
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce(bool) -> Option<SchedulerTask> + 'static,
    {
        Self { run: Box::new(run) }
    }

    /// Run the task once.
    pub fn run(self, did_timeout: bool) -> Option<SchedulerTask> {
        (self.run)(did_timeout)
    }
}

impl fmt::Debug for SchedulerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SchedulerTask")
    }
}

/// External cooperative scheduler.
///
/// All methods take `&self`: implementations are expected to use interior
/// mutability, since tasks schedule and cancel other tasks while running.
pub trait Scheduler {
    /// Queue `task` at `priority`.
    fn schedule(&self, priority: Priority, task: SchedulerTask) -> CallbackHandle;

    /// Drop a queued task. Cancelling a finished or unknown task is a no-op.
    fn cancel(&self, handle: CallbackHandle);

    /// Cooperative yield signal, polled between units of render work.
    fn should_yield(&self) -> bool;

    /// Priority of the task currently running, or the ambient default.
    fn current_priority(&self) -> Priority;

    /// Run `f` with the current priority temporarily set to `priority`.
    fn run_with_priority(&self, priority: Priority, f: &mut dyn FnMut());

    /// Handle of the next task the scheduler would run.
    fn first_pending_callback(&self) -> Option<CallbackHandle>;
}
