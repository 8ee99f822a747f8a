//! Manual, deterministic scheduler.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::{trace, warn};

use crate::host::Microtask;
use crate::scheduler::{CallbackHandle, Priority, Scheduler, SchedulerTask};

/// Tasks run by [`TestScheduler::run_until_idle`] before it gives up.
const MAX_TASKS_PER_RUN: usize = 10_000;

/// Microtask queue shared by a [`TestScheduler`] and a host double.
#[derive(Clone, Default)]
pub struct MicrotaskQueue {
    queue: Rc<RefCell<VecDeque<Microtask>>>,
}

impl MicrotaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: Microtask) {
        self.queue.borrow_mut().push_back(task);
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Run microtasks until the queue is empty, including the ones queued
    /// by running microtasks. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(task) = next else {
                return ran;
            };
            task();
            ran += 1;
        }
    }
}

struct QueuedTask {
    handle: CallbackHandle,
    priority: Priority,
    task: SchedulerTask,
}

#[derive(Default)]
struct State {
    /// Kept sorted by priority, then by insertion.
    queue: Vec<QueuedTask>,
    next_handle: u64,
}

struct Inner {
    state: RefCell<State>,
    microtasks: MicrotaskQueue,
    current_priority: Cell<Priority>,
    running: Cell<Option<CallbackHandle>>,
    running_cancelled: Cell<bool>,
    yield_after: Cell<Option<usize>>,
    polls: Cell<usize>,
}

/// A [`Scheduler`] driven by hand from tests.
///
/// Nothing runs until the test calls [`run_next_task`](Self::run_next_task),
/// [`run_until_idle`](Self::run_until_idle) or
/// [`flush_microtasks`](Self::flush_microtasks). Microtasks always drain
/// before and after each task. Continuations keep their handle and their
/// place in the queue.
#[derive(Clone)]
pub struct TestScheduler {
    inner: Rc<Inner>,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                state: RefCell::new(State::default()),
                microtasks: MicrotaskQueue::new(),
                current_priority: Cell::new(Priority::Normal),
                running: Cell::new(None),
                running_cancelled: Cell::new(false),
                yield_after: Cell::new(None),
                polls: Cell::new(0),
            }),
        }
    }

    /// The microtask queue, to hand to a host double.
    pub fn microtasks(&self) -> MicrotaskQueue {
        self.inner.microtasks.clone()
    }

    /// Ask running tasks to yield after `units` polls of
    /// [`Scheduler::should_yield`]. `None` never yields.
    pub fn set_yield_after(&self, units: Option<usize>) {
        self.inner.yield_after.set(units.map(|units| units.max(1)));
    }

    pub fn pending_tasks(&self) -> usize {
        self.inner.state.borrow().queue.len()
    }

    /// Priority of every queued task, in run order.
    pub fn queued_priorities(&self) -> Vec<Priority> {
        self.inner.state.borrow().queue.iter().map(|task| task.priority).collect()
    }

    pub fn flush_microtasks(&self) -> usize {
        self.inner.microtasks.run_all()
    }

    /// Run the most urgent task once. Returns `false` when nothing was
    /// queued.
    pub fn run_next_task(&self) -> bool {
        self.run_next(false)
    }

    /// Run the most urgent task once, telling it its deadline passed.
    pub fn expire_next_task(&self) -> bool {
        self.run_next(true)
    }

    fn run_next(&self, did_timeout: bool) -> bool {
        self.flush_microtasks();

        let next = {
            let mut state = self.inner.state.borrow_mut();
            if state.queue.is_empty() {
                None
            } else {
                Some(state.queue.remove(0))
            }
        };
        let Some(QueuedTask { handle, priority, task }) = next else {
            return false;
        };

        trace!(?handle, ?priority, did_timeout, "running task");
        let previous = self.inner.current_priority.replace(priority);
        self.inner.running.set(Some(handle));
        self.inner.running_cancelled.set(false);
        self.inner.polls.set(0);

        let continuation = task.run(did_timeout);

        self.inner.running.set(None);
        self.inner.current_priority.set(previous);

        if let Some(task) = continuation {
            if !self.inner.running_cancelled.get() {
                self.insert(QueuedTask { handle, priority, task }, true);
            }
        }

        self.flush_microtasks();
        true
    }

    /// Run tasks and microtasks until none are left. Returns the number of
    /// tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        self.flush_microtasks();
        while self.run_next_task() {
            ran += 1;
            if ran >= MAX_TASKS_PER_RUN {
                warn!(ran, "scheduler still busy, giving up");
                break;
            }
        }
        ran
    }

    fn insert(&self, task: QueuedTask, at_front: bool) {
        let mut state = self.inner.state.borrow_mut();
        let position = if at_front {
            state.queue.iter().position(|queued| queued.priority >= task.priority)
        } else {
            state.queue.iter().position(|queued| queued.priority > task.priority)
        };
        let position = position.unwrap_or(state.queue.len());
        state.queue.insert(position, task);
    }
}

impl Default for TestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TestScheduler {
    fn schedule(&self, priority: Priority, task: SchedulerTask) -> CallbackHandle {
        let handle = {
            let mut state = self.inner.state.borrow_mut();
            state.next_handle += 1;
            CallbackHandle::new(state.next_handle)
        };
        self.insert(QueuedTask { handle, priority, task }, false);
        handle
    }

    fn cancel(&self, handle: CallbackHandle) {
        if self.inner.running.get() == Some(handle) {
            self.inner.running_cancelled.set(true);
        }
        self.inner.state.borrow_mut().queue.retain(|task| task.handle != handle);
    }

    fn should_yield(&self) -> bool {
        let Some(limit) = self.inner.yield_after.get() else {
            return false;
        };
        let polls = self.inner.polls.get() + 1;
        self.inner.polls.set(polls);
        polls > limit
    }

    fn current_priority(&self) -> Priority {
        self.inner.current_priority.get()
    }

    fn run_with_priority(&self, priority: Priority, f: &mut dyn FnMut()) {
        let previous = self.inner.current_priority.replace(priority);
        f();
        self.inner.current_priority.set(previous);
    }

    fn first_pending_callback(&self) -> Option<CallbackHandle> {
        self.inner.state.borrow().queue.first().map(|task| task.handle)
    }
}
