use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::platform::RuntimeScheduler;

/// Identity of a deferred task queued on a [`Runtime`].
pub type TaskId = u64;

type Task = Box<dyn FnOnce() + 'static>;

struct PendingTask {
    id: TaskId,
    task: Option<Task>,
}

struct RuntimeInner {
    scheduler: Arc<dyn RuntimeScheduler>,
    needs_frame: Cell<bool>,
    pending_tasks: RefCell<VecDeque<PendingTask>>, // FUTURE(no_std): replace VecDeque with ring buffer.
    next_task_id: Cell<TaskId>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            scheduler,
            needs_frame: Cell::new(false),
            pending_tasks: RefCell::new(VecDeque::new()),
            next_task_id: Cell::new(1),
        }
    }

    fn schedule(&self) {
        self.needs_frame.set(true);
        self.scheduler.schedule_frame();
    }

    fn enqueue_task(&self, task: Task) -> TaskId {
        let id = self.next_task_id.get();
        self.next_task_id.set(id + 1);
        self.pending_tasks.borrow_mut().push_back(PendingTask {
            id,
            task: Some(task),
        });
        self.schedule();
        id
    }

    fn cancel_task(&self, id: TaskId) -> bool {
        let mut pending = self.pending_tasks.borrow_mut();
        let Some(index) = pending.iter().position(|entry| entry.id == id) else {
            return false;
        };
        pending.remove(index);
        if pending.is_empty() {
            self.needs_frame.set(false);
        }
        true
    }

    fn is_pending(&self, id: TaskId) -> bool {
        self.pending_tasks
            .borrow()
            .iter()
            .any(|entry| entry.id == id)
    }

    // Tasks queued while draining belong to the next turn.
    fn drain_tasks(&self) -> usize {
        let tasks: Vec<PendingTask> = {
            let mut pending = self.pending_tasks.borrow_mut();
            pending.drain(..).collect()
        };
        let mut ran = 0;
        for mut entry in tasks {
            if let Some(task) = entry.task.take() {
                log::trace!("running deferred task {}", entry.id);
                task();
                ran += 1;
            }
        }
        if !self.has_tasks() {
            self.needs_frame.set(false);
        }
        ran
    }

    fn has_tasks(&self) -> bool {
        !self.pending_tasks.borrow().is_empty()
    }
}

/// Single-threaded owner of the deferred task queue.
///
/// All element work runs synchronously inside a host commit. Work that must
/// wait for the commit (and the peer library's own update pass) to finish is
/// queued here and runs when the host calls [`Runtime::flush`].
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>, // FUTURE(no_std): replace Rc with arena-managed runtime storage.
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RuntimeScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    pub fn needs_frame(&self) -> bool {
        self.inner.needs_frame.get()
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.inner.has_tasks()
    }

    /// Run one scheduler turn, returning how many tasks executed.
    pub fn flush(&self) -> usize {
        self.inner.drain_tasks()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(DefaultScheduler))
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("needs_frame", &self.inner.needs_frame.get())
            .field("pending_tasks", &self.inner.pending_tasks.borrow().len())
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct DefaultScheduler;

impl RuntimeScheduler for DefaultScheduler {
    fn schedule_frame(&self) {}
}

#[cfg(test)]
#[derive(Default)]
pub struct TestScheduler;

#[cfg(test)]
impl RuntimeScheduler for TestScheduler {
    fn schedule_frame(&self) {}
}

#[cfg(test)]
pub struct TestRuntime {
    runtime: Runtime,
}

#[cfg(test)]
impl TestRuntime {
    pub fn new() -> Self {
        Self {
            runtime: Runtime::new(Arc::new(TestScheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn flush(&self) -> usize {
        self.runtime.flush()
    }
}

/// Weak reference to a [`Runtime`], held by elements and deferred slots.
#[derive(Clone)]
pub struct RuntimeHandle(pub(crate) Weak<RuntimeInner>);

impl RuntimeHandle {
    pub fn schedule(&self) {
        if let Some(inner) = self.0.upgrade() {
            inner.schedule();
        }
    }

    /// Queue `task` for the next scheduler turn.
    ///
    /// Returns `None` when the runtime is gone; the task is dropped unrun since
    /// there is no turn left for it to run in.
    pub fn spawn_task(&self, task: Box<dyn FnOnce() + 'static>) -> Option<TaskId> {
        match self.0.upgrade() {
            Some(inner) => Some(inner.enqueue_task(task)),
            None => {
                log::trace!("runtime dropped; discarding deferred task");
                None
            }
        }
    }

    pub fn cancel_task(&self, id: TaskId) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.cancel_task(id))
            .unwrap_or(false)
    }

    pub fn is_pending(&self, id: TaskId) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.is_pending(id))
            .unwrap_or(false)
    }

    pub fn drain_tasks(&self) -> usize {
        self.0
            .upgrade()
            .map(|inner| inner.drain_tasks())
            .unwrap_or(0)
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_tasks())
            .unwrap_or(false)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RuntimeHandle")
            .field(&self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_run_in_fifo_order_on_flush() {
        let runtime = TestRuntime::new();
        let handle = runtime.handle();
        let log = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let log = Rc::clone(&log);
            handle.spawn_task(Box::new(move || log.borrow_mut().push(n)));
        }
        assert!(log.borrow().is_empty(), "tasks must not run synchronously");
        assert_eq!(runtime.flush(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(!handle.has_pending_tasks());
    }

    #[test]
    fn task_queued_during_flush_runs_next_turn() {
        let runtime = TestRuntime::new();
        let handle = runtime.handle();
        let hits = Rc::new(Cell::new(0));
        let inner_handle = handle.clone();
        let inner_hits = Rc::clone(&hits);
        handle.spawn_task(Box::new(move || {
            let hits = Rc::clone(&inner_hits);
            inner_handle.spawn_task(Box::new(move || hits.set(hits.get() + 1)));
        }));

        assert_eq!(runtime.flush(), 1);
        assert_eq!(hits.get(), 0);
        assert!(handle.has_pending_tasks());
        assert_eq!(runtime.flush(), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn cancelled_task_never_runs() {
        let runtime = TestRuntime::new();
        let handle = runtime.handle();
        let hits = Rc::new(Cell::new(0));
        let task_hits = Rc::clone(&hits);
        let id = handle
            .spawn_task(Box::new(move || task_hits.set(1)))
            .expect("runtime alive");
        assert!(handle.is_pending(id));
        assert!(handle.cancel_task(id));
        assert!(!handle.is_pending(id));
        assert_eq!(runtime.flush(), 0);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn spawn_on_dropped_runtime_discards_task() {
        let handle = TestRuntime::new().handle();
        let hits = Rc::new(Cell::new(0));
        let task_hits = Rc::clone(&hits);
        assert!(handle
            .spawn_task(Box::new(move || task_hits.set(1)))
            .is_none());
        assert_eq!(hits.get(), 0);
        assert!(!handle.is_alive());
    }
}
