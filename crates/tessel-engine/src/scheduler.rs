//! Root render scheduler
//!
//! Root data changes queue at most one render microtask per tick. Network
//! work runs as tasks on a single-threaded executor. Nothing runs until the
//! embedder drives the loop with [`Scheduler::run_until_idle`].

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;

use smol::LocalExecutor;
use tracing::{error, trace};

/// Upper bound on drain rounds before giving up on a runaway render loop
const MAX_ROUNDS: usize = 10_000;

type Microtask = Box<dyn FnOnce()>;

pub(crate) struct Scheduler {
    executor: LocalExecutor<'static>,
    microtasks: RefCell<VecDeque<Microtask>>,
    render_scheduled: Cell<bool>,
    refresh_components: Cell<bool>,
    renders: Cell<u64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            executor: LocalExecutor::new(),
            microtasks: RefCell::new(VecDeque::new()),
            render_scheduled: Cell::new(false),
            refresh_components: Cell::new(false),
            renders: Cell::new(0),
        }
    }

    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.microtasks.borrow_mut().push_back(Box::new(task));
    }

    /// Queue `render` unless a render is already pending. Returns true if queued.
    pub fn schedule_render(&self, render: impl FnOnce() + 'static) -> bool {
        if self.render_scheduled.replace(true) {
            return false;
        }
        trace!("root render scheduled");
        self.queue_microtask(render);
        true
    }

    /// Clear the pending flag as the render starts
    pub fn begin_render(&self) {
        self.render_scheduled.set(false);
        self.renders.set(self.renders.get() + 1);
    }

    pub fn is_render_scheduled(&self) -> bool {
        self.render_scheduled.get()
    }

    /// Number of root renders started so far
    pub fn render_count(&self) -> u64 {
        self.renders.get()
    }

    pub fn request_component_refresh(&self) {
        self.refresh_components.set(true);
    }

    pub fn take_component_refresh(&self) -> bool {
        self.refresh_components.replace(false)
    }

    pub fn spawn(&self, future: impl Future<Output = ()> + 'static) {
        self.executor.spawn(future).detach();
    }

    /// Drain microtasks and poll tasks until neither makes progress
    pub fn run_until_idle(&self) {
        for _ in 0..MAX_ROUNDS {
            let mut progressed = false;
            loop {
                let next = self.microtasks.borrow_mut().pop_front();
                let Some(task) = next else {
                    break;
                };
                task();
                progressed = true;
            }
            while self.executor.try_tick() {
                progressed = true;
            }
            if !progressed {
                return;
            }
        }
        error!(rounds = MAX_ROUNDS, "scheduler did not settle; a render keeps scheduling another");
    }

    pub fn pending_microtasks(&self) -> usize {
        self.microtasks.borrow().len()
    }

    /// Drop queued microtasks (teardown)
    pub fn clear(&self) {
        self.microtasks.borrow_mut().clear();
        self.render_scheduled.set(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_schedule_render_once_per_tick() {
        let scheduler = Rc::new(Scheduler::new());
        let count = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let c = count.clone();
            let s = scheduler.clone();
            scheduler.schedule_render(move || {
                s.begin_render();
                c.set(c.get() + 1);
            });
        }
        assert_eq!(scheduler.pending_microtasks(), 1);
        scheduler.run_until_idle();
        assert_eq!(count.get(), 1);
        assert!(!scheduler.is_render_scheduled());
        assert_eq!(scheduler.render_count(), 1);
    }

    #[test]
    fn test_tasks_and_microtasks_interleave() {
        let scheduler = Rc::new(Scheduler::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        let s = scheduler.clone();
        scheduler.spawn(async move {
            l.borrow_mut().push("task");
            let l2 = l.clone();
            s.queue_microtask(move || l2.borrow_mut().push("microtask"));
        });
        scheduler.run_until_idle();
        assert_eq!(*log.borrow(), vec!["task", "microtask"]);
    }
}
