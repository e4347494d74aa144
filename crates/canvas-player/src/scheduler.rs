//! Single-timeline task queue.
//!
//! Work that must observe settled state (wrapper resize after `load`, audio
//! unlock completion) is deferred here and runs on the next turn, after the
//! current synchronous phase has returned.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// Cloneable handle to a FIFO of deferred tasks.
#[derive(Clone, Default)]
pub struct Scheduler {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` to run on a later turn.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run the tasks that were queued before this call.
    ///
    /// Tasks queued while the turn runs wait for the next turn.
    pub fn run_turn(&self) -> usize {
        let batch: Vec<Task> = self.queue.borrow_mut().drain(..).collect();
        let ran = batch.len();
        for task in batch {
            task();
        }
        ran
    }

    /// Run turns until the queue is empty. Returns the number of tasks run.
    pub fn run_until_idle(&self) -> usize {
        let mut total = 0;
        loop {
            let ran = self.run_turn();
            if ran == 0 {
                return total;
            }
            total += ran;
        }
    }
}
