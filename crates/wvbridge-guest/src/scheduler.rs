//! Cooperative FIFO task queue (the guest's "next turn").

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use wvbridge_core::error::{BridgeError, Result};

type Task = Box<dyn FnOnce() -> Result<()>>;

/// Deferred work for one guest runtime. Cloning shares the queue.
#[derive(Clone, Default)]
pub struct TaskQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` to run after everything already queued.
    pub fn defer(&self, task: impl FnOnce() -> Result<()> + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }

    /// Run tasks in FIFO order until none remain, including tasks deferred
    /// by tasks. A failing task does not stop the queue; its error is
    /// returned with the others.
    pub fn run_until_idle(&self) -> Vec<BridgeError> {
        let mut faults = Vec::new();
        loop {
            // Borrow ends before the task runs; tasks may defer more work.
            let next = self.tasks.borrow_mut().pop_front();
            let Some(task) = next else { break };
            if let Err(e) = task() {
                faults.push(e);
            }
        }
        faults
    }
}
