#![forbid(unsafe_code)]

//! Deterministic task executor for tests.
//!
//! [`ManualExecutor`] queues submitted tasks instead of running them. A test
//! decides which task runs next, so any completion order of concurrent
//! writes and reloads can be reproduced exactly.
//!
//! ```ignore
//! let mut program = Program::new(engine, ManualExecutor::new());
//! program.complete_drag();
//! program.executor_mut().run_named("replace_order:l2"); // finishes first
//! program.executor_mut().run_named("update_item:a");
//! program.poll();
//! ```

use std::collections::VecDeque;

use web_time::Duration;

use crate::program::{TaskExecutor, TaskFn, TaskSpec};

struct Queued<M> {
    name: String,
    task: TaskFn<M>,
}

/// Runs tasks only when told to.
pub struct ManualExecutor<M> {
    pending: VecDeque<Queued<M>>,
    completed: Vec<M>,
    submitted: Vec<String>,
}

impl<M> Default for ManualExecutor<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ManualExecutor<M> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            completed: Vec::new(),
            submitted: Vec::new(),
        }
    }

    /// Names of queued tasks, in submission order.
    #[must_use]
    pub fn pending_names(&self) -> Vec<&str> {
        self.pending.iter().map(|q| q.name.as_str()).collect()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Every task name ever submitted.
    #[must_use]
    pub fn submitted(&self) -> &[String] {
        &self.submitted
    }

    /// Run the oldest queued task. Returns its name.
    pub fn run_next(&mut self) -> Option<String> {
        let queued = self.pending.pop_front()?;
        Some(self.run(queued))
    }

    /// Run the oldest queued task called `name`. Returns `false` if none is queued.
    pub fn run_named(&mut self, name: &str) -> bool {
        let Some(index) = self.pending.iter().position(|q| q.name == name) else {
            return false;
        };
        match self.pending.remove(index) {
            Some(queued) => {
                self.run(queued);
                true
            }
            None => false,
        }
    }

    /// Run every queued task in submission order.
    pub fn run_all(&mut self) -> usize {
        let mut ran = 0;
        while self.run_next().is_some() {
            ran += 1;
        }
        ran
    }

    fn run(&mut self, queued: Queued<M>) -> String {
        let Queued { name, task } = queued;
        tracing::trace!(target: "ordo.effect", task = %name, "simulated task run");
        self.completed.push(task());
        name
    }
}

impl<M> TaskExecutor<M> for ManualExecutor<M> {
    fn submit(&mut self, spec: TaskSpec, task: TaskFn<M>) {
        let name = spec.name_or("task").to_owned();
        self.submitted.push(name.clone());
        self.pending.push_back(Queued { name, task });
    }

    fn drain_completed(&mut self) -> Vec<M> {
        std::mem::take(&mut self.completed)
    }

    /// Runs the oldest queued task when nothing has completed yet.
    fn wait_one(&mut self, _timeout: Duration) -> Option<M> {
        if self.completed.is_empty() {
            self.run_next();
        }
        if self.completed.is_empty() {
            None
        } else {
            Some(self.completed.remove(0))
        }
    }

    fn in_flight(&self) -> usize {
        self.pending.len() + self.completed.len()
    }
}
