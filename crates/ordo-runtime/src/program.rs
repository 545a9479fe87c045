#![forbid(unsafe_code)]

//! Elm-style command model and the program driver.
//!
//! The engine never performs I/O itself. Host operations and completion
//! messages return a [`Cmd`]; the [`Program`] interprets it, handing
//! [`Cmd::Task`] closures to a [`TaskExecutor`] and feeding each task's
//! result message back into [`ReorderEngine::update`] on the caller's thread.
//! The store is therefore only ever touched by the thread that owns the
//! program, while any number of remote calls are in flight.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use ordo_runtime::{EngineConfig, MemoryBackend, Program, ReorderEngine, StaticContext};
//!
//! let backend = Arc::new(MemoryBackend::new(seed_entries()));
//! let engine = ReorderEngine::new(backend, Arc::new(StaticContext::tenant("acme")), EngineConfig::default());
//! let mut program = Program::threaded(engine);
//! program.init();
//! program.settle(Duration::from_secs(1));
//!
//! program.begin_drag("card-3".into());
//! program.update_drag_target("todo".into(), Some("card-1".into()));
//! program.complete_drag();      // store updated now, writes in flight
//! program.poll();               // later, on the UI tick
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};

use ordo_core::{ContainerId, ItemId, Position};
use web_time::{Duration, Instant};

use crate::backend::OrderingBackend;
use crate::engine::{EngineMsg, ReorderEngine};

/// A deferred unit of work producing a message.
pub type TaskFn<M> = Box<dyn FnOnce() -> M + Send + 'static>;

/// Metadata attached to a background task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSpec {
    /// Name used for thread names, logs, and simulator lookup.
    pub name: Option<String>,
}

impl TaskSpec {
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(fallback)
    }
}

/// Side effects requested by the engine.
pub enum Cmd<M> {
    /// No operation.
    None,
    /// Execute multiple commands; tasks among them run concurrently.
    Batch(Vec<Cmd<M>>),
    /// Deliver a message back to the engine immediately.
    Msg(M),
    /// Run a closure off the UI thread and deliver its result.
    Task(TaskSpec, TaskFn<M>),
}

impl<M> Cmd<M> {
    #[inline]
    pub fn none() -> Self {
        Self::None
    }

    #[inline]
    pub fn msg(m: M) -> Self {
        Self::Msg(m)
    }

    /// Create a batch of commands.
    pub fn batch(cmds: Vec<Self>) -> Self {
        let mut cmds: Vec<Self> = cmds.into_iter().filter(|c| !c.is_none()).collect();
        match cmds.len() {
            0 => Self::None,
            1 => cmds.pop().unwrap_or(Self::None),
            _ => Self::Batch(cmds),
        }
    }

    /// Create an unnamed background task.
    pub fn task<F>(f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(TaskSpec::default(), Box::new(f))
    }

    /// Create a background task with metadata.
    pub fn task_with_spec<F>(spec: TaskSpec, f: F) -> Self
    where
        F: FnOnce() -> M + Send + 'static,
    {
        Self::Task(spec, Box::new(f))
    }

    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Number of background tasks this command would start.
    #[must_use]
    pub fn task_count(&self) -> usize {
        match self {
            Self::None | Self::Msg(_) => 0,
            Self::Task(..) => 1,
            Self::Batch(cmds) => cmds.iter().map(Self::task_count).sum(),
        }
    }

    /// Names of the background tasks, in submission order.
    #[must_use]
    pub fn task_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        match self {
            Self::None | Self::Msg(_) => {}
            Self::Task(spec, _) => out.push(spec.name_or("task").to_owned()),
            Self::Batch(cmds) => cmds.iter().for_each(|c| c.collect_names(out)),
        }
    }
}

impl<M> Default for Cmd<M> {
    fn default() -> Self {
        Self::None
    }
}

impl<M: fmt::Debug> fmt::Debug for Cmd<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
            Self::Msg(m) => f.debug_tuple("Msg").field(m).finish(),
            Self::Task(spec, _) => f.debug_tuple("Task").field(spec).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// Executors
// ---------------------------------------------------------------------------

/// Runs background tasks and hands back their results.
pub trait TaskExecutor<M> {
    /// Start (or queue) a task.
    fn submit(&mut self, spec: TaskSpec, task: TaskFn<M>);

    /// Results that are ready now, without blocking.
    fn drain_completed(&mut self) -> Vec<M>;

    /// Block for at most `timeout` waiting for one more result.
    fn wait_one(&mut self, timeout: Duration) -> Option<M>;

    /// Tasks submitted whose results have not been drained yet.
    fn in_flight(&self) -> usize;
}

/// Runs every task on its own thread.
///
/// A task that panics is logged and counted as finished without a result.
pub struct ThreadExecutor<M> {
    tx: Sender<Option<M>>,
    rx: Receiver<Option<M>>,
    inline: Vec<M>,
    in_flight: usize,
}

impl<M> Default for ThreadExecutor<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ThreadExecutor<M> {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            tx,
            rx,
            inline: Vec::new(),
            in_flight: 0,
        }
    }
}

impl<M: Send + 'static> TaskExecutor<M> for ThreadExecutor<M> {
    fn submit(&mut self, spec: TaskSpec, task: TaskFn<M>) {
        let name = spec.name_or("ordo-task").to_owned();
        let slot = Arc::new(Mutex::new(Some(task)));
        let thread_slot = Arc::clone(&slot);
        let tx = self.tx.clone();

        let spawned = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let task = thread_slot.lock().unwrap_or_else(|e| e.into_inner()).take();
                if let Some(task) = task {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(task)).ok();
                    if outcome.is_none() {
                        tracing::error!(target: "ordo.effect", "task panicked without a result");
                    }
                    let _ = tx.send(outcome);
                }
            });

        self.in_flight += 1;
        if let Err(err) = spawned {
            tracing::warn!(
                target: "ordo.effect",
                task = %name,
                error = %err,
                "thread spawn failed, running task inline"
            );
            let task = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
            match task.map(|task| panic::catch_unwind(AssertUnwindSafe(task))) {
                Some(Ok(m)) => self.inline.push(m),
                _ => self.in_flight = self.in_flight.saturating_sub(1),
            }
        }
    }

    fn drain_completed(&mut self) -> Vec<M> {
        let mut out: Vec<M> = self.inline.drain(..).collect();
        let mut finished = out.len();
        for outcome in self.rx.try_iter() {
            finished += 1;
            out.extend(outcome);
        }
        self.in_flight = self.in_flight.saturating_sub(finished);
        out
    }

    fn wait_one(&mut self, timeout: Duration) -> Option<M> {
        if let Some(m) = self.inline.pop() {
            self.in_flight = self.in_flight.saturating_sub(1);
            return Some(m);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                outcome
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    fn in_flight(&self) -> usize {
        self.in_flight
    }
}

// ---------------------------------------------------------------------------
// Program
// ---------------------------------------------------------------------------

/// Drives a [`ReorderEngine`] with a task executor.
///
/// Host operations mirror the engine's; the ones that can produce effects
/// dispatch them immediately.
pub struct Program<B: OrderingBackend, E> {
    engine: ReorderEngine<B>,
    executor: E,
}

impl<B: OrderingBackend> Program<B, ThreadExecutor<EngineMsg<B::Payload>>> {
    /// A program running remote calls on background threads.
    #[must_use]
    pub fn threaded(engine: ReorderEngine<B>) -> Self {
        Self::new(engine, ThreadExecutor::new())
    }
}

impl<B, E> Program<B, E>
where
    B: OrderingBackend,
    E: TaskExecutor<EngineMsg<B::Payload>>,
{
    #[must_use]
    pub fn new(engine: ReorderEngine<B>, executor: E) -> Self {
        Self { engine, executor }
    }

    #[must_use]
    pub fn engine(&self) -> &ReorderEngine<B> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ReorderEngine<B> {
        &mut self.engine
    }

    #[must_use]
    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    /// Start the initial load.
    pub fn init(&mut self) {
        let cmd = self.engine.init();
        self.dispatch(cmd);
    }

    pub fn press(&mut self, item: ItemId, pos: Position) -> bool {
        self.engine.press(item, pos)
    }

    pub fn pointer_moved(&mut self, pos: Position) -> bool {
        self.engine.pointer_moved(pos)
    }

    pub fn begin_drag(&mut self, item: ItemId) -> bool {
        self.engine.begin_drag(item)
    }

    pub fn update_drag_target(&mut self, container: ContainerId, item: Option<ItemId>) -> bool {
        self.engine.update_drag_target(container, item)
    }

    pub fn clear_drag_target(&mut self) -> bool {
        self.engine.clear_drag_target()
    }

    pub fn cancel_drag(&mut self) -> bool {
        self.engine.cancel_drag()
    }

    /// Drop the active item; local state changes before this returns.
    pub fn complete_drag(&mut self) {
        let cmd = self.engine.complete_drag();
        self.dispatch(cmd);
    }

    /// Reload canonical state.
    pub fn refresh(&mut self) {
        let cmd = self.engine.refresh();
        self.dispatch(cmd);
    }

    /// Manual retry after a failed reload.
    pub fn retry_resync(&mut self) {
        let cmd = self.engine.retry_resync();
        self.dispatch(cmd);
    }

    /// Feed every finished task result into the engine. Never blocks.
    ///
    /// Returns the number of messages processed.
    pub fn poll(&mut self) -> usize {
        let mut processed = 0;
        loop {
            let ready = self.executor.drain_completed();
            if ready.is_empty() {
                return processed;
            }
            for msg in ready {
                processed += 1;
                let cmd = self.engine.update(msg);
                self.dispatch(cmd);
            }
        }
    }

    /// Process results until nothing is in flight or `timeout` elapses.
    ///
    /// Returns `true` if the program went idle. A timeout too large to
    /// represent as a deadline waits until idle.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            self.poll();
            if self.executor.in_flight() == 0 {
                return true;
            }
            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    deadline - now
                }
                None => Duration::MAX,
            };
            if let Some(msg) = self.executor.wait_one(remaining) {
                let cmd = self.engine.update(msg);
                self.dispatch(cmd);
            }
        }
    }

    fn dispatch(&mut self, cmd: Cmd<EngineMsg<B::Payload>>) {
        let mut queue = VecDeque::from([cmd]);
        while let Some(cmd) = queue.pop_front() {
            match cmd {
                Cmd::None => {}
                Cmd::Batch(cmds) => queue.extend(cmds),
                Cmd::Msg(msg) => queue.push_back(self.engine.update(msg)),
                Cmd::Task(spec, task) => {
                    tracing::trace!(
                        target: "ordo.effect",
                        task = spec.name_or("task"),
                        "task submitted"
                    );
                    self.executor.submit(spec, task);
                }
            }
        }
    }
}
