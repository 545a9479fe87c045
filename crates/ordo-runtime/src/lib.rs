#![forbid(unsafe_code)]

//! Runtime: persistence, reloads, and the host-facing reorder engine.
//!
//! # Role in Ordo
//! `ordo-runtime` connects the synchronous core to a remote ordering
//! backend. [`ReorderEngine`] applies drops locally and returns [`Cmd`]s
//! describing the remote writes and reloads to perform; [`Program`] runs
//! those commands on a [`TaskExecutor`] and feeds results back.
//!
//! # Key modules
//! - [`engine`]: the engine, its messages, status, and notices.
//! - [`sync`]: persistence jobs for applied moves.
//! - [`resync`]: full reloads from the backend.
//! - [`program`]: the command model, executors, and the program driver.
//! - [`memory`]: an in-process backend with fault injection.
//! - [`simulator`]: a deterministic executor for tests.
//! - `http` (feature `http`): a blocking REST backend.

pub mod backend;
pub mod config;
pub mod effect_system;
pub mod engine;
#[cfg(feature = "http")]
pub mod http;
pub mod memory;
pub mod program;
pub mod resync;
pub mod retry;
pub mod simulator;
pub mod sync;

pub use backend::{
    BackendError, ContextProvider, ItemPlacement, Operation, OrderingBackend, RequestContext,
    StaticContext,
};
pub use config::{ConfigError, EngineConfig, HttpConfig, ResyncConfig};
pub use engine::{EngineMsg, MAX_PENDING_NOTICES, Notice, ReorderEngine, SyncStatus};
#[cfg(feature = "http")]
pub use http::{HttpBackend, HttpSetupError};
pub use memory::{FaultMatch, MemoryBackend, RemoteCall};
pub use program::{Cmd, Program, TaskExecutor, TaskSpec, ThreadExecutor};
pub use resync::{ContainerWarning, LoadedSnapshot, ResyncError};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use simulator::ManualExecutor;
pub use sync::{RemoteWrite, SyncId, SyncJob};

pub use ordo_core::{
    Container, ContainerEntry, ContainerId, DragConfig, DropTarget, Item, ItemId, Position,
    StoreSnapshot,
};
