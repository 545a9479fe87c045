#![forbid(unsafe_code)]

//! Persistence of applied moves.
//!
//! An [`AppliedMove`] becomes a [`SyncJob`]: one full-replace write for a
//! same-container reorder, or three independent writes (item update, source
//! replace, destination replace) for a cross-container move. Every write runs
//! as its own background task; nothing orders the writes of one job relative
//! to each other or to other jobs.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use ordo_core::{AppliedMove, ContainerId, ItemId, order_of};

use crate::backend::{
    BackendError, ContextProvider, ItemPlacement, Operation, OrderingBackend, require_context,
};
use crate::effect_system::trace_remote_call;
use crate::engine::EngineMsg;
use crate::program::{Cmd, TaskSpec};

/// Identifier of one persistence job, increasing per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncId(pub u64);

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One remote write belonging to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    /// Authoritative full ordering of one container.
    ReplaceOrder {
        container: ContainerId,
        ids: Vec<ItemId>,
    },
    /// New membership and position of a moved item.
    UpdateItem {
        item: ItemId,
        placement: ItemPlacement,
    },
}

impl RemoteWrite {
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::ReplaceOrder { .. } => Operation::ReplaceOrder,
            Self::UpdateItem { .. } => Operation::UpdateItem,
        }
    }

    /// The container or item the write addresses.
    #[must_use]
    pub fn subject(&self) -> &str {
        match self {
            Self::ReplaceOrder { container, .. } => container.as_str(),
            Self::UpdateItem { item, .. } => item.as_str(),
        }
    }

    /// Task name, e.g. `replace_order:todo` or `update_item:card-3`.
    #[must_use]
    pub fn task_name(&self) -> String {
        format!("{}:{}", self.operation(), self.subject())
    }
}

impl fmt::Display for RemoteWrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.task_name())
    }
}

/// The writes persisting one applied move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub id: SyncId,
    pub writes: Vec<RemoteWrite>,
}

impl SyncJob {
    /// Derive the writes for `applied`.
    #[must_use]
    pub fn for_move(id: SyncId, applied: &AppliedMove) -> Self {
        let plan = &applied.plan;
        let writes = if plan.crosses_containers() {
            vec![
                RemoteWrite::UpdateItem {
                    item: plan.item.clone(),
                    placement: ItemPlacement {
                        container_id: plan.dest.clone(),
                        order: order_of(plan.dest_index),
                    },
                },
                RemoteWrite::ReplaceOrder {
                    container: plan.source.clone(),
                    ids: applied.source_order.clone(),
                },
                RemoteWrite::ReplaceOrder {
                    container: plan.dest.clone(),
                    ids: applied.dest_order.clone(),
                },
            ]
        } else {
            vec![RemoteWrite::ReplaceOrder {
                container: plan.source.clone(),
                ids: applied.source_order.clone(),
            }]
        };
        Self { id, writes }
    }
}

/// Perform one write against the backend, traced and counted.
///
/// A missing request context fails the write like any other error.
pub fn execute_write<B: OrderingBackend + ?Sized>(
    backend: &B,
    context: &dyn ContextProvider,
    write: &RemoteWrite,
) -> Result<(), BackendError> {
    let operation = write.operation();
    trace_remote_call(operation, write.subject(), || {
        let ctx = require_context(context, operation)?;
        match write {
            RemoteWrite::ReplaceOrder { container, ids } => {
                backend.replace_order(&ctx, container, ids)
            }
            RemoteWrite::UpdateItem { item, placement } => {
                backend.update_item(&ctx, item, placement)
            }
        }
    })
}

/// One named background task per write of `job`.
pub fn sync_cmd<B: OrderingBackend>(
    job: &SyncJob,
    backend: &Arc<B>,
    context: &Arc<dyn ContextProvider>,
) -> Cmd<EngineMsg<B::Payload>> {
    let tasks = job
        .writes
        .iter()
        .map(|write| {
            let backend = Arc::clone(backend);
            let context = Arc::clone(context);
            let write = write.clone();
            let job = job.id;
            Cmd::task_with_spec(TaskSpec::default().with_name(write.task_name()), move || {
                let result = execute_write(&*backend, &*context, &write);
                EngineMsg::WriteSettled { job, write, result }
            })
        })
        .collect();
    Cmd::batch(tasks)
}

// ---------------------------------------------------------------------------
// Job ledger
// ---------------------------------------------------------------------------

/// Outcome of settling one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settlement {
    /// Other writes of the job are still in flight.
    Pending,
    /// The job's last write settled and every write succeeded.
    Succeeded,
    /// The job's last write settled and at least one write failed.
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct JobState {
    outstanding: usize,
    failed: bool,
}

/// Outstanding writes per job.
#[derive(Debug, Default)]
pub(crate) struct JobLedger {
    jobs: AHashMap<SyncId, JobState>,
}

impl JobLedger {
    pub(crate) fn open(&mut self, id: SyncId, writes: usize) {
        if writes > 0 {
            self.jobs.insert(
                id,
                JobState {
                    outstanding: writes,
                    failed: false,
                },
            );
        }
    }

    /// Record one settled write. `None` for a job the ledger does not know.
    pub(crate) fn settle(&mut self, id: SyncId, ok: bool) -> Option<Settlement> {
        let state = self.jobs.get_mut(&id)?;
        state.outstanding = state.outstanding.saturating_sub(1);
        state.failed |= !ok;
        if state.outstanding > 0 {
            return Some(Settlement::Pending);
        }
        let failed = state.failed;
        self.jobs.remove(&id);
        Some(if failed {
            Settlement::Failed
        } else {
            Settlement::Succeeded
        })
    }

    /// Jobs with at least one write in flight.
    pub(crate) fn in_flight(&self) -> usize {
        self.jobs.len()
    }
}
