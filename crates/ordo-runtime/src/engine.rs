#![forbid(unsafe_code)]

//! The host-facing reordering engine.
//!
//! [`ReorderEngine`] owns the store and the drag session. Drops are planned
//! and applied locally before [`complete_drag`](ReorderEngine::complete_drag)
//! returns; persistence and reloads are returned as [`Cmd`]s whose results
//! come back through [`update`](ReorderEngine::update).
//!
//! # Failure handling
//!
//! - A planning error is a silent no-op.
//! - A failed write never rolls the move back. It raises a
//!   [`Notice::PersistenceFailed`], and once the job's last write has settled
//!   the engine reloads everything from the backend.
//! - A failed reload leaves the store as it was and sets
//!   [`SyncStatus::ReloadFailed`] until [`retry_resync`](ReorderEngine::retry_resync)
//!   succeeds.
//!
//! Jobs are never serialized. A reload triggered by one job may overwrite
//! the optimistic result of a later job whose writes are still in flight;
//! the next reload after those writes land reconciles it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use ordo_core::{
    ContainerId, DragSession, DropTarget, ItemId, OrderedContainerStore, Position, Release,
    StoreSnapshot, apply_plan, plan_move,
};

use crate::backend::{BackendError, ContextProvider, OrderingBackend};
use crate::config::EngineConfig;
use crate::effect_system::record_resync_start;
use crate::program::Cmd;
use crate::resync::{LoadedSnapshot, ResyncError, resync_cmd};
use crate::sync::{JobLedger, RemoteWrite, Settlement, SyncId, SyncJob, sync_cmd};

/// Results delivered back to the engine by background tasks.
#[derive(Debug, Clone)]
pub enum EngineMsg<P> {
    /// One write of a persistence job finished.
    WriteSettled {
        job: SyncId,
        write: RemoteWrite,
        result: Result<(), BackendError>,
    },
    /// A reload finished.
    ResyncFinished {
        generation: u64,
        result: Result<LoadedSnapshot<P>, ResyncError>,
    },
}

/// Reload state visible to the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    /// The store reflects the last reload plus local moves.
    #[default]
    Ready,
    /// A reload is in flight.
    Reloading { generation: u64 },
    /// The last reload failed; the store is at its last known state.
    ReloadFailed { error: ResyncError },
}

impl SyncStatus {
    #[must_use]
    pub fn is_reloading(&self) -> bool {
        matches!(self, Self::Reloading { .. })
    }
}

/// Transient, non-blocking warnings for the host to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A write failed; a reload follows once the job settles.
    PersistenceFailed {
        job: SyncId,
        write: RemoteWrite,
        error: BackendError,
    },
    /// A container loaded without its items.
    ContainerUnavailable {
        container: ContainerId,
        error: BackendError,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PersistenceFailed { job, write, error } => {
                write!(f, "could not save change {job} ({write}): {error}")
            }
            Self::ContainerUnavailable { container, error } => {
                write!(f, "items of {container} unavailable: {error}")
            }
        }
    }
}

/// Notices kept for the host; older ones are dropped first.
pub const MAX_PENDING_NOTICES: usize = 64;

/// Drag-and-drop reordering over a remote ordering backend.
pub struct ReorderEngine<B: OrderingBackend> {
    store: OrderedContainerStore<B::Payload>,
    session: DragSession,
    backend: Arc<B>,
    context: Arc<dyn ContextProvider>,
    config: EngineConfig,
    ledger: JobLedger,
    next_job: u64,
    status: SyncStatus,
    generation: u64,
    reload_queued: bool,
    notices: VecDeque<Notice>,
}

impl<B: OrderingBackend> fmt::Debug for ReorderEngine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReorderEngine")
            .field("revision", &self.store.revision())
            .field("session", &self.session)
            .field("status", &self.status)
            .field("in_flight_jobs", &self.ledger.in_flight())
            .field("reload_queued", &self.reload_queued)
            .finish_non_exhaustive()
    }
}

impl<B: OrderingBackend> ReorderEngine<B> {
    /// An engine with an empty store; call [`init`](Self::init) to load.
    #[must_use]
    pub fn new(backend: Arc<B>, context: Arc<dyn ContextProvider>, config: EngineConfig) -> Self {
        Self {
            store: OrderedContainerStore::new(),
            session: DragSession::new(config.drag.clone()),
            backend,
            context,
            config,
            ledger: JobLedger::default(),
            next_job: 1,
            status: SyncStatus::Ready,
            generation: 0,
            reload_queued: false,
            notices: VecDeque::new(),
        }
    }

    /// Start from an already-loaded store instead of an initial reload.
    #[must_use]
    pub fn with_store(mut self, store: OrderedContainerStore<B::Payload>) -> Self {
        self.store = store;
        self
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn store(&self) -> &OrderedContainerStore<B::Payload> {
        &self.store
    }

    /// Read-only ordering for rendering.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    #[must_use]
    pub fn session(&self) -> &DragSession {
        &self.session
    }

    #[must_use]
    pub fn status(&self) -> &SyncStatus {
        &self.status
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Persistence jobs with writes still in flight.
    #[must_use]
    pub fn in_flight_jobs(&self) -> usize {
        self.ledger.in_flight()
    }

    /// Drain pending notices, oldest first. At most
    /// [`MAX_PENDING_NOTICES`] are kept between drains.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    fn push_notice(&mut self, notice: Notice) {
        if self.notices.len() == MAX_PENDING_NOTICES {
            self.notices.pop_front();
            tracing::debug!(target: "ordo.sync", "notice queue full, oldest dropped");
        }
        self.notices.push_back(notice);
    }

    // -----------------------------------------------------------------------
    // Drag lifecycle
    // -----------------------------------------------------------------------

    /// Pointer pressed on `item`; arms a drag.
    pub fn press(&mut self, item: ItemId, pos: Position) -> bool {
        if self.store.item(&item).is_none() {
            tracing::debug!(target: "ordo.session", item = %item, "press on unknown item ignored");
            return false;
        }
        self.session.press(item, pos)
    }

    /// Pointer moved; returns `true` if this motion started the drag.
    pub fn pointer_moved(&mut self, pos: Position) -> bool {
        self.session.motion(pos).is_some()
    }

    /// Start dragging `item` directly.
    pub fn begin_drag(&mut self, item: ItemId) -> bool {
        if self.store.item(&item).is_none() {
            tracing::debug!(target: "ordo.session", item = %item, "begin on unknown item ignored");
            return false;
        }
        self.session.begin(item)
    }

    /// The pointer is over `container`, and over `item` within it if any.
    pub fn update_drag_target(&mut self, container: ContainerId, item: Option<ItemId>) -> bool {
        self.session
            .hover(Some(DropTarget::from_hover(container, item)))
    }

    /// The pointer left every container.
    pub fn clear_drag_target(&mut self) -> bool {
        self.session.hover(None)
    }

    pub fn cancel_drag(&mut self) -> bool {
        self.session.cancel()
    }

    /// Release the active drag.
    ///
    /// A valid drop is applied to the store before this returns; the returned
    /// command persists it.
    pub fn complete_drag(&mut self) -> Cmd<EngineMsg<B::Payload>> {
        let (item, target) = match self.session.release() {
            Release::Drop { item, target } => (item, target),
            Release::Cancelled { .. } | Release::Click { .. } | Release::Nothing => {
                return Cmd::none();
            }
        };

        let plan = match plan_move(&self.store, &item, &target) {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                tracing::debug!(target: "ordo.plan", item = %item, "drop on own position");
                return Cmd::none();
            }
            Err(err) => {
                tracing::debug!(target: "ordo.plan", item = %item, error = %err, "drop ignored");
                return Cmd::none();
            }
        };

        let applied = match apply_plan(&mut self.store, &plan) {
            Ok(applied) => applied,
            Err(err) => {
                tracing::warn!(target: "ordo.plan", item = %item, error = %err, "plan rejected");
                return Cmd::none();
            }
        };

        let job = SyncJob::for_move(SyncId(self.next_job), &applied);
        self.next_job += 1;
        self.ledger.open(job.id, job.writes.len());
        tracing::info!(
            target: "ordo.sync",
            job = %job.id,
            item = %applied.plan.item,
            writes = job.writes.len(),
            "persisting move"
        );
        sync_cmd(&job, &self.backend, &self.context)
    }

    // -----------------------------------------------------------------------
    // Reloads
    // -----------------------------------------------------------------------

    /// Initial load.
    pub fn init(&mut self) -> Cmd<EngineMsg<B::Payload>> {
        self.refresh()
    }

    /// Reload canonical state. While a reload is in flight, one follow-up
    /// reload is queued instead.
    pub fn refresh(&mut self) -> Cmd<EngineMsg<B::Payload>> {
        if self.status.is_reloading() {
            if !self.reload_queued {
                tracing::debug!(target: "ordo.resync", "reload in flight, queueing another");
            }
            self.reload_queued = true;
            return Cmd::none();
        }
        self.generation += 1;
        self.status = SyncStatus::Reloading {
            generation: self.generation,
        };
        record_resync_start(self.generation);
        resync_cmd(
            self.generation,
            Arc::clone(&self.backend),
            Arc::clone(&self.context),
            self.config.resync.retry.clone(),
        )
    }

    /// Manual retry after [`SyncStatus::ReloadFailed`].
    pub fn retry_resync(&mut self) -> Cmd<EngineMsg<B::Payload>> {
        self.refresh()
    }

    // -----------------------------------------------------------------------
    // Task results
    // -----------------------------------------------------------------------

    /// Apply a background task's result.
    pub fn update(&mut self, msg: EngineMsg<B::Payload>) -> Cmd<EngineMsg<B::Payload>> {
        match msg {
            EngineMsg::WriteSettled { job, write, result } => {
                self.on_write_settled(job, write, result)
            }
            EngineMsg::ResyncFinished { generation, result } => {
                self.on_resync_finished(generation, result)
            }
        }
    }

    fn on_write_settled(
        &mut self,
        job: SyncId,
        write: RemoteWrite,
        result: Result<(), BackendError>,
    ) -> Cmd<EngineMsg<B::Payload>> {
        let ok = result.is_ok();
        if let Err(error) = result {
            tracing::warn!(
                target: "ordo.sync",
                job = %job,
                write = %write,
                error = %error,
                "write failed"
            );
            self.push_notice(Notice::PersistenceFailed { job, write, error });
        }

        match self.ledger.settle(job, ok) {
            Some(Settlement::Failed) => {
                tracing::info!(target: "ordo.sync", job = %job, "job failed, reloading");
                self.refresh()
            }
            Some(Settlement::Succeeded) => {
                tracing::debug!(target: "ordo.sync", job = %job, "job persisted");
                Cmd::none()
            }
            Some(Settlement::Pending) => Cmd::none(),
            None => {
                tracing::debug!(target: "ordo.sync", job = %job, "result for unknown job ignored");
                Cmd::none()
            }
        }
    }

    fn on_resync_finished(
        &mut self,
        generation: u64,
        result: Result<LoadedSnapshot<B::Payload>, ResyncError>,
    ) -> Cmd<EngineMsg<B::Payload>> {
        if generation != self.generation {
            tracing::debug!(
                target: "ordo.resync",
                generation,
                current = self.generation,
                "stale reload result ignored"
            );
            return Cmd::none();
        }

        match result {
            Ok(snapshot) => {
                let LoadedSnapshot { entries, warnings } = snapshot;
                self.store.replace_all(entries);
                for warning in warnings {
                    self.push_notice(Notice::ContainerUnavailable {
                        container: warning.container,
                        error: warning.error,
                    });
                }
                self.status = SyncStatus::Ready;
                tracing::info!(
                    target: "ordo.resync",
                    generation,
                    revision = self.store.revision(),
                    "reload applied"
                );

                let dragged_gone = self
                    .session
                    .active_item()
                    .is_some_and(|item| self.store.item(item).is_none());
                if dragged_gone {
                    self.session.cancel();
                }
            }
            Err(error) => {
                tracing::warn!(
                    target: "ordo.resync",
                    generation,
                    error = %error,
                    "reload failed, keeping last known state"
                );
                self.status = SyncStatus::ReloadFailed { error };
            }
        }

        if self.reload_queued {
            self.reload_queued = false;
            return self.refresh();
        }
        Cmd::none()
    }
}
