#![forbid(unsafe_code)]

//! Core: ordered containers, drag sessions, reorder planning and mutation.
//!
//! # Role in Ordo
//! `ordo-core` is the synchronous half of the reordering engine. It owns the
//! in-memory [`OrderedContainerStore`], the [`DragSession`] state machine, the
//! pure [`plan_move`] planner, and the [`apply_plan`] optimistic mutator.
//!
//! # How it fits in the system
//! `ordo-runtime` wraps these pieces in a host-facing engine that turns each
//! applied move into background persistence tasks and reloads the store from
//! the backend when persistence fails. Nothing in this crate performs I/O.

pub mod error;
pub mod model;
pub mod mutator;
pub mod planner;
pub mod session;
pub mod store;

pub use error::{InvariantViolation, MutationError, PlanningError};
pub use model::{Container, ContainerEntry, ContainerId, Item, ItemId, order_of};
pub use mutator::{AppliedMove, apply_plan};
pub use planner::{DropTarget, Plan, plan_move};
pub use session::{DragConfig, DragPhase, DragSession, Position, Release};
pub use store::{ContainerSnapshot, OrderedContainerStore, StoreSnapshot};
