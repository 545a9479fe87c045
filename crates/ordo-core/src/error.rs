#![forbid(unsafe_code)]

//! Error types for planning, mutation, and invariant checks.
//!
//! None of these are fatal: planning errors are treated as no-op drops,
//! mutation errors leave the store untouched, and invariant violations only
//! come out of explicit [`check_invariants`](crate::OrderedContainerStore::check_invariants)
//! calls.

use thiserror::Error;

use crate::model::{ContainerId, ItemId};

/// A drop target that cannot be turned into a move.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("item {item} was dropped onto itself")]
    SelfTarget { item: ItemId },

    #[error("dragged item {item} is not in the store")]
    UnknownItem { item: ItemId },

    #[error("drop target item {item} is not in the store")]
    UnknownTarget { item: ItemId },

    #[error("drop target container {container} is not in the store")]
    UnknownContainer { container: ContainerId },
}

/// A plan that no longer matches the store it is applied to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("plan for {item} is stale: expected it at {container}[{index}]")]
    StalePlan {
        item: ItemId,
        container: ContainerId,
        index: usize,
    },

    #[error("container {container} is not in the store")]
    UnknownContainer { container: ContainerId },

    #[error("destination index {index} exceeds length {len} of {container}")]
    IndexOutOfBounds {
        container: ContainerId,
        index: usize,
        len: usize,
    },
}

/// A broken order or membership invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{item} in {container} has order {found}, expected {expected}")]
    OrderMismatch {
        container: ContainerId,
        item: ItemId,
        expected: u32,
        found: u32,
    },

    #[error("{item} is listed in {listed_in} but records container {recorded}")]
    MembershipMismatch {
        item: ItemId,
        listed_in: ContainerId,
        recorded: ContainerId,
    },

    #[error("{item} is listed in both {first} and {second}")]
    DuplicateMembership {
        item: ItemId,
        first: ContainerId,
        second: ContainerId,
    },

    #[error("{container} lists unknown item {item}")]
    DanglingItem { container: ContainerId, item: ItemId },

    #[error("{item} is not listed in any container")]
    OrphanItem { item: ItemId },
}
