#![forbid(unsafe_code)]

//! Optimistic local mutation: apply a [`Plan`] to the store synchronously.
//!
//! After [`apply_plan`] returns `Ok`, both the source and the destination
//! container satisfy `order == position` for every item, and the store
//! revision has advanced by exactly one. On `Err` the store is untouched.

use crate::error::MutationError;
use crate::model::{ContainerId, ItemId};
use crate::planner::Plan;
use crate::store::OrderedContainerStore;

/// A move that has been applied locally and now needs persisting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub plan: Plan,
    /// Source container ordering after the move.
    pub source_order: Vec<ItemId>,
    /// Destination container ordering after the move. Equal to
    /// `source_order` for a same-container reorder.
    pub dest_order: Vec<ItemId>,
    /// Store revision produced by this move.
    pub revision: u64,
}

impl AppliedMove {
    /// Final position of the moved item in its destination.
    #[inline]
    #[must_use]
    pub fn dest_index(&self) -> usize {
        self.plan.dest_index
    }
}

/// Apply `plan` to `store`.
pub fn apply_plan<P>(
    store: &mut OrderedContainerStore<P>,
    plan: &Plan,
) -> Result<AppliedMove, MutationError> {
    validate(store, plan)?;

    // 1. remove from source
    if let Some(source) = store.ids_mut(&plan.source) {
        source.remove(plan.source_index);
    }
    // 2. rewrite membership
    if plan.crosses_containers() {
        store.set_membership(&plan.item, &plan.dest);
    }
    // 3. insert at destination
    if let Some(dest) = store.ids_mut(&plan.dest) {
        dest.insert(plan.dest_index, plan.item.clone());
    }
    // 4. renumber both sides
    store.renumber(&plan.source);
    if plan.crosses_containers() {
        store.renumber(&plan.dest);
    }
    store.bump_revision();

    let source_order = order_snapshot(store, &plan.source);
    let dest_order = if plan.crosses_containers() {
        order_snapshot(store, &plan.dest)
    } else {
        source_order.clone()
    };

    tracing::debug!(
        target: "ordo.store",
        item = %plan.item,
        source = %plan.source,
        dest = %plan.dest,
        dest_index = plan.dest_index,
        revision = store.revision(),
        "move applied"
    );

    Ok(AppliedMove {
        plan: plan.clone(),
        source_order,
        dest_order,
        revision: store.revision(),
    })
}

fn validate<P>(store: &OrderedContainerStore<P>, plan: &Plan) -> Result<(), MutationError> {
    let source = store
        .item_ids(&plan.source)
        .ok_or_else(|| MutationError::UnknownContainer {
            container: plan.source.clone(),
        })?;
    if source.get(plan.source_index) != Some(&plan.item) {
        return Err(MutationError::StalePlan {
            item: plan.item.clone(),
            container: plan.source.clone(),
            index: plan.source_index,
        });
    }

    let dest_len = store
        .len_of(&plan.dest)
        .ok_or_else(|| MutationError::UnknownContainer {
            container: plan.dest.clone(),
        })?;
    let dest_len = if plan.crosses_containers() {
        dest_len
    } else {
        dest_len - 1
    };
    if plan.dest_index > dest_len {
        return Err(MutationError::IndexOutOfBounds {
            container: plan.dest.clone(),
            index: plan.dest_index,
            len: dest_len,
        });
    }
    Ok(())
}

fn order_snapshot<P>(store: &OrderedContainerStore<P>, id: &ContainerId) -> Vec<ItemId> {
    store.item_ids(id).map(<[ItemId]>::to_vec).unwrap_or_default()
}
