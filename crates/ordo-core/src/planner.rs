#![forbid(unsafe_code)]

//! Reorder planning: (active item, drop target) → [`Plan`].
//!
//! Planning is pure; it reads the store and never mutates it.
//!
//! # Index rule
//!
//! Every destination index is expressed against the destination sequence
//! **after the active item has been removed from its source**. Dropping onto
//! an item inserts at that item's post-removal position (the target and its
//! successors shift down); dropping onto a bare container appends. The result
//! is clamped to `[0, len]` of the post-removal sequence.
//!
//! A consequence of the rule: within one container, dropping an item onto its
//! immediate successor resolves to the item's own position and is a no-op.

use crate::error::PlanningError;
use crate::model::{ContainerId, ItemId};
use crate::store::OrderedContainerStore;

/// Where the active item was released.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DropTarget {
    /// Insert at this item's position.
    Item(ItemId),
    /// Append at the end of this container.
    Container(ContainerId),
}

impl DropTarget {
    /// Target from a hovered container and optional hovered item.
    #[must_use]
    pub fn from_hover(container: ContainerId, item: Option<ItemId>) -> Self {
        match item {
            Some(item) => Self::Item(item),
            None => Self::Container(container),
        }
    }
}

/// A resolved move.
///
/// `dest_index` is relative to the destination sequence with the item
/// already removed, which is exactly the index to insert at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub item: ItemId,
    pub source: ContainerId,
    pub source_index: usize,
    pub dest: ContainerId,
    pub dest_index: usize,
}

impl Plan {
    /// Whether the move changes container membership.
    #[inline]
    #[must_use]
    pub fn crosses_containers(&self) -> bool {
        self.source != self.dest
    }
}

/// Resolve a drop into a plan.
///
/// Returns `Ok(None)` when the drop lands on the item's current position.
pub fn plan_move<P>(
    store: &OrderedContainerStore<P>,
    active: &ItemId,
    target: &DropTarget,
) -> Result<Option<Plan>, PlanningError> {
    let (source, source_index) = store
        .locate(active)
        .map(|(container, index)| (container.clone(), index))
        .ok_or_else(|| PlanningError::UnknownItem {
            item: active.clone(),
        })?;

    let (dest, raw_index) = match target {
        DropTarget::Item(target_item) => {
            if target_item == active {
                return Err(PlanningError::SelfTarget {
                    item: active.clone(),
                });
            }
            let (container, index) =
                store
                    .locate(target_item)
                    .ok_or_else(|| PlanningError::UnknownTarget {
                        item: target_item.clone(),
                    })?;
            // Post-removal index: items after the source shift up by one.
            let index = if *container == source && index > source_index {
                index - 1
            } else {
                index
            };
            (container.clone(), index)
        }
        DropTarget::Container(container) => {
            let len = store
                .len_of(container)
                .ok_or_else(|| PlanningError::UnknownContainer {
                    container: container.clone(),
                })?;
            let len = if *container == source { len - 1 } else { len };
            (container.clone(), len)
        }
    };

    let dest_len = match store.len_of(&dest) {
        Some(len) if dest == source => len - 1,
        Some(len) => len,
        None => {
            return Err(PlanningError::UnknownContainer { container: dest });
        }
    };
    let dest_index = raw_index.min(dest_len);

    if dest == source && dest_index == source_index {
        tracing::trace!(
            target: "ordo.plan",
            item = %active,
            container = %source,
            index = source_index,
            "drop on current position"
        );
        return Ok(None);
    }

    Ok(Some(Plan {
        item: active.clone(),
        source,
        source_index,
        dest,
        dest_index,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Container, ContainerEntry, Item};

    fn board(lists: &[(&str, &[&str])]) -> OrderedContainerStore<()> {
        OrderedContainerStore::from_entries(
            lists
                .iter()
                .enumerate()
                .map(|(order, (id, items))| {
                    ContainerEntry::new(
                        Container::new(*id, *id, order as u32),
                        items
                            .iter()
                            .enumerate()
                            .map(|(i, item)| Item::new(*item, *id, i as u32, ()))
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    fn onto(item: &str) -> DropTarget {
        DropTarget::Item(ItemId::from(item))
    }

    fn into(container: &str) -> DropTarget {
        DropTarget::Container(ContainerId::from(container))
    }

    fn plan(store: &OrderedContainerStore<()>, active: &str, target: DropTarget) -> Plan {
        plan_move(store, &ItemId::from(active), &target)
            .unwrap()
            .expect("expected a move")
    }

    #[test]
    fn drag_last_to_front() {
        let store = board(&[("l1", &["a", "b", "c"])]);
        let p = plan(&store, "c", onto("a"));
        assert_eq!(p.source.as_str(), "l1");
        assert_eq!(p.source_index, 2);
        assert_eq!(p.dest.as_str(), "l1");
        assert_eq!(p.dest_index, 0);
        assert!(!p.crosses_containers());
    }

    #[test]
    fn drag_down_uses_post_removal_index() {
        let store = board(&[("l1", &["a", "b", "c", "d"])]);
        // Without a: [b, c, d]; c sits at 1.
        let p = plan(&store, "a", onto("c"));
        assert_eq!(p.dest_index, 1);
    }

    #[test]
    fn drop_onto_successor_is_noop() {
        let store = board(&[("l1", &["a", "b", "c"])]);
        let result = plan_move(&store, &ItemId::from("a"), &onto("b")).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn drop_onto_self_is_error() {
        let store = board(&[("l1", &["a", "b"])]);
        let result = plan_move(&store, &ItemId::from("a"), &onto("a"));
        assert!(matches!(result, Err(PlanningError::SelfTarget { .. })));
    }

    #[test]
    fn container_drop_appends_across() {
        let store = board(&[("l1", &["a", "b"]), ("l2", &["c"])]);
        let p = plan(&store, "a", into("l2"));
        assert_eq!(p.dest.as_str(), "l2");
        assert_eq!(p.dest_index, 1);
        assert!(p.crosses_containers());
    }

    #[test]
    fn container_drop_same_container_moves_to_end() {
        let store = board(&[("l1", &["a", "b", "c"])]);
        let p = plan(&store, "a", into("l1"));
        assert_eq!(p.dest_index, 2);
    }

    #[test]
    fn container_drop_when_already_last_is_noop() {
        let store = board(&[("l1", &["a", "b", "c"])]);
        let result = plan_move(&store, &ItemId::from("c"), &into("l1")).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn empty_container_gets_index_zero() {
        let store = board(&[("l1", &["a"]), ("empty", &[])]);
        let p = plan(&store, "a", into("empty"));
        assert_eq!(p.dest_index, 0);
    }

    #[test]
    fn cross_container_item_target_keeps_index() {
        let store = board(&[("l1", &["a", "b"]), ("l2", &["x", "y", "z"])]);
        let p = plan(&store, "b", onto("y"));
        assert_eq!(p.source_index, 1);
        assert_eq!(p.dest.as_str(), "l2");
        assert_eq!(p.dest_index, 1);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let store = board(&[("l1", &["a"])]);
        assert!(matches!(
            plan_move(&store, &ItemId::from("nope"), &into("l1")),
            Err(PlanningError::UnknownItem { .. })
        ));
        assert!(matches!(
            plan_move(&store, &ItemId::from("a"), &onto("ghost")),
            Err(PlanningError::UnknownTarget { .. })
        ));
        assert!(matches!(
            plan_move(&store, &ItemId::from("a"), &into("ghost")),
            Err(PlanningError::UnknownContainer { .. })
        ));
    }

    #[test]
    fn from_hover_prefers_item() {
        assert_eq!(
            DropTarget::from_hover(ContainerId::from("l1"), Some(ItemId::from("a"))),
            onto("a")
        );
        assert_eq!(
            DropTarget::from_hover(ContainerId::from("l1"), None),
            into("l1")
        );
    }
}
