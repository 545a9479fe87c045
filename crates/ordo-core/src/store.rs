#![forbid(unsafe_code)]

//! In-memory source of truth for container membership and item order.
//!
//! # Invariants
//!
//! 1. For every container, the `order` of the item at position `i` is `i`.
//! 2. Every item id is listed in exactly one container, and that container
//!    matches the item's `container_id`.
//! 3. [`OrderedContainerStore::revision`] increases on every mutation and on
//!    every wholesale replacement, and never otherwise.
//!
//! Loading through [`OrderedContainerStore::from_entries`] establishes the
//! invariants from arbitrary backend data; the mutator preserves them.

use ahash::AHashMap;

use crate::error::InvariantViolation;
use crate::model::{Container, ContainerEntry, ContainerId, Item, ItemId, order_of};

/// One container and the ordered ids of its items.
#[derive(Debug, Clone)]
struct Slot {
    container: Container,
    items: Vec<ItemId>,
}

/// Containers, each holding an ordered sequence of items.
#[derive(Debug, Clone)]
pub struct OrderedContainerStore<P> {
    slots: Vec<Slot>,
    index: AHashMap<ContainerId, usize>,
    items: AHashMap<ItemId, Item<P>>,
    revision: u64,
}

impl<P> Default for OrderedContainerStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> OrderedContainerStore<P> {
    /// An empty store at revision 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: AHashMap::new(),
            items: AHashMap::new(),
            revision: 0,
        }
    }

    /// Build a store from loaded entries, normalizing order and membership.
    ///
    /// Containers are sorted by `order`, items by `order` (both stable), and
    /// item orders are rewritten to their positions. An item listed under more
    /// than one container is kept in the first and dropped from the others.
    #[must_use]
    pub fn from_entries(entries: Vec<ContainerEntry<P>>) -> Self {
        let mut store = Self::new();
        store.load(entries);
        store
    }

    /// Discard everything and rebuild from `entries`.
    pub fn replace_all(&mut self, entries: Vec<ContainerEntry<P>>) {
        let next = self.revision + 1;
        self.load(entries);
        self.revision = next;
        tracing::debug!(
            target: "ordo.store",
            revision = self.revision,
            containers = self.slots.len(),
            items = self.items.len(),
            "store replaced"
        );
    }

    fn load(&mut self, mut entries: Vec<ContainerEntry<P>>) {
        self.slots.clear();
        self.index.clear();
        self.items.clear();

        entries.sort_by_key(|e| e.container.order);
        for entry in entries {
            let ContainerEntry { container, mut items } = entry;
            if self.index.contains_key(&container.id) {
                tracing::warn!(
                    target: "ordo.store",
                    container = %container.id,
                    "duplicate container in load, keeping first"
                );
                continue;
            }

            items.sort_by_key(|item| item.order);
            let mut ids = Vec::with_capacity(items.len());
            for mut item in items {
                if self.items.contains_key(&item.id) {
                    tracing::warn!(
                        target: "ordo.store",
                        item = %item.id,
                        container = %container.id,
                        "item listed in more than one container, dropping later entry"
                    );
                    continue;
                }
                item.container_id = container.id.clone();
                item.order = order_of(ids.len());
                ids.push(item.id.clone());
                self.items.insert(item.id.clone(), item);
            }

            self.index.insert(container.id.clone(), self.slots.len());
            self.slots.push(Slot {
                container,
                items: ids,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Mutation counter; unchanged revision means unchanged store.
    #[inline]
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of containers.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of items across all containers.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Containers in display order.
    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.slots.iter().map(|slot| &slot.container)
    }

    #[must_use]
    pub fn container(&self, id: &ContainerId) -> Option<&Container> {
        self.index.get(id).map(|&i| &self.slots[i].container)
    }

    #[must_use]
    pub fn contains_container(&self, id: &ContainerId) -> bool {
        self.index.contains_key(id)
    }

    /// Ordered item ids of a container.
    #[must_use]
    pub fn item_ids(&self, id: &ContainerId) -> Option<&[ItemId]> {
        self.index.get(id).map(|&i| self.slots[i].items.as_slice())
    }

    /// Number of items in a container.
    #[must_use]
    pub fn len_of(&self, id: &ContainerId) -> Option<usize> {
        self.item_ids(id).map(<[ItemId]>::len)
    }

    /// Items of a container in order; empty for an unknown container.
    pub fn items_in(&self, id: &ContainerId) -> impl Iterator<Item = &Item<P>> {
        self.item_ids(id)
            .unwrap_or(&[])
            .iter()
            .filter_map(|item_id| self.items.get(item_id))
    }

    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<&Item<P>> {
        self.items.get(id)
    }

    /// Owning container and position of an item.
    #[must_use]
    pub fn locate(&self, id: &ItemId) -> Option<(&ContainerId, usize)> {
        let item = self.items.get(id)?;
        let ids = self.item_ids(&item.container_id)?;
        let position = ids.iter().position(|candidate| candidate == id)?;
        Some((&item.container_id, position))
    }

    /// Read-only copy of the current ordering, for rendering.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            revision: self.revision,
            containers: self
                .slots
                .iter()
                .map(|slot| ContainerSnapshot {
                    id: slot.container.id.clone(),
                    name: slot.container.name.clone(),
                    items: slot.items.clone(),
                })
                .collect(),
        }
    }

    /// Verify the order and membership invariants.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let mut seen: AHashMap<&ItemId, &ContainerId> = AHashMap::with_capacity(self.items.len());
        for slot in &self.slots {
            let container = &slot.container.id;
            for (position, item_id) in slot.items.iter().enumerate() {
                if let Some(first) = seen.insert(item_id, container) {
                    return Err(InvariantViolation::DuplicateMembership {
                        item: item_id.clone(),
                        first: first.clone(),
                        second: container.clone(),
                    });
                }
                let Some(item) = self.items.get(item_id) else {
                    return Err(InvariantViolation::DanglingItem {
                        container: container.clone(),
                        item: item_id.clone(),
                    });
                };
                if &item.container_id != container {
                    return Err(InvariantViolation::MembershipMismatch {
                        item: item_id.clone(),
                        listed_in: container.clone(),
                        recorded: item.container_id.clone(),
                    });
                }
                let expected = order_of(position);
                if item.order != expected {
                    return Err(InvariantViolation::OrderMismatch {
                        container: container.clone(),
                        item: item_id.clone(),
                        expected,
                        found: item.order,
                    });
                }
            }
        }
        if let Some(orphan) = self.items.keys().find(|id| !seen.contains_key(id)) {
            return Err(InvariantViolation::OrphanItem {
                item: orphan.clone(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Crate-internal mutation primitives (used by the mutator)
    // -----------------------------------------------------------------------

    pub(crate) fn ids_mut(&mut self, id: &ContainerId) -> Option<&mut Vec<ItemId>> {
        let i = *self.index.get(id)?;
        Some(&mut self.slots[i].items)
    }

    pub(crate) fn set_membership(&mut self, item: &ItemId, container: &ContainerId) {
        if let Some(entry) = self.items.get_mut(item) {
            entry.container_id = container.clone();
        }
    }

    /// Rewrite `order = position` for every item of a container.
    pub(crate) fn renumber(&mut self, id: &ContainerId) {
        let Some(&i) = self.index.get(id) else {
            return;
        };
        for (position, item_id) in self.slots[i].items.iter().enumerate() {
            if let Some(item) = self.items.get_mut(item_id) {
                item.order = order_of(position);
            }
        }
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }
}

/// Ordered ids of one container at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSnapshot {
    pub id: ContainerId,
    pub name: String,
    pub items: Vec<ItemId>,
}

/// Read-only ordering of the whole store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub revision: u64,
    pub containers: Vec<ContainerSnapshot>,
}

impl StoreSnapshot {
    /// Item ids of a container, if present.
    #[must_use]
    pub fn items_of(&self, id: &ContainerId) -> Option<&[ItemId]> {
        self.containers
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.items.as_slice())
    }
}
