#![forbid(unsafe_code)]

//! In-process [`OrderingBackend`] with a call log and scripted failures.
//!
//! Server-side semantics:
//! - `replace_order` reorders the container's current members: listed ids
//!   first (in the given order), then any unlisted members in their existing
//!   order. Ids that are not members are ignored; membership never changes.
//! - `update_item` moves the item into the destination container at
//!   `min(order, len)` and renumbers both containers.
//!
//! Faults are checked before a call takes effect, so a failed write leaves
//! the server state untouched. Every call that reaches the backend is logged,
//! failed or not.

use std::sync::{Mutex, MutexGuard};

use ahash::AHashMap;
use ordo_core::{Container, ContainerEntry, ContainerId, Item, ItemId, order_of};
use web_time::Duration;

use crate::backend::{BackendError, ItemPlacement, Operation, OrderingBackend, RequestContext};

/// A call that reached the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    ListContainers,
    ListItems {
        container: ContainerId,
    },
    ReplaceOrder {
        container: ContainerId,
        ids: Vec<ItemId>,
    },
    UpdateItem {
        item: ItemId,
        placement: ItemPlacement,
    },
}

impl RemoteCall {
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::ListContainers => Operation::ListContainers,
            Self::ListItems { .. } => Operation::ListItems,
            Self::ReplaceOrder { .. } => Operation::ReplaceOrder,
            Self::UpdateItem { .. } => Operation::UpdateItem,
        }
    }

    /// Container or item addressed by the call; `None` for the container list.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::ListContainers => None,
            Self::ListItems { container } | Self::ReplaceOrder { container, .. } => {
                Some(container.as_str())
            }
            Self::UpdateItem { item, .. } => Some(item.as_str()),
        }
    }

    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::ReplaceOrder { .. } | Self::UpdateItem { .. })
    }
}

/// Which calls a scripted fault applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultMatch {
    pub operation: Operation,
    /// Container id (for `list_items`/`replace_order`) or item id (for
    /// `update_item`); `None` matches any subject.
    pub subject: Option<String>,
}

impl FaultMatch {
    /// Every call of `operation`.
    #[must_use]
    pub fn operation(operation: Operation) -> Self {
        Self {
            operation,
            subject: None,
        }
    }

    /// Calls of `operation` addressing `container`.
    #[must_use]
    pub fn container(operation: Operation, container: impl Into<String>) -> Self {
        Self {
            operation,
            subject: Some(container.into()),
        }
    }

    /// `update_item` calls for `item`.
    #[must_use]
    pub fn item(item: impl Into<String>) -> Self {
        Self {
            operation: Operation::UpdateItem,
            subject: Some(item.into()),
        }
    }

    fn matches(&self, call: &RemoteCall) -> bool {
        self.operation == call.operation()
            && self
                .subject
                .as_deref()
                .is_none_or(|s| call.subject() == Some(s))
    }
}

#[derive(Debug, Clone)]
struct Fault {
    matcher: FaultMatch,
    error: BackendError,
    sticky: bool,
}

#[derive(Debug)]
struct State<P> {
    containers: Vec<Container>,
    items: AHashMap<ContainerId, Vec<Item<P>>>,
    calls: Vec<RemoteCall>,
    faults: Vec<Fault>,
    last_context: Option<RequestContext>,
    latency: Duration,
}

/// Thread-safe in-memory backend.
#[derive(Debug)]
pub struct MemoryBackend<P> {
    state: Mutex<State<P>>,
}

impl<P: Clone> MemoryBackend<P> {
    /// Seed with `entries`; stored orders are normalized to positions.
    #[must_use]
    pub fn new(entries: Vec<ContainerEntry<P>>) -> Self {
        let mut containers = Vec::with_capacity(entries.len());
        let mut items = AHashMap::new();
        for ContainerEntry { container, items: mut list } in entries {
            list.sort_by_key(|item| item.order);
            for (position, item) in list.iter_mut().enumerate() {
                item.container_id = container.id.clone();
                item.order = order_of(position);
            }
            items.insert(container.id.clone(), list);
            containers.push(container);
        }
        containers.sort_by_key(|c| c.order);
        Self {
            state: Mutex::new(State {
                containers,
                items,
                calls: Vec::new(),
                faults: Vec::new(),
                last_context: None,
                latency: Duration::ZERO,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<P>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail the next matching call with `error`.
    pub fn fail_next(&self, matcher: FaultMatch, error: BackendError) {
        self.lock().faults.push(Fault {
            matcher,
            error,
            sticky: false,
        });
    }

    /// Fail every matching call with `error` until [`clear_faults`](Self::clear_faults).
    pub fn fail_always(&self, matcher: FaultMatch, error: BackendError) {
        self.lock().faults.push(Fault {
            matcher,
            error,
            sticky: true,
        });
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Sleep this long inside every call.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Every call so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.lock().calls.clone()
    }

    /// Return and clear the call log.
    pub fn take_calls(&self) -> Vec<RemoteCall> {
        std::mem::take(&mut self.lock().calls)
    }

    /// Write calls only, in arrival order.
    #[must_use]
    pub fn writes(&self) -> Vec<RemoteCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    /// Context passed with the most recent call.
    #[must_use]
    pub fn last_context(&self) -> Option<RequestContext> {
        self.lock().last_context.clone()
    }

    /// Current server-side state, in container order.
    #[must_use]
    pub fn entries(&self) -> Vec<ContainerEntry<P>> {
        let state = self.lock();
        state
            .containers
            .iter()
            .map(|c| {
                ContainerEntry::new(
                    c.clone(),
                    state.items.get(&c.id).cloned().unwrap_or_default(),
                )
            })
            .collect()
    }

    /// Server-side ordering of one container.
    #[must_use]
    pub fn item_ids(&self, container: &ContainerId) -> Option<Vec<ItemId>> {
        self.lock()
            .items
            .get(container)
            .map(|items| items.iter().map(|i| i.id.clone()).collect())
    }

    /// Log the call, apply latency, and return the scripted fault if one matches.
    fn begin_call(&self, ctx: &RequestContext, call: RemoteCall) -> Result<(), BackendError> {
        let latency = {
            let mut state = self.lock();
            state.last_context = Some(ctx.clone());
            let fault = state.faults.iter().position(|f| f.matcher.matches(&call));
            state.calls.push(call);
            let result = match fault {
                Some(index) if state.faults[index].sticky => Err(state.faults[index].error.clone()),
                Some(index) => Err(state.faults.remove(index).error),
                None => Ok(()),
            };
            if let Err(err) = result {
                return Err(err);
            }
            state.latency
        };
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        Ok(())
    }
}

fn not_found(operation: Operation, what: &str, id: &str) -> BackendError {
    BackendError::status(operation, 404, format!("{what} {id} not found"))
}

fn renumber<P>(items: &mut [Item<P>]) {
    for (position, item) in items.iter_mut().enumerate() {
        item.order = order_of(position);
    }
}

impl<P: Clone + Send + 'static> OrderingBackend for MemoryBackend<P> {
    type Payload = P;

    fn list_containers(&self, ctx: &RequestContext) -> Result<Vec<Container>, BackendError> {
        self.begin_call(ctx, RemoteCall::ListContainers)?;
        Ok(self.lock().containers.clone())
    }

    fn list_items(
        &self,
        ctx: &RequestContext,
        container: &ContainerId,
    ) -> Result<Vec<Item<P>>, BackendError> {
        self.begin_call(
            ctx,
            RemoteCall::ListItems {
                container: container.clone(),
            },
        )?;
        self.lock()
            .items
            .get(container)
            .cloned()
            .ok_or_else(|| not_found(Operation::ListItems, "container", container.as_str()))
    }

    fn replace_order(
        &self,
        ctx: &RequestContext,
        container: &ContainerId,
        ids: &[ItemId],
    ) -> Result<(), BackendError> {
        self.begin_call(
            ctx,
            RemoteCall::ReplaceOrder {
                container: container.clone(),
                ids: ids.to_vec(),
            },
        )?;
        let mut state = self.lock();
        let Some(members) = state.items.get_mut(container) else {
            return Err(not_found(Operation::ReplaceOrder, "container", container.as_str()));
        };

        let mut remaining = std::mem::take(members);
        let mut reordered = Vec::with_capacity(remaining.len());
        for id in ids {
            if let Some(pos) = remaining.iter().position(|item| &item.id == id) {
                reordered.push(remaining.remove(pos));
            }
        }
        reordered.extend(remaining);
        renumber(&mut reordered);
        *members = reordered;
        Ok(())
    }

    fn update_item(
        &self,
        ctx: &RequestContext,
        item: &ItemId,
        placement: &ItemPlacement,
    ) -> Result<(), BackendError> {
        self.begin_call(
            ctx,
            RemoteCall::UpdateItem {
                item: item.clone(),
                placement: placement.clone(),
            },
        )?;
        let mut state = self.lock();
        if !state.items.contains_key(&placement.container_id) {
            return Err(not_found(
                Operation::UpdateItem,
                "container",
                placement.container_id.as_str(),
            ));
        }
        let source = state.items.iter().find_map(|(cid, list)| {
            list.iter()
                .position(|i| &i.id == item)
                .map(|pos| (cid.clone(), pos))
        });
        let Some((source, pos)) = source else {
            return Err(not_found(Operation::UpdateItem, "item", item.as_str()));
        };

        let Some(list) = state.items.get_mut(&source) else {
            return Err(not_found(Operation::UpdateItem, "container", source.as_str()));
        };
        let mut moved = list.remove(pos);
        renumber(list);

        let Some(dest) = state.items.get_mut(&placement.container_id) else {
            return Err(not_found(
                Operation::UpdateItem,
                "container",
                placement.container_id.as_str(),
            ));
        };
        moved.container_id = placement.container_id.clone();
        let index = (placement.order as usize).min(dest.len());
        dest.insert(index, moved);
        renumber(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend<&'static str> {
        MemoryBackend::new(vec![
            ContainerEntry::new(
                Container::new("l1", "One", 0),
                vec![Item::new("b", "l1", 1, "B"), Item::new("a", "l1", 0, "A")],
            ),
            ContainerEntry::new(Container::new("l2", "Two", 1), vec![Item::new("c", "l2", 0, "C")]),
        ])
    }

    fn ids(list: &[&str]) -> Vec<ItemId> {
        list.iter().map(|s| ItemId::from(*s)).collect()
    }

    fn ctx() -> RequestContext {
        RequestContext::new().with("x-tenant-id", "t")
    }

    #[test]
    fn seeding_normalizes_order() {
        let backend = backend();
        assert_eq!(backend.item_ids(&"l1".into()), Some(ids(&["a", "b"])));
    }

    #[test]
    fn replace_order_keeps_unlisted_members_and_ignores_strangers() {
        let backend = backend();
        backend
            .replace_order(&ctx(), &"l1".into(), &ids(&["b", "c"]))
            .unwrap();
        assert_eq!(backend.item_ids(&"l1".into()), Some(ids(&["b", "a"])));
        assert_eq!(backend.item_ids(&"l2".into()), Some(ids(&["c"])));
    }

    #[test]
    fn update_item_moves_and_renumbers() {
        let backend = backend();
        let placement = ItemPlacement {
            container_id: "l2".into(),
            order: 9,
        };
        backend.update_item(&ctx(), &"a".into(), &placement).unwrap();
        assert_eq!(backend.item_ids(&"l1".into()), Some(ids(&["b"])));
        assert_eq!(backend.item_ids(&"l2".into()), Some(ids(&["c", "a"])));

        let entries = backend.entries();
        let moved = &entries[1].items[1];
        assert_eq!(moved.container_id, ContainerId::from("l2"));
        assert_eq!(moved.order, 1);
        assert_eq!(moved.payload, "A");
    }

    #[test]
    fn one_shot_fault_fires_once_and_leaves_state() {
        let backend = backend();
        backend.fail_next(
            FaultMatch::container(Operation::ReplaceOrder, "l1"),
            BackendError::status(Operation::ReplaceOrder, 500, "boom"),
        );
        let first = backend.replace_order(&ctx(), &"l1".into(), &ids(&["b", "a"]));
        assert!(first.is_err());
        assert_eq!(backend.item_ids(&"l1".into()), Some(ids(&["a", "b"])));

        backend
            .replace_order(&ctx(), &"l1".into(), &ids(&["b", "a"]))
            .unwrap();
        assert_eq!(backend.item_ids(&"l1".into()), Some(ids(&["b", "a"])));
        assert_eq!(backend.calls().len(), 2);
    }

    #[test]
    fn sticky_fault_until_cleared() {
        let backend = backend();
        backend.fail_always(
            FaultMatch::item("a"),
            BackendError::Timeout {
                operation: Operation::UpdateItem,
            },
        );
        let placement = ItemPlacement {
            container_id: "l2".into(),
            order: 0,
        };
        assert!(backend.update_item(&ctx(), &"a".into(), &placement).is_err());
        assert!(backend.update_item(&ctx(), &"a".into(), &placement).is_err());
        backend.clear_faults();
        assert!(backend.update_item(&ctx(), &"a".into(), &placement).is_ok());
    }

    #[test]
    fn unknown_container_is_not_found() {
        let backend = backend();
        let err = backend.list_items(&ctx(), &"nope".into()).unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 404, .. }));
    }

    #[test]
    fn records_context_and_writes() {
        let backend = backend();
        backend.list_containers(&ctx()).unwrap();
        backend
            .replace_order(&ctx(), &"l2".into(), &ids(&["c"]))
            .unwrap();
        assert_eq!(
            backend.last_context().and_then(|c| c.get("x-tenant-id").map(str::to_owned)),
            Some("t".to_owned())
        );
        assert_eq!(backend.writes().len(), 1);
        assert_eq!(backend.take_calls().len(), 2);
        assert!(backend.calls().is_empty());
    }
}
