//! Property-based invariant tests for planning + mutation.
//!
//! For arbitrary boards and arbitrary drop sequences:
//!
//! 1. Every container's orders are exactly `0..n` after each drop
//! 2. Every item is listed in exactly one container
//! 3. No-op drops leave the revision unchanged; moves advance it by one
//! 4. The resulting ordering matches a remove-then-insert reference model
//! 5. The item multiset is preserved

use ordo_core::{
    Container, ContainerEntry, ContainerId, DropTarget, Item, ItemId, OrderedContainerStore,
    PlanningError, apply_plan, plan_move,
};
use proptest::prelude::*;

// ── Strategies ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    /// Drop item #a onto item #b (indices into the global item list).
    OntoItem(usize, usize),
    /// Drop item #a onto container #c.
    IntoContainer(usize, usize),
}

fn board_strategy() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0usize..6, 1..5)
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            (0usize..32, 0usize..32).prop_map(|(a, b)| Op::OntoItem(a, b)),
            (0usize..32, 0usize..8).prop_map(|(a, c)| Op::IntoContainer(a, c)),
        ],
        0..40,
    )
}

fn build(sizes: &[usize]) -> (OrderedContainerStore<()>, Vec<Vec<String>>) {
    let mut next = 0usize;
    let mut model = Vec::new();
    let mut entries = Vec::new();
    for (c, &size) in sizes.iter().enumerate() {
        let cid = format!("c{c}");
        let ids: Vec<String> = (0..size)
            .map(|_| {
                next += 1;
                format!("i{next}")
            })
            .collect();
        entries.push(ContainerEntry::new(
            Container::new(cid.as_str(), cid.as_str(), c as u32),
            ids.iter()
                .enumerate()
                .map(|(o, id)| Item::new(id.as_str(), cid.as_str(), o as u32, ()))
                .collect(),
        ));
        model.push(ids);
    }
    (OrderedContainerStore::from_entries(entries), model)
}

fn locate(model: &[Vec<String>], id: &str) -> Option<(usize, usize)> {
    model.iter().enumerate().find_map(|(c, items)| {
        items.iter().position(|x| x == id).map(|i| (c, i))
    })
}

/// Reference: remove the item, resolve the target in the shrunken board, insert.
fn reference_drop(model: &mut [Vec<String>], active: &str, target: &DropTarget) -> bool {
    let Some((sc, si)) = locate(model, active) else {
        return false;
    };
    let removed = model[sc].remove(si);
    let dest = match target {
        DropTarget::Item(t) if t.as_str() == active => None,
        DropTarget::Item(t) => locate(model, t.as_str()),
        DropTarget::Container(c) => model
            .iter()
            .enumerate()
            .position(|(i, _)| format!("c{i}") == c.as_str())
            .map(|dc| (dc, model[dc].len())),
    };
    match dest {
        Some((dc, di)) if !(dc == sc && di == si) => {
            model[dc].insert(di, removed);
            true
        }
        _ => {
            model[sc].insert(si, removed);
            false
        }
    }
}

fn all_ids(model: &[Vec<String>]) -> Vec<String> {
    model.iter().flatten().cloned().collect()
}

fn store_view(store: &OrderedContainerStore<()>, containers: usize) -> Vec<Vec<String>> {
    (0..containers)
        .map(|c| {
            store
                .item_ids(&ContainerId::new(format!("c{c}")))
                .unwrap()
                .iter()
                .map(ToString::to_string)
                .collect()
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Invariants hold across arbitrary drop sequences
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn drops_preserve_invariants_and_match_reference(
        sizes in board_strategy(),
        ops in ops_strategy(),
    ) {
        let (mut store, mut model) = build(&sizes);
        let universe = all_ids(&model);
        prop_assume!(!universe.is_empty());

        for op in ops {
            let (active, target) = match op {
                Op::OntoItem(a, b) => (
                    universe[a % universe.len()].clone(),
                    DropTarget::Item(ItemId::new(universe[b % universe.len()].clone())),
                ),
                Op::IntoContainer(a, c) => (
                    universe[a % universe.len()].clone(),
                    DropTarget::Container(ContainerId::new(format!("c{}", c % sizes.len()))),
                ),
            };

            let before = store.revision();
            let expected_move = reference_drop(&mut model, &active, &target);

            match plan_move(&store, &ItemId::new(active.clone()), &target) {
                Ok(Some(plan)) => {
                    prop_assert!(expected_move, "planner moved where reference did not");
                    let applied = apply_plan(&mut store, &plan).unwrap();
                    prop_assert_eq!(store.revision(), before + 1);
                    prop_assert_eq!(applied.revision, store.revision());
                }
                Ok(None) | Err(PlanningError::SelfTarget { .. }) => {
                    prop_assert!(!expected_move, "reference moved where planner did not");
                    prop_assert_eq!(store.revision(), before);
                }
                Err(other) => prop_assert!(false, "unexpected planning error: {other}"),
            }

            prop_assert!(store.check_invariants().is_ok());
            prop_assert_eq!(store_view(&store, sizes.len()), model.clone());
        }

        let mut final_ids = all_ids(&store_view(&store, sizes.len()));
        let mut original = universe.clone();
        final_ids.sort();
        original.sort();
        prop_assert_eq!(final_ids, original);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Destination index is always within bounds
// ═══════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn planned_index_within_post_removal_bounds(
        sizes in board_strategy(),
        a in 0usize..32,
        c in 0usize..8,
    ) {
        let (store, model) = build(&sizes);
        let universe = all_ids(&model);
        prop_assume!(!universe.is_empty());
        let active = ItemId::new(universe[a % universe.len()].clone());
        let dest = ContainerId::new(format!("c{}", c % sizes.len()));

        if let Ok(Some(plan)) = plan_move(&store, &active, &DropTarget::Container(dest.clone())) {
            let len = store.len_of(&dest).unwrap();
            let post = if plan.crosses_containers() { len } else { len - 1 };
            prop_assert!(plan.dest_index <= post);
            prop_assert_eq!(plan.dest_index, post);
        }
    }
}
