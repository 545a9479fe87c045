//! Property-based invariant tests for the engine under concurrent persistence.
//!
//! For arbitrary boards, drag sequences, injected write failures, and
//! completion orders of background tasks:
//!
//! 1. The store invariants hold after every host operation and every poll
//! 2. The item set of the store never changes
//! 3. Once everything settles and a final refresh completes, the store equals
//!    the backend's state exactly

use std::sync::Arc;
use std::time::Duration;

use ordo_runtime::{
    BackendError, Container, ContainerEntry, ContainerId, EngineConfig, EngineMsg, FaultMatch,
    Item, ItemId, ManualExecutor, MemoryBackend, Operation, Program, ReorderEngine, StaticContext,
};
use proptest::prelude::*;

type Sim = Program<MemoryBackend<()>, ManualExecutor<EngineMsg<()>>>;

#[derive(Debug, Clone)]
enum Step {
    /// Drag item #a onto item #b, or into container #c when `b` is `None`.
    Drag {
        a: usize,
        b: Option<usize>,
        c: usize,
        fail_source: bool,
    },
    /// Run the k-th pending task (modulo the queue length).
    Run(usize),
    /// Feed finished results back.
    Poll,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0usize..32, prop::option::of(0usize..32), 0usize..8, prop::bool::weighted(0.3))
            .prop_map(|(a, b, c, fail_source)| Step::Drag { a, b, c, fail_source }),
        (0usize..8).prop_map(Step::Run),
        Just(Step::Poll),
    ]
}

fn build(sizes: &[usize]) -> (Vec<ContainerEntry<()>>, Vec<String>) {
    let mut next = 0usize;
    let mut universe = Vec::new();
    let entries = sizes
        .iter()
        .enumerate()
        .map(|(c, &size)| {
            let cid = format!("c{c}");
            let items = (0..size)
                .map(|o| {
                    next += 1;
                    let id = format!("i{next}");
                    universe.push(id.clone());
                    Item::new(id, cid.as_str(), o as u32, ())
                })
                .collect();
            ContainerEntry::new(Container::new(cid.as_str(), cid.as_str(), c as u32), items)
        })
        .collect();
    (entries, universe)
}

fn sorted_store_ids(program: &Sim) -> Vec<String> {
    let mut ids: Vec<String> = program
        .engine()
        .snapshot()
        .containers
        .iter()
        .flat_map(|c| c.items.iter().map(ToString::to_string))
        .collect();
    ids.sort();
    ids
}

proptest! {
    #[test]
    fn engine_converges_to_backend_state(
        sizes in prop::collection::vec(0usize..5, 1..4),
        steps in prop::collection::vec(step_strategy(), 0..40),
    ) {
        let (entries, universe) = build(&sizes);
        prop_assume!(!universe.is_empty());
        let mut expected_ids = universe.clone();
        expected_ids.sort();

        let backend = Arc::new(MemoryBackend::new(entries));
        let engine = ReorderEngine::new(
            Arc::clone(&backend),
            Arc::new(StaticContext::tenant("prop")),
            EngineConfig::default(),
        );
        let mut program: Sim = Program::new(engine, ManualExecutor::new());
        program.init();
        program.executor_mut().run_all();
        program.poll();

        for step in steps {
            match step {
                Step::Drag { a, b, c, fail_source } => {
                    let item = ItemId::new(universe[a % universe.len()].clone());
                    let container = ContainerId::new(format!("c{}", c % sizes.len()));
                    if fail_source {
                        if let Some((source, _)) = program.engine().store().locate(&item) {
                            backend.fail_next(
                                FaultMatch::container(Operation::ReplaceOrder, source.as_str()),
                                BackendError::status(Operation::ReplaceOrder, 500, "injected"),
                            );
                        }
                    }
                    let onto = b.map(|b| ItemId::new(universe[b % universe.len()].clone()));
                    if program.begin_drag(item) {
                        program.update_drag_target(container, onto);
                        program.complete_drag();
                    }
                }
                Step::Run(k) => {
                    let names: Vec<String> = program
                        .executor()
                        .pending_names()
                        .into_iter()
                        .map(str::to_owned)
                        .collect();
                    if !names.is_empty() {
                        program.executor_mut().run_named(&names[k % names.len()]);
                    }
                }
                Step::Poll => {
                    program.poll();
                }
            }

            prop_assert!(program.engine().store().check_invariants().is_ok());
            prop_assert_eq!(sorted_store_ids(&program), expected_ids.clone());
        }

        backend.clear_faults();
        prop_assert!(program.settle(Duration::from_secs(5)));
        prop_assert_eq!(program.engine().in_flight_jobs(), 0);

        program.refresh();
        prop_assert!(program.settle(Duration::from_secs(5)));

        let snapshot = program.engine().snapshot();
        for entry in backend.entries() {
            let server: Vec<ItemId> = entry.items.iter().map(|i| i.id.clone()).collect();
            prop_assert_eq!(snapshot.items_of(&entry.container.id), Some(server.as_slice()));
        }
        prop_assert!(program.engine().store().check_invariants().is_ok());
    }
}
