//! One drag, end to end: seed, drop, persist, report.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use ordo_core::{ContainerEntry, ContainerId, ItemId, OrderedContainerStore};
use ordo_runtime::{
    BackendError, EngineConfig, EngineMsg, FaultMatch, MemoryBackend, Operation, OrderingBackend,
    Program, RemoteCall, ReorderEngine, StaticContext, SyncStatus, TaskExecutor,
};
use serde::Serialize;

use crate::error::{DemoError, Result};

const SETTLE_SECS: u64 = 10;

/// What to drag, where, and which remote calls should fail.
#[derive(Debug, Clone, Default)]
pub struct DragPlan {
    pub item: String,
    pub onto: Option<String>,
    pub into: Option<String>,
    pub tenant: String,
    pub fail_replace: Vec<String>,
    pub fail_update: Vec<String>,
    pub fail_items: Vec<String>,
}

/// One container as rendered in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnView {
    pub id: String,
    pub name: String,
    pub items: Vec<String>,
}

/// Everything the walkthrough observed.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub domain: &'static str,
    pub before: Vec<ColumnView>,
    pub after_drop: Vec<ColumnView>,
    pub after_sync: Vec<ColumnView>,
    pub calls: Vec<String>,
    pub notices: Vec<String>,
    pub status: String,
}

fn columns<P: Display>(store: &OrderedContainerStore<P>) -> Vec<ColumnView> {
    store
        .containers()
        .map(|c| ColumnView {
            id: c.id.to_string(),
            name: c.name.clone(),
            items: store
                .items_in(&c.id)
                .map(|item| format!("{} {}", item.id, item.payload))
                .collect(),
        })
        .collect()
}

fn describe_call(call: &RemoteCall) -> String {
    match call {
        RemoteCall::ListContainers => "list_containers".into(),
        RemoteCall::ListItems { container } => format!("list_items {container}"),
        RemoteCall::ReplaceOrder { container, ids } => {
            let ids: Vec<&str> = ids.iter().map(ItemId::as_str).collect();
            format!("replace_order {container} [{}]", ids.join(", "))
        }
        RemoteCall::UpdateItem { item, placement } => format!(
            "update_item {item} -> {}@{}",
            placement.container_id, placement.order
        ),
    }
}

fn describe_status(status: &SyncStatus) -> String {
    match status {
        SyncStatus::Ready => "ready".into(),
        SyncStatus::Reloading { generation } => format!("reloading (#{generation})"),
        SyncStatus::ReloadFailed { error } => format!("reload failed: {error}"),
    }
}

fn settle<B, E>(program: &mut Program<B, E>) -> Result<()>
where
    B: OrderingBackend,
    E: TaskExecutor<EngineMsg<B::Payload>>,
{
    if program.settle(Duration::from_secs(SETTLE_SECS)) {
        Ok(())
    } else {
        Err(DemoError::Timeout {
            seconds: SETTLE_SECS,
        })
    }
}

/// Container and hovered item for the drop.
fn resolve_target<P>(
    store: &OrderedContainerStore<P>,
    plan: &DragPlan,
) -> Result<(ContainerId, Option<ItemId>)> {
    if let Some(onto) = &plan.onto {
        let onto = ItemId::from(onto.as_str());
        let Some((container, _)) = store.locate(&onto) else {
            return Err(DemoError::UnknownItem {
                id: onto.to_string(),
            });
        };
        return Ok((container.clone(), Some(onto)));
    }
    let into = plan.into.clone().unwrap_or_default();
    let container = ContainerId::from(into);
    if store.contains_container(&container) {
        Ok((container, None))
    } else {
        Err(DemoError::UnknownContainer {
            id: container.to_string(),
        })
    }
}

fn inject_faults<P: Clone>(backend: &MemoryBackend<P>, plan: &DragPlan) {
    let injected = |op| BackendError::status(op, 503, "injected failure");
    for container in &plan.fail_replace {
        backend.fail_next(
            FaultMatch::container(Operation::ReplaceOrder, container.as_str()),
            injected(Operation::ReplaceOrder),
        );
    }
    for item in &plan.fail_update {
        backend.fail_next(FaultMatch::item(item.as_str()), injected(Operation::UpdateItem));
    }
    for container in &plan.fail_items {
        backend.fail_next(
            FaultMatch::container(Operation::ListItems, container.as_str()),
            injected(Operation::ListItems),
        );
    }
}

/// Seed an in-memory backend, perform one drag, and wait for persistence.
pub fn walk<P>(
    domain: &'static str,
    seed: Vec<ContainerEntry<P>>,
    plan: &DragPlan,
    config: EngineConfig,
) -> Result<Report>
where
    P: Clone + Send + Display + 'static,
{
    let backend = Arc::new(MemoryBackend::new(seed));
    let engine = ReorderEngine::new(
        Arc::clone(&backend),
        Arc::new(StaticContext::tenant(plan.tenant.clone())),
        config,
    );
    let mut program = Program::threaded(engine);
    program.init();
    settle(&mut program)?;
    backend.take_calls();
    inject_faults(&backend, plan);

    let before = columns(program.engine().store());
    let (container, onto) = resolve_target(program.engine().store(), plan)?;
    let item = ItemId::from(plan.item.as_str());
    if !program.begin_drag(item.clone()) {
        return Err(DemoError::UnknownItem {
            id: item.to_string(),
        });
    }
    program.update_drag_target(container, onto);
    program.complete_drag();
    let after_drop = columns(program.engine().store());

    settle(&mut program)?;
    tracing::info!(target: "ordo.demo", domain, item = %item, "walkthrough settled");

    Ok(Report {
        domain,
        before,
        after_drop,
        after_sync: columns(program.engine().store()),
        calls: backend.calls().iter().map(describe_call).collect(),
        notices: program
            .engine_mut()
            .take_notices()
            .iter()
            .map(ToString::to_string)
            .collect(),
        status: describe_status(program.engine().status()),
    })
}

fn render_columns(out: &mut String, title: &str, columns: &[ColumnView]) {
    out.push_str(title);
    out.push_str(":\n");
    for column in columns {
        out.push_str(&format!("  {} [{}]\n", column.name, column.id));
        if column.items.is_empty() {
            out.push_str("    (empty)\n");
        }
        for item in &column.items {
            out.push_str(&format!("    {item}\n"));
        }
    }
}

/// Human-readable report.
#[must_use]
pub fn render_text(report: &Report) -> String {
    let mut out = format!("== {} ==\n", report.domain);
    render_columns(&mut out, "before", &report.before);
    render_columns(&mut out, "after drop", &report.after_drop);
    render_columns(&mut out, "after sync", &report.after_sync);
    out.push_str("remote calls:\n");
    for call in &report.calls {
        out.push_str(&format!("  {call}\n"));
    }
    if !report.notices.is_empty() {
        out.push_str("notices:\n");
        for notice in &report.notices {
            out.push_str(&format!("  ! {notice}\n"));
        }
    }
    out.push_str(&format!("status: {}\n", report.status));
    out
}
