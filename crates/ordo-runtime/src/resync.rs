#![forbid(unsafe_code)]

//! Full reload of canonical state from the backend.
//!
//! The container list is required (retried per [`RetryPolicy`]); item lists
//! are best effort. A container whose items cannot be fetched loads empty and
//! produces a [`ContainerWarning`] instead of failing the whole reload.

use std::sync::Arc;

use ordo_core::{ContainerEntry, ContainerId};
use thiserror::Error;

use crate::backend::{BackendError, ContextProvider, Operation, OrderingBackend, require_context};
use crate::effect_system::trace_remote_call;
use crate::engine::EngineMsg;
use crate::program::{Cmd, TaskSpec};
use crate::retry::RetryPolicy;

/// A container that loaded without its items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerWarning {
    pub container: ContainerId,
    pub error: BackendError,
}

/// Everything a reload fetched.
#[derive(Debug, Clone)]
pub struct LoadedSnapshot<P> {
    pub entries: Vec<ContainerEntry<P>>,
    pub warnings: Vec<ContainerWarning>,
}

/// A reload that could not produce a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResyncError {
    #[error("could not list containers after {attempts} attempt(s): {source}")]
    ListContainers {
        attempts: u32,
        #[source]
        source: BackendError,
    },
}

/// Fetch the container list, then every container's items.
pub fn load_snapshot<B: OrderingBackend + ?Sized>(
    backend: &B,
    context: &dyn ContextProvider,
    retry: &RetryPolicy,
) -> Result<LoadedSnapshot<B::Payload>, ResyncError> {
    let containers = retry
        .run(Operation::ListContainers.as_str(), || {
            trace_remote_call(Operation::ListContainers, "*", || {
                let ctx = require_context(context, Operation::ListContainers)?;
                backend.list_containers(&ctx)
            })
        })
        .map_err(|(source, attempts)| ResyncError::ListContainers { attempts, source })?;

    let mut entries = Vec::with_capacity(containers.len());
    let mut warnings = Vec::new();
    for container in containers {
        let items = trace_remote_call(Operation::ListItems, container.id.as_str(), || {
            let ctx = require_context(context, Operation::ListItems)?;
            backend.list_items(&ctx, &container.id)
        });
        match items {
            Ok(items) => entries.push(ContainerEntry::new(container, items)),
            Err(error) => {
                tracing::warn!(
                    target: "ordo.resync",
                    container = %container.id,
                    error = %error,
                    "item fetch failed, loading container empty"
                );
                warnings.push(ContainerWarning {
                    container: container.id.clone(),
                    error,
                });
                entries.push(ContainerEntry::empty(container));
            }
        }
    }

    Ok(LoadedSnapshot { entries, warnings })
}

/// A background reload tagged with `generation`.
pub fn resync_cmd<B: OrderingBackend>(
    generation: u64,
    backend: Arc<B>,
    context: Arc<dyn ContextProvider>,
    retry: RetryPolicy,
) -> Cmd<EngineMsg<B::Payload>> {
    let spec = TaskSpec::default().with_name(format!("resync:{generation}"));
    Cmd::task_with_spec(spec, move || EngineMsg::ResyncFinished {
        generation,
        result: load_snapshot(&*backend, &*context, &retry),
    })
}
