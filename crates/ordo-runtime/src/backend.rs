#![forbid(unsafe_code)]

//! The narrow persistence contract the engine consumes.
//!
//! Backends are called from background tasks, never from the thread that owns
//! the store, so implementations may block (e.g. a blocking HTTP client).

use std::fmt;

use ordo_core::{Container, ContainerId, Item, ItemId};
use thiserror::Error;

#[cfg(feature = "http")]
use serde::{Deserialize, Serialize};

/// Remote operations, for error reporting and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListContainers,
    ListItems,
    ReplaceOrder,
    UpdateItem,
}

impl Operation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListContainers => "list_containers",
            Self::ListItems => "list_items",
            Self::ReplaceOrder => "replace_order",
            Self::UpdateItem => "update_item",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{operation} rejected with status {status}: {message}")]
    Status {
        operation: Operation,
        status: u16,
        message: String,
    },

    #[error("{operation} timed out")]
    Timeout { operation: Operation },

    #[error("transport failure during {operation}: {message}")]
    Transport { operation: Operation, message: String },

    #[error("could not decode {operation} response: {message}")]
    Decode { operation: Operation, message: String },

    #[error("request context unavailable for {operation}")]
    MissingContext { operation: Operation },
}

impl BackendError {
    /// The operation that failed.
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            Self::Status { operation, .. }
            | Self::Timeout { operation }
            | Self::Transport { operation, .. }
            | Self::Decode { operation, .. }
            | Self::MissingContext { operation } => *operation,
        }
    }

    /// Shorthand for a rejection with a status code.
    #[must_use]
    pub fn status(operation: Operation, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            operation,
            status,
            message: message.into(),
        }
    }
}

/// New membership and position for a moved item.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "http", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "http", serde(rename_all = "camelCase"))]
pub struct ItemPlacement {
    pub container_id: ContainerId,
    pub order: u32,
}

// ---------------------------------------------------------------------------
// Request context
// ---------------------------------------------------------------------------

/// Per-call tenant/session context, opaque to the engine.
///
/// Entries are forwarded verbatim (the HTTP backend sends them as headers).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    entries: Vec<(String, String)>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Supplies the context for each remote call.
pub trait ContextProvider: Send + Sync {
    /// `None` when no session is established; the call then fails.
    fn context(&self) -> Option<RequestContext>;
}

impl<F> ContextProvider for F
where
    F: Fn() -> Option<RequestContext> + Send + Sync,
{
    fn context(&self) -> Option<RequestContext> {
        self()
    }
}

/// A fixed context.
#[derive(Debug, Clone, Default)]
pub struct StaticContext(RequestContext);

impl StaticContext {
    #[must_use]
    pub fn new(context: RequestContext) -> Self {
        Self(context)
    }

    /// Context carrying only a tenant header.
    #[must_use]
    pub fn tenant(tenant: impl Into<String>) -> Self {
        Self(RequestContext::new().with("x-tenant-id", tenant))
    }
}

impl ContextProvider for StaticContext {
    fn context(&self) -> Option<RequestContext> {
        Some(self.0.clone())
    }
}

/// Fetch the context for `operation` or fail the call.
pub fn require_context(
    provider: &dyn ContextProvider,
    operation: Operation,
) -> Result<RequestContext, BackendError> {
    provider
        .context()
        .ok_or(BackendError::MissingContext { operation })
}

// ---------------------------------------------------------------------------
// Backend contract
// ---------------------------------------------------------------------------

/// Remote source of truth for containers and item ordering.
pub trait OrderingBackend: Send + Sync + 'static {
    /// Opaque domain payload carried by items.
    type Payload: Clone + Send + 'static;

    /// All containers, in display order.
    fn list_containers(&self, ctx: &RequestContext) -> Result<Vec<Container>, BackendError>;

    /// Items of one container, in order.
    fn list_items(
        &self,
        ctx: &RequestContext,
        container: &ContainerId,
    ) -> Result<Vec<Item<Self::Payload>>, BackendError>;

    /// Authoritatively replace a container's ordering; orders follow index.
    fn replace_order(
        &self,
        ctx: &RequestContext,
        container: &ContainerId,
        ids: &[ItemId],
    ) -> Result<(), BackendError>;

    /// Move an item to `placement`, leaving its payload untouched.
    fn update_item(
        &self,
        ctx: &RequestContext,
        item: &ItemId,
        placement: &ItemPlacement,
    ) -> Result<(), BackendError>;
}
