#![forbid(unsafe_code)]

//! Identifiers, containers, and items.
//!
//! Containers and items are created and destroyed elsewhere; this crate only
//! ever rewrites an item's `container_id` and `order`. The payload `P` is
//! carried opaquely and never inspected.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrow the raw identifier.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Identifier of a container (a list, a cultivation stage).
    ContainerId
);

string_id!(
    /// Identifier of an orderable item (a card, a cultivation area).
    ItemId
);

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// An ordered grouping entity as reported by the backend.
///
/// `order` positions the container among its siblings; it is display data
/// and never rewritten by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub order: u32,
}

impl Container {
    /// Create a container description.
    #[must_use]
    pub fn new(id: impl Into<ContainerId>, name: impl Into<String>, order: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            order,
        }
    }
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// An orderable entity belonging to exactly one container.
///
/// With the `serde` feature the payload is flattened into the item object, so
/// `P` must serialize as a map or struct.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Item<P> {
    pub id: ItemId,
    pub container_id: ContainerId,
    pub order: u32,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub payload: P,
}

impl<P> Item<P> {
    /// Create an item description.
    #[must_use]
    pub fn new(
        id: impl Into<ItemId>,
        container_id: impl Into<ContainerId>,
        order: u32,
        payload: P,
    ) -> Self {
        Self {
            id: id.into(),
            container_id: container_id.into(),
            order,
            payload,
        }
    }
}

/// A container together with its items, the unit a store is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerEntry<P> {
    pub container: Container,
    pub items: Vec<Item<P>>,
}

impl<P> ContainerEntry<P> {
    /// Pair a container with its items.
    #[must_use]
    pub fn new(container: Container, items: Vec<Item<P>>) -> Self {
        Self { container, items }
    }

    /// A container with no items.
    #[must_use]
    pub fn empty(container: Container) -> Self {
        Self {
            container,
            items: Vec::new(),
        }
    }
}

/// Convert a position into the `u32` order representation.
///
/// Containers never approach `u32::MAX` items; saturate rather than wrap.
#[inline]
#[must_use]
pub fn order_of(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}
