#![forbid(unsafe_code)]

//! Drag lifecycle state machine.
//!
//! [`DragSession`] tracks at most one drag at a time:
//!
//! ```text
//!  Idle ──press──▶ Armed ──motion ≥ threshold──▶ Dragging ──drop──▶ Idle
//!   │               │                              │
//!   └────begin──────┴──────────────────────────────┘ cancel ──▶ Idle
//! ```
//!
//! # Invariants
//!
//! 1. A drag only reaches `Dragging` after the pointer moved at least
//!    [`DragConfig::drag_threshold`] cells from the press point, or after an
//!    explicit [`begin`](DragSession::begin).
//! 2. Hover updates while `Dragging` only record the target; they never
//!    mutate anything else.
//! 3. `drop` and `cancel` always return the session to `Idle`.
//! 4. Releasing while `Armed` is a click and produces no drop.

use crate::model::ItemId;
use crate::planner::DropTarget;

/// Drag thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DragConfig {
    /// Minimum manhattan distance before an armed press becomes a drag (default: 3).
    pub drag_threshold: u32,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self { drag_threshold: 3 }
    }
}

/// A pointer position in host coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position.
    #[must_use]
    pub fn manhattan_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

/// Current phase of the session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragPhase {
    #[default]
    Idle,
    /// Pressed on an item; not yet past the movement threshold.
    Armed { item: ItemId, origin: Position },
    /// Active drag with the latest hover target, if any.
    Dragging {
        item: ItemId,
        hover: Option<DropTarget>,
    },
}

/// What a release produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Release {
    /// A drag over a valid target; hand the pair to the planner.
    Drop { item: ItemId, target: DropTarget },
    /// The drag ended outside any valid target.
    Cancelled { item: ItemId },
    /// The press never turned into a drag.
    Click { item: ItemId },
    /// Nothing was pressed or dragged.
    Nothing,
}

/// Ephemeral drag state for one interaction.
#[derive(Debug, Clone, Default)]
pub struct DragSession {
    config: DragConfig,
    phase: DragPhase,
}

impl DragSession {
    #[must_use]
    pub fn new(config: DragConfig) -> Self {
        Self {
            config,
            phase: DragPhase::Idle,
        }
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> &DragPhase {
        &self.phase
    }

    #[inline]
    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.phase, DragPhase::Dragging { .. })
    }

    #[inline]
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, DragPhase::Idle)
    }

    /// Item being dragged, once past the threshold.
    #[must_use]
    pub fn active_item(&self) -> Option<&ItemId> {
        match &self.phase {
            DragPhase::Dragging { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Current hover target while dragging.
    #[must_use]
    pub fn hover_target(&self) -> Option<&DropTarget> {
        match &self.phase {
            DragPhase::Dragging { hover, .. } => hover.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DragConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: DragConfig) {
        self.config = config;
    }

    /// Arm a drag candidate. Ignored unless idle.
    pub fn press(&mut self, item: ItemId, origin: Position) -> bool {
        if !self.is_idle() {
            return false;
        }
        tracing::trace!(target: "ordo.session", item = %item, "drag armed");
        self.phase = DragPhase::Armed { item, origin };
        true
    }

    /// Feed pointer motion. Returns the item when this motion started the drag.
    pub fn motion(&mut self, pos: Position) -> Option<ItemId> {
        let DragPhase::Armed { item, origin } = &self.phase else {
            return None;
        };
        if origin.manhattan_distance(pos) < self.config.drag_threshold {
            return None;
        }
        let item = item.clone();
        self.start(item.clone());
        Some(item)
    }

    /// Start dragging `item` directly (keyboard pick-up or host-recognized drag).
    ///
    /// Refused while another drag is already active.
    pub fn begin(&mut self, item: ItemId) -> bool {
        if self.is_dragging() {
            tracing::debug!(
                target: "ordo.session",
                item = %item,
                "begin refused: drag already active"
            );
            return false;
        }
        self.start(item);
        true
    }

    fn start(&mut self, item: ItemId) {
        tracing::debug!(target: "ordo.session", item = %item, "drag started");
        // Until the host reports a hover, the item hovers over itself.
        let hover = Some(DropTarget::Item(item.clone()));
        self.phase = DragPhase::Dragging { item, hover };
    }

    /// Record the current hover target; `None` means outside every container.
    pub fn hover(&mut self, target: Option<DropTarget>) -> bool {
        match &mut self.phase {
            DragPhase::Dragging { hover, .. } => {
                *hover = target;
                true
            }
            _ => false,
        }
    }

    /// Release the pointer and return to idle.
    pub fn release(&mut self) -> Release {
        match std::mem::take(&mut self.phase) {
            DragPhase::Idle => Release::Nothing,
            DragPhase::Armed { item, .. } => Release::Click { item },
            DragPhase::Dragging {
                item,
                hover: Some(target),
            } => {
                tracing::debug!(target: "ordo.session", item = %item, "drag dropped");
                Release::Drop { item, target }
            }
            DragPhase::Dragging { item, hover: None } => {
                tracing::debug!(
                    target: "ordo.session",
                    item = %item,
                    "drag released outside any container"
                );
                Release::Cancelled { item }
            }
        }
    }

    /// Abort any armed or active drag. Returns `true` if something was aborted.
    pub fn cancel(&mut self) -> bool {
        match std::mem::take(&mut self.phase) {
            DragPhase::Idle => false,
            DragPhase::Armed { .. } => true,
            DragPhase::Dragging { item, .. } => {
                tracing::debug!(target: "ordo.session", item = %item, "drag cancelled");
                true
            }
        }
    }
}
