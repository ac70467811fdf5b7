//! Intents: the mutations a caller can request.
//!
//! Intents carry identifiers only. Anything positional that must be pinned
//! down at submission time (`delete_stops`, `shuffle`) is resolved to
//! identifiers before the intent is queued.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::domain::{RouteId, StopId, StopPrimitive};

/// A single requested mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    CreateRoute {
        route: RouteId,
        created_at: DateTime<Utc>,
    },
    DeleteRoute {
        route: RouteId,
    },
    SelectStop {
        route: RouteId,
        stop: StopId,
    },
    AddStop {
        route: RouteId,
        address: StopPrimitive,
    },
    /// Insert with deduplication against the route's existing stops.
    Insert {
        route: RouteId,
        candidates: Vec<StopPrimitive>,
    },
    DeleteStop {
        route: RouteId,
        stop: StopId,
    },
    /// Stops resolved from positions at submission time.
    DeleteStops {
        route: RouteId,
        stops: Vec<StopId>,
    },
    /// Positions are applied to the sequence as it is at execution time.
    MoveStops {
        route: RouteId,
        from: BTreeSet<usize>,
        to: usize,
    },
    ApplyOrder {
        route: RouteId,
        order: Vec<StopId>,
    },
    /// An `ApplyOrder` whose order was drawn at random at submission time.
    Shuffle {
        route: RouteId,
        order: Vec<StopId>,
    },
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::CreateRoute { .. } => IntentKind::CreateRoute,
            Intent::DeleteRoute { .. } => IntentKind::DeleteRoute,
            Intent::SelectStop { .. } => IntentKind::SelectStop,
            Intent::AddStop { .. } => IntentKind::AddStop,
            Intent::Insert { .. } => IntentKind::Insert,
            Intent::DeleteStop { .. } => IntentKind::DeleteStop,
            Intent::DeleteStops { .. } => IntentKind::DeleteStops,
            Intent::MoveStops { .. } => IntentKind::MoveStops,
            Intent::ApplyOrder { .. } => IntentKind::ApplyOrder,
            Intent::Shuffle { .. } => IntentKind::Shuffle,
        }
    }

    /// The route this intent targets.
    pub fn route(&self) -> &RouteId {
        match self {
            Intent::CreateRoute { route, .. }
            | Intent::DeleteRoute { route }
            | Intent::SelectStop { route, .. }
            | Intent::AddStop { route, .. }
            | Intent::Insert { route, .. }
            | Intent::DeleteStop { route, .. }
            | Intent::DeleteStops { route, .. }
            | Intent::MoveStops { route, .. }
            | Intent::ApplyOrder { route, .. }
            | Intent::Shuffle { route, .. } => route,
        }
    }
}

/// Fieldless tag for an [`Intent`], for logging and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    CreateRoute,
    DeleteRoute,
    SelectStop,
    AddStop,
    Insert,
    DeleteStop,
    DeleteStops,
    MoveStops,
    ApplyOrder,
    Shuffle,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::CreateRoute => "create_route",
            IntentKind::DeleteRoute => "delete_route",
            IntentKind::SelectStop => "select_stop",
            IntentKind::AddStop => "add_stop",
            IntentKind::Insert => "insert",
            IntentKind::DeleteStop => "delete_stop",
            IntentKind::DeleteStops => "delete_stops",
            IntentKind::MoveStops => "move_stops",
            IntentKind::ApplyOrder => "apply_order",
            IntentKind::Shuffle => "shuffle",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages on the engine's queue.
#[derive(Debug)]
pub(crate) enum EngineMessage {
    Intent(Intent),

    /// Answered once every message queued before it has been handled.
    Flush(oneshot::Sender<()>),

    /// Stop after everything queued before it has been handled.
    Shutdown,
}
