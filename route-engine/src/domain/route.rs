//! Route records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sequence::adjacent_to;
use super::{RouteId, Stop, StopId};

/// An ordered container of Stops with a selection cursor.
///
/// `stops` is the authoritative order and never holds the same identifier
/// twice. When `selected_stop` is set it names a member of `stops`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,

    /// Only used for default display ordering.
    pub created_at: DateTime<Utc>,

    pub stops: Vec<StopId>,

    pub selected_stop: Option<StopId>,
}

impl Route {
    /// Create an empty Route with a fresh identifier.
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self::with_id(RouteId::generate(), created_at)
    }

    /// Create an empty Route with a known identifier.
    pub fn with_id(id: RouteId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            stops: Vec::new(),
            selected_stop: None,
        }
    }

    /// Position of `stop` in the sequence.
    pub fn position_of(&self, stop: &StopId) -> Option<usize> {
        self.stops.iter().position(|s| s == stop)
    }

    pub fn contains(&self, stop: &StopId) -> bool {
        self.position_of(stop).is_some()
    }

    /// The selection as a plain string, empty when nothing is selected.
    pub fn selected_stop_id(&self) -> &str {
        self.selected_stop.as_ref().map_or("", |id| id.as_str())
    }

    pub fn is_selected(&self, stop: &StopId) -> bool {
        self.selected_stop.as_ref() == Some(stop)
    }

    /// Remove the stop at `idx`, repairing the selection if it pointed there.
    ///
    /// Returns the removed identifier.
    pub fn remove_at(&mut self, idx: usize) -> Option<StopId> {
        if idx >= self.stops.len() {
            return None;
        }
        if self.is_selected(&self.stops[idx]) {
            self.selected_stop = adjacent_to(&self.stops, idx);
        }
        Some(self.stops.remove(idx))
    }

    /// Remove every stop in `removed` in one step.
    ///
    /// If the selection is among them, it moves to the nearest surviving
    /// neighbour of the selected stop in the sequence as it was before the
    /// removal: the first survivor after it, else the last survivor before
    /// it, else nothing.
    pub fn remove_all(&mut self, removed: &[StopId]) {
        let selected_idx = self
            .selected_stop
            .as_ref()
            .filter(|selected| removed.contains(selected))
            .and_then(|selected| self.position_of(selected));
        if let Some(idx) = selected_idx {
            let survives = |id: &&StopId| !removed.contains(*id);
            let next = self.stops[idx + 1..].iter().find(survives);
            let previous = self.stops[..idx].iter().rev().find(survives);
            self.selected_stop = next.or(previous).cloned();
        }
        self.stops.retain(|id| !removed.contains(id));
        self.clear_dangling_selection();
    }

    /// Drop a selection that no longer names a member of the sequence.
    pub(crate) fn clear_dangling_selection(&mut self) {
        let dangling = self
            .selected_stop
            .as_ref()
            .is_some_and(|selected| !self.contains(selected));
        if dangling {
            self.selected_stop = None;
        }
    }
}

/// A Route together with its Stops in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSnapshot {
    pub route: Route,
    pub stops: Vec<Stop>,
}

impl RouteSnapshot {
    /// Identifiers of the stops, in order.
    pub fn stop_ids(&self) -> Vec<StopId> {
        self.route.stops.clone()
    }

    pub fn selected(&self) -> Option<&Stop> {
        let selected = self.route.selected_stop.as_ref()?;
        self.stops.iter().find(|s| &s.id == selected)
    }
}
