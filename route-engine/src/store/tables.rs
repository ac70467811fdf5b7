//! Route and Stop tables, and the transaction view over them.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::{Route, RouteId, RouteSnapshot, Stop, StopId};

/// Every record in the store, keyed by primary key.
///
/// Committed tables are immutable and shared behind an `Arc`; a
/// transaction works on its own copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tables {
    routes: BTreeMap<RouteId, Route>,
    stops: BTreeMap<StopId, Stop>,
}

impl Tables {
    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn stop(&self, id: &StopId) -> Option<&Stop> {
        self.stops.get(id)
    }

    /// All routes, oldest first. Ties are broken by identifier.
    pub fn routes_by_created(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.routes.values().cloned().collect();
        routes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        routes
    }

    /// A route together with its stops in sequence order.
    pub fn route_snapshot(&self, id: &RouteId) -> Option<RouteSnapshot> {
        let route = self.routes.get(id)?;
        let stops = route
            .stops
            .iter()
            .filter_map(|stop_id| self.stops.get(stop_id).cloned())
            .collect();
        Some(RouteSnapshot {
            route: route.clone(),
            stops,
        })
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Check the data-model invariants.
    ///
    /// Returns a description of the first violation found.
    pub(crate) fn validate(&self) -> Result<(), String> {
        let mut owned: HashSet<&StopId> = HashSet::new();

        for (key, route) in &self.routes {
            if key != &route.id {
                return Err(format!("route stored under {} has id {}", key, route.id));
            }
            for stop_id in &route.stops {
                if !self.stops.contains_key(stop_id) {
                    return Err(format!("route {} lists missing stop {}", route.id, stop_id));
                }
                if !owned.insert(stop_id) {
                    return Err(format!("stop {} is listed more than once", stop_id));
                }
            }
            if let Some(selected) = &route.selected_stop
                && !route.contains(selected)
            {
                return Err(format!(
                    "route {} selects {} which is not in its sequence",
                    route.id, selected
                ));
            }
        }

        for (key, stop) in &self.stops {
            if key != &stop.id {
                return Err(format!("stop stored under {} has id {}", key, stop.id));
            }
            if stop.count == 0 {
                return Err(format!("stop {} has a count of zero", stop.id));
            }
            if !owned.contains(key) {
                return Err(format!("stop {} belongs to no route", stop.id));
            }
        }

        Ok(())
    }
}

/// Write access to a private copy of the tables.
///
/// Handed to the body of [`StoreHandle::transaction`](super::StoreHandle::transaction).
/// Nothing done here is visible to readers until the body returns `Ok`
/// and the commit succeeds.
#[derive(Debug)]
pub struct Transaction {
    tables: Tables,
}

impl Transaction {
    pub(crate) fn new(tables: Tables) -> Self {
        Self { tables }
    }

    pub(crate) fn into_tables(self) -> Tables {
        self.tables
    }

    pub fn route(&self, id: &RouteId) -> Option<&Route> {
        self.tables.routes.get(id)
    }

    pub fn route_mut(&mut self, id: &RouteId) -> Option<&mut Route> {
        self.tables.routes.get_mut(id)
    }

    pub fn stop(&self, id: &StopId) -> Option<&Stop> {
        self.tables.stops.get(id)
    }

    pub fn stop_mut(&mut self, id: &StopId) -> Option<&mut Stop> {
        self.tables.stops.get_mut(id)
    }

    /// Insert or replace a route record.
    pub fn insert_route(&mut self, route: Route) {
        self.tables.routes.insert(route.id.clone(), route);
    }

    /// Store `stop` and append it to the end of `route`'s sequence.
    ///
    /// Returns `false` (and stores nothing) if the route does not exist.
    pub fn append_stop(&mut self, route: &RouteId, stop: Stop) -> bool {
        let Some(route) = self.tables.routes.get_mut(route) else {
            return false;
        };
        route.stops.push(stop.id.clone());
        self.tables.stops.insert(stop.id.clone(), stop);
        true
    }

    /// The first stop in `route`'s sequence satisfying `pred`.
    pub fn find_stop_in_route(
        &mut self,
        route: &RouteId,
        pred: impl Fn(&Stop) -> bool,
    ) -> Option<&mut Stop> {
        let route = self.tables.routes.get(route)?;
        let found = route
            .stops
            .iter()
            .find(|id| self.tables.stops.get(*id).is_some_and(&pred))?
            .clone();
        self.tables.stops.get_mut(&found)
    }

    /// Delete stop records. Sequences that reference them are not touched.
    pub fn delete_stops<'a>(&mut self, ids: impl IntoIterator<Item = &'a StopId>) {
        for id in ids {
            self.tables.stops.remove(id);
        }
    }

    /// Delete a route and every stop in its sequence.
    pub fn remove_route(&mut self, id: &RouteId) -> Option<Route> {
        let route = self.tables.routes.remove(id)?;
        for stop_id in &route.stops {
            self.tables.stops.remove(stop_id);
        }
        Some(route)
    }
}
