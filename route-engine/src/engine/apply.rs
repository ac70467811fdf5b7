//! Transaction bodies, one per intent.
//!
//! Every identifier is re-resolved against the transaction's tables; an
//! intent whose records have gone away returns an [`IntentError`] and the
//! transaction is discarded.

use crate::domain::{Route, RouteId, Stop, StopId, move_positions, same_members};
use crate::store::Transaction;

use super::error::IntentError;
use super::intent::Intent;

pub(crate) fn apply(tx: &mut Transaction, intent: &Intent) -> Result<(), IntentError> {
    match intent {
        Intent::CreateRoute { route, created_at } => {
            if tx.route(route).is_some() {
                return Err(IntentError::RouteExists(route.clone()));
            }
            tx.insert_route(Route::with_id(route.clone(), *created_at));
        }

        Intent::DeleteRoute { route } => {
            tx.remove_route(route)
                .ok_or_else(|| IntentError::RouteNotFound(route.clone()))?;
        }

        Intent::SelectStop { route, stop } => {
            member_position(tx, route, stop)?;
            route_mut(tx, route)?.selected_stop = Some(stop.clone());
        }

        Intent::AddStop { route, address } => {
            if !tx.append_stop(route, Stop::from_primitive(address)) {
                return Err(IntentError::RouteNotFound(route.clone()));
            }
        }

        Intent::Insert { route, candidates } => {
            if tx.route(route).is_none() {
                return Err(IntentError::RouteNotFound(route.clone()));
            }
            for candidate in candidates {
                match tx.find_stop_in_route(route, |stop| candidate.matches(stop)) {
                    Some(existing) => existing.bump(),
                    None => {
                        tx.append_stop(route, Stop::from_primitive(candidate));
                    }
                }
            }
        }

        Intent::DeleteStop { route, stop } => {
            let idx = member_position(tx, route, stop)?;
            route_mut(tx, route)?.remove_at(idx);
            tx.delete_stops([stop]);
        }

        Intent::DeleteStops { route, stops } => {
            let current = route_mut(tx, route)?;
            let found: Vec<StopId> = stops
                .iter()
                .filter(|id| current.contains(id))
                .cloned()
                .collect();
            current.remove_all(&found);
            tx.delete_stops(&found);
        }

        Intent::MoveStops { route, from, to } => {
            let current = route_mut(tx, route)?;
            current.stops = move_positions(&current.stops, from, *to);
        }

        Intent::ApplyOrder { route, order } | Intent::Shuffle { route, order } => {
            let current = route_mut(tx, route)?;
            if !same_members(&current.stops, order) {
                return Err(IntentError::IntegrityMismatch {
                    route: route.clone(),
                    expected: current.stops.len(),
                    provided: order.len(),
                });
            }
            current.stops = order.clone();
        }
    }
    Ok(())
}

fn route_mut<'a>(tx: &'a mut Transaction, route: &RouteId) -> Result<&'a mut Route, IntentError> {
    tx.route_mut(route)
        .ok_or_else(|| IntentError::RouteNotFound(route.clone()))
}

/// Where `stop` sits in `route`, checking that both still exist.
fn member_position(tx: &Transaction, route: &RouteId, stop: &StopId) -> Result<usize, IntentError> {
    let current = tx
        .route(route)
        .ok_or_else(|| IntentError::RouteNotFound(route.clone()))?;
    if tx.stop(stop).is_none() {
        return Err(IntentError::StopNotFound(stop.clone()));
    }
    current
        .position_of(stop)
        .ok_or_else(|| IntentError::StopNotInRoute {
            route: route.clone(),
            stop: stop.clone(),
        })
}
