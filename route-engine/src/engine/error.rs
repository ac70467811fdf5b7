//! Engine error types and per-intent outcomes.

use crate::domain::{RouteId, StopId};
use crate::store::StoreError;

/// Why an intent was dropped without effect.
///
/// These are expected under the fire-and-forget contract: the records an
/// intent names may legitimately have been deleted by an earlier intent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("route {0} not found")]
    RouteNotFound(RouteId),

    #[error("stop {0} not found")]
    StopNotFound(StopId),

    #[error("stop {stop} is not in route {route}")]
    StopNotInRoute { route: RouteId, stop: StopId },

    /// The ordered identifiers do not name exactly the route's current stops
    #[error("order of {provided} stops does not match the {expected} stops of route {route}")]
    IntegrityMismatch {
        route: RouteId,
        expected: usize,
        provided: usize,
    },

    #[error("route {0} already exists")]
    RouteExists(RouteId),

    /// Submitted after the worker stopped
    #[error("engine has shut down")]
    EngineStopped,
}

/// What the worker did with one intent.
#[derive(Debug)]
pub enum Outcome {
    /// Committed (possibly as a no-op, e.g. a move onto itself).
    Applied,

    /// Silently dropped; the store is unchanged.
    Dropped(IntentError),

    /// The transaction could not commit; the store is unchanged. Not retried.
    Failed(StoreError),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Misuse detected when starting an engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("a route engine must be started from within a tokio runtime")]
    NoRuntime,

    #[error("cannot start a route engine on a closed store")]
    StoreClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let route = RouteId::new("r1").unwrap();
        let err = IntentError::IntegrityMismatch {
            route: route.clone(),
            expected: 3,
            provided: 2,
        };
        assert_eq!(
            err.to_string(),
            "order of 2 stops does not match the 3 stops of route r1"
        );

        let err = IntentError::StopNotInRoute {
            route,
            stop: StopId::new("s9").unwrap(),
        };
        assert_eq!(err.to_string(), "stop s9 is not in route r1");

        assert_eq!(
            EngineError::NoRuntime.to_string(),
            "a route engine must be started from within a tokio runtime"
        );
    }

    #[test]
    fn outcome_is_applied() {
        assert!(Outcome::Applied.is_applied());
        assert!(!Outcome::Dropped(IntentError::EngineStopped).is_applied());
        assert!(!Outcome::Failed(StoreError::Closed).is_applied());
    }
}
