//! Where the worker reports what it did with each intent.

use tracing::{debug, error, trace};

use super::error::Outcome;
use super::intent::Intent;

/// Receives one report per processed intent.
///
/// Called on the worker task, so implementations must not block for long.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, intent: &Intent, outcome: &Outcome);
}

impl<F> DiagnosticSink for F
where
    F: Fn(&Intent, &Outcome) + Send + Sync,
{
    fn report(&self, intent: &Intent, outcome: &Outcome) {
        self(intent, outcome)
    }
}

/// Logs outcomes through `tracing`.
///
/// Drops are expected under concurrent editing and go to `debug`; store
/// failures lose the user's edit and go to `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, intent: &Intent, outcome: &Outcome) {
        let kind = intent.kind();
        let route = intent.route();
        match outcome {
            Outcome::Applied => trace!(%kind, %route, "Intent applied"),
            Outcome::Dropped(reason) => debug!(%kind, %route, %reason, "Intent dropped"),
            Outcome::Failed(e) => error!(%kind, %route, error = %e, "Intent failed to commit"),
        }
    }
}
