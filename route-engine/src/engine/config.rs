//! Engine configuration.

/// Default label attached to the worker's tracing span.
const DEFAULT_LABEL: &str = "route-engine";

/// Backlog size at which a warning is logged.
const DEFAULT_BACKLOG_WARNING: usize = 1024;

/// Configuration for a [`RouteEngine`](super::RouteEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Name recorded on every log line from this engine's worker.
    pub label: String,

    /// Number of queued, not yet processed intents at which a warning is
    /// logged. Submission never blocks, so this is the only signal that
    /// the worker is falling behind.
    pub backlog_warning: usize,
}

impl EngineConfig {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_backlog_warning(mut self, backlog_warning: usize) -> Self {
        self.backlog_warning = backlog_warning;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            backlog_warning: DEFAULT_BACKLOG_WARNING,
        }
    }
}
