//! Store configuration.

use std::path::PathBuf;

/// Default capacity of the change-notification channel.
const DEFAULT_CHANGE_BUFFER: usize = 64;

/// Configuration for opening a [`StoreHandle`](super::StoreHandle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Location of the JSON snapshot. `None` keeps the store in memory only.
    pub path: Option<PathBuf>,

    /// How many commits a change stream may fall behind before it is
    /// restarted from a fresh snapshot.
    pub change_buffer: usize,
}

impl StoreConfig {
    /// A store backed by the snapshot file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            change_buffer: DEFAULT_CHANGE_BUFFER,
        }
    }

    /// A store that lives only as long as its handles.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            change_buffer: DEFAULT_CHANGE_BUFFER,
        }
    }

    /// Set a custom change-notification buffer (minimum 1).
    pub fn with_change_buffer(mut self, change_buffer: usize) -> Self {
        self.change_buffer = change_buffer.max(1);
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}
