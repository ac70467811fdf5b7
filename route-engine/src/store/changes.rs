//! Change notifications for watched record sets.
//!
//! Every successful commit is broadcast to all watchers. Each watcher
//! resolves its record set against the newly committed tables, compares
//! it with the last snapshot it handed out, and emits a positional diff
//! only when something it watches actually changed.

use std::collections::HashMap;
use std::hash::Hash;

use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::domain::{Route, RouteId, RouteSnapshot, StopId};

use super::handle::{Committed, StoreHandle};
use super::tables::Tables;

/// Broadcast from the store to every change stream.
#[derive(Debug, Clone)]
pub(crate) enum Notice {
    Committed(Committed),
    Closed,
}

/// Why a change stream stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChangeError {
    #[error("route {0} was deleted")]
    RouteDeleted(RouteId),
}

/// Positions affected by a commit.
///
/// `deletions` index the previous snapshot; `insertions` and
/// `modifications` index the new one. A record that changed position is
/// reported as a deletion plus an insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Changeset {
    pub insertions: Vec<usize>,
    pub deletions: Vec<usize>,
    pub modifications: Vec<usize>,
}

impl Changeset {
    /// Diff two keyed sequences.
    ///
    /// `modified` is asked about every key that kept its relative position.
    pub fn between<K: Eq + Hash>(old: &[K], new: &[K], modified: impl Fn(&K) -> bool) -> Self {
        let old_pos: HashMap<&K, usize> = old.iter().enumerate().map(|(i, k)| (k, i)).collect();
        let new_pos: HashMap<&K, usize> = new.iter().enumerate().map(|(i, k)| (k, i)).collect();

        let mut changes = Changeset::default();

        for (idx, key) in old.iter().enumerate() {
            if !new_pos.contains_key(key) {
                changes.deletions.push(idx);
            }
        }
        for (idx, key) in new.iter().enumerate() {
            if !old_pos.contains_key(key) {
                changes.insertions.push(idx);
            }
        }

        // Keys present on both sides, in each side's order. A key whose rank
        // among survivors differs has moved.
        let kept_old: Vec<&K> = old.iter().filter(|k| new_pos.contains_key(k)).collect();
        let kept_new: Vec<&K> = new.iter().filter(|k| old_pos.contains_key(k)).collect();

        for (rank, key) in kept_new.iter().enumerate() {
            let new_idx = new_pos[key];
            if kept_old[rank] != *key {
                changes.deletions.push(old_pos[key]);
                changes.insertions.push(new_idx);
            } else if modified(*key) {
                changes.modifications.push(new_idx);
            }
        }

        changes.deletions.sort_unstable();
        changes.insertions.sort_unstable();
        changes
    }

    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.deletions.is_empty() && self.modifications.is_empty()
    }
}

/// One item of a change stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent<T> {
    /// The current state when the stream (re)started.
    Initial(T),

    /// A commit changed the watched set.
    Update { snapshot: T, changes: Changeset },

    /// The watched set can no longer be observed; the stream ends after this.
    Error(ChangeError),
}

/// Something a change stream can watch.
pub trait RecordSet: Send + 'static {
    type Snapshot: Clone + PartialEq + Send + Sync + 'static;
    type Key: Eq + Hash;

    /// The current state of the set, or why it cannot be observed.
    fn resolve(&self, tables: &Tables) -> Result<Self::Snapshot, ChangeError>;

    /// Record keys in display order.
    fn keys(snapshot: &Self::Snapshot) -> Vec<Self::Key>;

    /// Whether the record under `key` differs between two snapshots.
    fn record_changed(before: &Self::Snapshot, after: &Self::Snapshot, key: &Self::Key) -> bool;
}

/// One route's stops, in sequence order.
///
/// A change to the route record alone (such as a new selection) is
/// delivered as an update with an empty changeset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteStops(pub RouteId);

impl RecordSet for RouteStops {
    type Snapshot = RouteSnapshot;
    type Key = StopId;

    fn resolve(&self, tables: &Tables) -> Result<RouteSnapshot, ChangeError> {
        tables
            .route_snapshot(&self.0)
            .ok_or_else(|| ChangeError::RouteDeleted(self.0.clone()))
    }

    fn keys(snapshot: &RouteSnapshot) -> Vec<StopId> {
        snapshot.stop_ids()
    }

    fn record_changed(before: &RouteSnapshot, after: &RouteSnapshot, key: &StopId) -> bool {
        let find = |s: &RouteSnapshot| s.stops.iter().find(|stop| &stop.id == key).cloned();
        find(before) != find(after)
    }
}

/// Every route, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllRoutes;

impl RecordSet for AllRoutes {
    type Snapshot = Vec<Route>;
    type Key = RouteId;

    fn resolve(&self, tables: &Tables) -> Result<Vec<Route>, ChangeError> {
        Ok(tables.routes_by_created())
    }

    fn keys(snapshot: &Vec<Route>) -> Vec<RouteId> {
        snapshot.iter().map(|r| r.id.clone()).collect()
    }

    fn record_changed(before: &Vec<Route>, after: &Vec<Route>, key: &RouteId) -> bool {
        let find = |routes: &Vec<Route>| routes.iter().find(|r| &r.id == key).cloned();
        find(before) != find(after)
    }
}

/// Stream state.
enum Watch<S: RecordSet> {
    Starting {
        store: StoreHandle,
        set: S,
        rx: broadcast::Receiver<Notice>,
    },
    Active {
        set: S,
        rx: broadcast::Receiver<Notice>,
        store: StoreHandle,
        last: S::Snapshot,

        /// Commit `last` was read from. Notices up to here are stale.
        revision: u64,
    },
    Finished,
}

impl<S: RecordSet> Watch<S> {
    async fn advance(self) -> Option<(ChangeEvent<S::Snapshot>, Self)> {
        match self {
            Watch::Finished => None,
            Watch::Starting { store, set, rx } => Some(Self::start(store, set, rx)),
            Watch::Active {
                store,
                set,
                mut rx,
                last,
                mut revision,
            } => loop {
                match rx.recv().await {
                    Ok(Notice::Committed(commit)) => {
                        if commit.revision <= revision {
                            continue;
                        }
                        let snapshot = match set.resolve(&commit.tables) {
                            Ok(snapshot) => snapshot,
                            Err(e) => return Some((ChangeEvent::Error(e), Watch::Finished)),
                        };
                        revision = commit.revision;
                        if snapshot == last {
                            continue;
                        }
                        let changes = Changeset::between(
                            &S::keys(&last),
                            &S::keys(&snapshot),
                            |key| S::record_changed(&last, &snapshot, key),
                        );
                        let event = ChangeEvent::Update {
                            snapshot: snapshot.clone(),
                            changes,
                        };
                        return Some((
                            event,
                            Watch::Active {
                                store,
                                set,
                                rx,
                                last: snapshot,
                                revision,
                            },
                        ));
                    }
                    Ok(Notice::Closed) | Err(RecvError::Closed) => {
                        debug!("store closed, ending change stream");
                        return None;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "change stream lagged, restarting from snapshot");
                        return Some(Self::start(store, set, rx));
                    }
                }
            },
        }
    }

    fn start(
        store: StoreHandle,
        set: S,
        rx: broadcast::Receiver<Notice>,
    ) -> (ChangeEvent<S::Snapshot>, Self) {
        let commit = store.committed();
        match set.resolve(&commit.tables) {
            Ok(snapshot) => (
                ChangeEvent::Initial(snapshot.clone()),
                Watch::Active {
                    store,
                    set,
                    rx,
                    last: snapshot,
                    revision: commit.revision,
                },
            ),
            Err(e) => (ChangeEvent::Error(e), Watch::Finished),
        }
    }
}

/// Build the change stream for `set`.
///
/// The receiver is subscribed before the initial snapshot is read, so every
/// later commit reaches the stream. Notices already buffered when the
/// snapshot is taken (on the first poll or after a lag restart) carry a
/// revision no newer than it and are skipped.
pub(crate) fn watch<S: RecordSet>(
    store: StoreHandle,
    set: S,
    rx: broadcast::Receiver<Notice>,
) -> impl Stream<Item = ChangeEvent<S::Snapshot>> + Send + 'static {
    let state = if store.is_closed() {
        Watch::Finished
    } else {
        Watch::Starting { store, set, rx }
    };
    futures::stream::unfold(state, Watch::advance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(old: &[char], new: &[char]) -> Changeset {
        Changeset::between(old, new, |_| false)
    }

    #[test]
    fn identical_sequences_have_no_changes() {
        assert!(diff(&['a', 'b'], &['a', 'b']).is_empty());
    }

    #[test]
    fn append_is_an_insertion() {
        let changes = diff(&['a', 'b'], &['a', 'b', 'c']);
        assert_eq!(changes.insertions, vec![2]);
        assert!(changes.deletions.is_empty());
    }

    #[test]
    fn removal_is_a_deletion_at_old_position() {
        let changes = diff(&['a', 'b', 'c'], &['a', 'c']);
        assert_eq!(changes.deletions, vec![1]);
        assert!(changes.insertions.is_empty());
    }

    #[test]
    fn move_is_deletion_plus_insertion() {
        let changes = diff(&['a', 'b', 'c'], &['b', 'a', 'c']);
        assert!(!changes.deletions.is_empty());
        assert_eq!(changes.deletions.len(), changes.insertions.len());
        assert!(changes.modifications.is_empty());
    }

    #[test]
    fn modification_reported_at_new_position() {
        let changes = Changeset::between(&['a', 'b', 'c'], &['b', 'c'], |k| *k == 'c');
        assert_eq!(changes.deletions, vec![0]);
        assert_eq!(changes.modifications, vec![1]);
    }

    #[test]
    fn error_display() {
        let err = ChangeError::RouteDeleted(RouteId::new("r1").unwrap());
        assert_eq!(err.to_string(), "route r1 was deleted");
    }
}
