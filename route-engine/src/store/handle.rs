//! The store handle: lookups, transactions and change streams.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::Stream;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, info};

use crate::domain::{Route, RouteId, RouteSnapshot, Stop, StopId};

use super::changes::{self, ChangeEvent, Notice, RecordSet};
use super::config::StoreConfig;
use super::error::{StoreError, TransactionError};
use super::snapshot::SnapshotFile;
use super::tables::{Tables, Transaction};

/// Committed tables stamped with the commit that produced them.
#[derive(Debug, Clone)]
pub(crate) struct Committed {
    /// Increases by one on every commit that changes something.
    pub(crate) revision: u64,
    pub(crate) tables: Arc<Tables>,
}

struct Inner {
    /// Last commit. Readers clone it and release the lock.
    committed: RwLock<Committed>,

    /// Serializes writers for the whole read-modify-persist-publish cycle.
    write_gate: Mutex<()>,

    snapshot: Option<SnapshotFile>,
    notices: broadcast::Sender<Notice>,
    closed: AtomicBool,
}

/// Capability to read and write the Route/Stop tables.
///
/// Cloning is cheap; every clone refers to the same store. Reads only
/// ever observe committed state and never wait on writers.
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("path", &self.inner.snapshot.as_ref().map(|s| s.path()))
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl StoreHandle {
    /// Open a store.
    ///
    /// A file-backed store loads its snapshot if one exists; a missing file
    /// opens as an empty store. An unreadable or invalid snapshot fails.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let snapshot = config.path.map(SnapshotFile::new);
        let tables = match &snapshot {
            Some(file) => file.load()?.unwrap_or_default(),
            None => Tables::default(),
        };

        info!(
            path = ?snapshot.as_ref().map(|s| s.path()),
            routes = tables.route_count(),
            stops = tables.stop_count(),
            "Opened route store"
        );

        let (notices, _) = broadcast::channel(config.change_buffer.max(1));

        Ok(Self {
            inner: Arc::new(Inner {
                committed: RwLock::new(Committed {
                    revision: 0,
                    tables: Arc::new(tables),
                }),
                write_gate: Mutex::new(()),
                snapshot,
                notices,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// The last committed tables.
    pub fn current(&self) -> Arc<Tables> {
        self.committed().tables
    }

    pub(crate) fn committed(&self) -> Committed {
        self.inner
            .committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lookup_route(&self, id: &RouteId) -> Option<Route> {
        self.current().route(id).cloned()
    }

    pub fn lookup_stop(&self, id: &StopId) -> Option<Stop> {
        self.current().stop(id).cloned()
    }

    /// All routes, oldest first.
    pub fn routes(&self) -> Vec<Route> {
        self.current().routes_by_created()
    }

    /// A route and its stops in sequence order.
    pub fn route_snapshot(&self, id: &RouteId) -> Option<RouteSnapshot> {
        self.current().route_snapshot(id)
    }

    /// Run `body` with exclusive write access.
    ///
    /// The body sees a private copy of the tables. If it returns `Ok` the
    /// copy is persisted (for file-backed stores) and then published to
    /// readers and change streams in one step. If the body fails, or
    /// persisting fails, the store is left exactly as it was.
    pub async fn transaction<T, E, F>(&self, body: F) -> Result<T, TransactionError<E>>
    where
        F: FnOnce(&mut Transaction) -> Result<T, E>,
    {
        if self.is_closed() {
            return Err(StoreError::Closed.into());
        }
        let _gate = self.inner.write_gate.lock().await;
        if self.is_closed() {
            return Err(StoreError::Closed.into());
        }

        let before = self.committed();
        let mut tx = Transaction::new(Tables::clone(&before.tables));
        let value = body(&mut tx).map_err(TransactionError::Aborted)?;
        let after = tx.into_tables();

        if after == *before.tables {
            debug!("Transaction made no changes");
            return Ok(value);
        }

        if let Some(file) = &self.inner.snapshot {
            file.save(&after)?;
        }

        let commit = Committed {
            revision: before.revision + 1,
            tables: Arc::new(after),
        };
        *self
            .inner
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = commit.clone();

        // No receivers is fine: nobody is watching.
        let _ = self.inner.notices.send(Notice::Committed(commit));
        Ok(value)
    }

    /// Watch a record set for changes.
    ///
    /// The stream starts with [`ChangeEvent::Initial`] and then yields one
    /// [`ChangeEvent::Update`] per commit that touches the set. It ends
    /// when the store is closed or the watched set disappears.
    pub fn changes<S: RecordSet>(
        &self,
        set: S,
    ) -> impl Stream<Item = ChangeEvent<S::Snapshot>> + Send + 'static {
        let rx = self.inner.notices.subscribe();
        changes::watch(self.clone(), set, rx)
    }

    /// Stop accepting writes and end every change stream.
    ///
    /// Waits for an in-flight transaction to finish first.
    pub async fn close(&self) {
        let _gate = self.inner.write_gate.lock().await;
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.inner.notices.send(Notice::Closed).is_err() {
            debug!("Closed store with no watchers");
        }
        info!("Route store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AllRoutes, RouteStops};
    use chrono::Utc;
    use futures::StreamExt;
    use tempfile::tempdir;

    async fn seed_route(store: &StoreHandle, stops: &[(&str, &str)]) -> RouteId {
        let route = Route::new(Utc::now());
        let id = route.id.clone();
        store
            .transaction(|tx| {
                tx.insert_route(route);
                for (street, city) in stops {
                    tx.append_stop(&id, Stop::new(*street, *city));
                }
                Ok::<_, ()>(())
            })
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = StoreHandle::open(StoreConfig::in_memory()).unwrap();
        let id = seed_route(&store, &[("1 Main", "X")]).await;

        let route = store.lookup_route(&id).unwrap();
        assert_eq!(route.stops.len(), 1);
        assert!(store.lookup_stop(&route.stops[0]).is_some());
    }

    #[tokio::test]
    async fn aborted_transaction_leaves_store_unchanged() {
        let store = StoreHandle::open(StoreConfig::in_memory()).unwrap();
        let id = seed_route(&store, &[("1 Main", "X")]).await;
        let before = store.current();

        let result = store
            .transaction(|tx| {
                tx.remove_route(&id);
                Err::<(), _>("changed my mind")
            })
            .await;

        assert!(matches!(result, Err(TransactionError::Aborted("changed my mind"))));
        assert_eq!(*store.current(), *before);
        assert!(store.lookup_route(&id).is_some());
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("routes.json");

        let store = StoreHandle::open(StoreConfig::new(&path)).unwrap();
        let id = seed_route(&store, &[("1 Main", "X"), ("2 Oak", "Y")]).await;
        drop(store);

        let reopened = StoreHandle::open(StoreConfig::new(&path)).unwrap();
        let snapshot = reopened.route_snapshot(&id).unwrap();
        let streets: Vec<&str> = snapshot.stops.iter().map(|s| s.street.as_str()).collect();
        assert_eq!(streets, vec!["1 Main", "2 Oak"]);
    }

    #[tokio::test]
    async fn failed_persist_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let parent = dir.path().join("data");
        let path = parent.join("routes.json");

        let store = StoreHandle::open(StoreConfig::new(&path)).unwrap();
        // Replace the parent directory with a plain file so the write fails.
        std::fs::write(&parent, "in the way").unwrap();

        let result = store
            .transaction(|tx| {
                tx.insert_route(Route::new(Utc::now()));
                Ok::<_, ()>(())
            })
            .await;

        assert!(matches!(
            result,
            Err(TransactionError::Store(StoreError::Io { .. }))
        ));
        assert_eq!(store.routes().len(), 0);
    }

    #[tokio::test]
    async fn closed_store_rejects_writes() {
        let store = StoreHandle::open(StoreConfig::in_memory()).unwrap();
        store.close().await;
        assert!(store.is_closed());

        let result = store.transaction(|_| Ok::<_, ()>(())).await;
        assert!(matches!(result, Err(TransactionError::Store(StoreError::Closed))));
    }

    #[tokio::test]
    async fn change_stream_reports_initial_then_update() {
        let store = StoreHandle::open(StoreConfig::in_memory()).unwrap();
        let id = seed_route(&store, &[("1 Main", "X")]).await;
        let mut stream = Box::pin(store.changes(RouteStops(id.clone())));

        match stream.next().await.unwrap() {
            ChangeEvent::Initial(snapshot) => assert_eq!(snapshot.stops.len(), 1),
            other => panic!("expected initial event, got {:?}", other),
        }

        store
            .transaction(|tx| {
                tx.append_stop(&id, Stop::new("2 Oak", "Y"));
                Ok::<_, ()>(())
            })
            .await
            .unwrap();

        match stream.next().await.unwrap() {
            ChangeEvent::Update { snapshot, changes } => {
                assert_eq!(snapshot.stops.len(), 2);
                assert_eq!(changes.insertions, vec![1]);
                assert!(changes.deletions.is_empty());
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unrelated_commits_are_not_reported() {
        let store = StoreHandle::open(StoreConfig::in_memory()).unwrap();
        let watched = seed_route(&store, &[]).await;
        let other = seed_route(&store, &[]).await;
        let mut stream = Box::pin(store.changes(RouteStops(watched.clone())));
        assert!(matches!(stream.next().await, Some(ChangeEvent::Initial(_))));

        store
            .transaction(|tx| {
                tx.append_stop(&other, Stop::new("elsewhere", "Z"));
                Ok::<_, ()>(())
            })
            .await
            .unwrap();
        store
            .transaction(|tx| {
                tx.append_stop(&watched, Stop::new("here", "X"));
                Ok::<_, ()>(())
            })
            .await
            .unwrap();

        match stream.next().await.unwrap() {
            ChangeEvent::Update { snapshot, .. } => assert_eq!(snapshot.stops[0].street, "here"),
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn deleted_route_ends_stream_with_error() {
        let store = StoreHandle::open(StoreConfig::in_memory()).unwrap();
        let id = seed_route(&store, &[]).await;
        let mut stream = Box::pin(store.changes(RouteStops(id.clone())));
        assert!(matches!(stream.next().await, Some(ChangeEvent::Initial(_))));

        store
            .transaction(|tx| {
                tx.remove_route(&id);
                Ok::<_, ()>(())
            })
            .await
            .unwrap();

        assert_eq!(
            stream.next().await,
            Some(ChangeEvent::Error(crate::store::ChangeError::RouteDeleted(id)))
        );
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn lagging_stream_restarts_from_snapshot() {
        let store = StoreHandle::open(StoreConfig::in_memory().with_change_buffer(1)).unwrap();
        let mut stream = Box::pin(store.changes(AllRoutes));
        assert!(matches!(stream.next().await, Some(ChangeEvent::Initial(_))));

        for _ in 0..3 {
            seed_route(&store, &[]).await;
        }

        match stream.next().await.unwrap() {
            ChangeEvent::Initial(routes) => assert_eq!(routes.len(), 3),
            other => panic!("expected restart, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn commits_before_first_poll_are_not_replayed() {
        let store = StoreHandle::open(StoreConfig::in_memory()).unwrap();
        let id = seed_route(&store, &[]).await;
        let mut stream = Box::pin(store.changes(RouteStops(id.clone())));

        for street in ["1 Main", "2 Oak"] {
            store
                .transaction(|tx| {
                    tx.append_stop(&id, Stop::new(street, "X"));
                    Ok::<_, ()>(())
                })
                .await
                .unwrap();
        }

        match stream.next().await.unwrap() {
            ChangeEvent::Initial(snapshot) => assert_eq!(snapshot.stops.len(), 2),
            other => panic!("expected initial event, got {:?}", other),
        }

        store
            .transaction(|tx| {
                tx.append_stop(&id, Stop::new("3 Elm", "X"));
                Ok::<_, ()>(())
            })
            .await
            .unwrap();

        match stream.next().await.unwrap() {
            ChangeEvent::Update { snapshot, changes } => {
                assert_eq!(snapshot.stops.len(), 3);
                assert_eq!(changes.insertions, vec![2]);
                assert!(changes.deletions.is_empty());
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn restart_after_lag_skips_buffered_commits() {
        let store = StoreHandle::open(StoreConfig::in_memory().with_change_buffer(2)).unwrap();
        let mut stream = Box::pin(store.changes(AllRoutes));
        assert!(matches!(stream.next().await, Some(ChangeEvent::Initial(_))));

        for _ in 0..3 {
            seed_route(&store, &[]).await;
        }
        match stream.next().await.unwrap() {
            ChangeEvent::Initial(routes) => assert_eq!(routes.len(), 3),
            other => panic!("expected restart, got {:?}", other),
        }

        seed_route(&store, &[]).await;
        match stream.next().await.unwrap() {
            ChangeEvent::Update { snapshot, changes } => {
                assert_eq!(snapshot.len(), 4);
                assert_eq!(changes.insertions.len(), 1);
                assert!(changes.deletions.is_empty());
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn close_ends_streams() {
        let store = StoreHandle::open(StoreConfig::in_memory()).unwrap();
        let mut stream = Box::pin(store.changes(AllRoutes));
        assert!(matches!(stream.next().await, Some(ChangeEvent::Initial(_))));

        store.close().await;
        assert_eq!(stream.next().await, None);
    }
}
