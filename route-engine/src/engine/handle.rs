//! The public engine handle.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use rand::Rng;
use rand::seq::SliceRandom;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{RouteId, StopId, StopPrimitive};
use crate::store::StoreHandle;

use super::config::EngineConfig;
use super::diagnostics::{DiagnosticSink, TracingSink};
use super::error::{EngineError, IntentError, Outcome};
use super::intent::{EngineMessage, Intent};
use super::worker::EngineWorker;

struct Shared {
    config: EngineConfig,
    store: StoreHandle,
    sink: Arc<dyn DiagnosticSink>,
    tx: mpsc::UnboundedSender<EngineMessage>,
    backlog: Arc<AtomicUsize>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Serializes mutations of routes and stops.
///
/// Every mutating method enqueues an intent and returns immediately; one
/// worker task applies the intents in submission order, each as its own
/// store transaction. Nothing is reported back to the caller: observe the
/// result through [`StoreHandle::changes`], or wait for it with
/// [`flush`](Self::flush).
///
/// Cloning is cheap and every clone feeds the same queue. The worker stops
/// after [`shutdown`](Self::shutdown) or once every clone is dropped.
#[derive(Clone)]
pub struct RouteEngine {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for RouteEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEngine")
            .field("label", &self.shared.config.label)
            .field("backlog", &self.backlog())
            .finish()
    }
}

impl RouteEngine {
    /// Start an engine that reports outcomes through `tracing`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: StoreHandle, config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_sink(store, config, TracingSink)
    }

    /// Start an engine that reports every outcome to `sink`.
    pub fn with_sink(
        store: StoreHandle,
        config: EngineConfig,
        sink: impl DiagnosticSink + 'static,
    ) -> Result<Self, EngineError> {
        let runtime = Handle::try_current().map_err(|_| EngineError::NoRuntime)?;
        if store.is_closed() {
            return Err(EngineError::StoreClosed);
        }

        let sink: Arc<dyn DiagnosticSink> = Arc::new(sink);
        let backlog = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();

        let worker = EngineWorker::new(
            config.label.clone(),
            store.clone(),
            Arc::clone(&sink),
            Arc::clone(&backlog),
        );
        let join = runtime.spawn(worker.run(rx));
        info!(engine = %config.label, "Started route engine");

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                store,
                sink,
                tx,
                backlog,
                worker: Mutex::new(Some(join)),
            }),
        })
    }

    /// The store this engine writes to, for reads and change streams.
    pub fn store(&self) -> &StoreHandle {
        &self.shared.store
    }

    /// Messages submitted but not yet picked up by the worker.
    pub fn backlog(&self) -> usize {
        self.shared.backlog.load(Ordering::SeqCst)
    }

    /// Create an empty route, returning its identifier straight away.
    ///
    /// The route exists once the worker has processed the request.
    pub fn create_route(&self) -> RouteId {
        let route = RouteId::generate();
        self.submit(Intent::CreateRoute {
            route: route.clone(),
            created_at: Utc::now(),
        });
        route
    }

    /// Delete a route and all of its stops.
    pub fn delete_route(&self, route: &RouteId) {
        self.submit(Intent::DeleteRoute {
            route: route.clone(),
        });
    }

    pub fn select_stop(&self, route: &RouteId, stop: &StopId) {
        self.submit(Intent::SelectStop {
            route: route.clone(),
            stop: stop.clone(),
        });
    }

    /// Append a new stop, without looking for an existing one at the same address.
    pub fn add_stop(&self, route: &RouteId, street: impl Into<String>, city: impl Into<String>) {
        self.submit(Intent::AddStop {
            route: route.clone(),
            address: StopPrimitive::new(street, city),
        });
    }

    /// Insert candidates in one transaction.
    ///
    /// A candidate whose address matches a stop already in the route bumps
    /// that stop's count instead of adding a new one. This includes stops
    /// created by earlier candidates of the same call.
    pub fn insert(&self, route: &RouteId, candidates: impl IntoIterator<Item = StopPrimitive>) {
        self.submit(Intent::Insert {
            route: route.clone(),
            candidates: candidates.into_iter().collect(),
        });
    }

    pub fn insert_one(&self, route: &RouteId, candidate: StopPrimitive) {
        self.insert(route, [candidate]);
    }

    /// Delete one stop. If it was selected, the selection moves to its
    /// neighbour (next, else previous).
    pub fn delete_stop(&self, route: &RouteId, stop: &StopId) {
        self.submit(Intent::DeleteStop {
            route: route.clone(),
            stop: stop.clone(),
        });
    }

    /// Delete the stops at `positions` in one transaction.
    ///
    /// Positions are resolved now, against the latest committed state, so
    /// intents still queued ahead of this one are not taken into account.
    /// Out-of-range positions are ignored.
    pub fn delete_stops(&self, route: &RouteId, positions: &BTreeSet<usize>) {
        let stops = match self.shared.store.lookup_route(route) {
            Some(current) => positions
                .iter()
                .filter_map(|&idx| current.stops.get(idx).cloned())
                .collect(),
            // Left for the worker to report as missing.
            None => Vec::new(),
        };
        self.submit(Intent::DeleteStops {
            route: route.clone(),
            stops,
        });
    }

    /// Move the stops at `from` so the first of them lands where position
    /// `to` was. See [`move_positions`](crate::domain::move_positions).
    pub fn move_stops(&self, route: &RouteId, from: BTreeSet<usize>, to: usize) {
        self.submit(Intent::MoveStops {
            route: route.clone(),
            from,
            to,
        });
    }

    /// Replace the route's order. Rejected unless `order` names exactly the
    /// route's current stops.
    pub fn apply_order(&self, route: &RouteId, order: Vec<StopId>) {
        self.submit(Intent::ApplyOrder {
            route: route.clone(),
            order,
        });
    }

    /// Put the route's stops in a random order.
    pub fn shuffle(&self, route: &RouteId) {
        self.shuffle_with(route, &mut rand::thread_rng());
    }

    /// [`shuffle`](Self::shuffle) with a caller-supplied source of randomness.
    ///
    /// The permutation is drawn now from the latest committed sequence.
    pub fn shuffle_with<R: Rng + ?Sized>(&self, route: &RouteId, rng: &mut R) {
        let order = match self.shared.store.lookup_route(route) {
            Some(current) => {
                let mut order = current.stops;
                order.shuffle(rng);
                order
            }
            None => Vec::new(),
        };
        self.submit(Intent::Shuffle {
            route: route.clone(),
            order,
        });
    }

    /// Wait until every intent submitted before this call has been processed.
    ///
    /// Returns immediately if the worker has stopped.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.send(EngineMessage::Flush(done)) {
            // An error means the worker stopped, which also drains the queue.
            let _ = wait.await;
        }
    }

    /// Process everything already queued, then stop the worker.
    ///
    /// Intents submitted afterwards are reported as dropped.
    pub async fn shutdown(&self) {
        self.send(EngineMessage::Shutdown);
        let join = self
            .shared
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(join) = join
            && let Err(e) = join.await
        {
            warn!(engine = %self.shared.config.label, error = %e, "Engine worker panicked");
        }
    }

    fn submit(&self, intent: Intent) {
        debug!(kind = %intent.kind(), route = %intent.route(), "Submitting intent");
        self.send(EngineMessage::Intent(intent));
    }

    /// Queue a message. Returns whether the worker will see it.
    fn send(&self, message: EngineMessage) -> bool {
        let depth = self.shared.backlog.fetch_add(1, Ordering::SeqCst) + 1;
        if depth == self.shared.config.backlog_warning {
            warn!(
                engine = %self.shared.config.label,
                depth,
                "Intent backlog is growing"
            );
        }

        match self.shared.tx.send(message) {
            Ok(()) => true,
            Err(mpsc::error::SendError(message)) => {
                self.shared.backlog.fetch_sub(1, Ordering::SeqCst);
                if let EngineMessage::Intent(intent) = message {
                    self.shared
                        .sink
                        .report(&intent, &Outcome::Dropped(IntentError::EngineStopped));
                }
                false
            }
        }
    }
}
