//! The single consumer of an engine's queue.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use crate::store::{StoreHandle, TransactionError};

use super::apply::apply;
use super::diagnostics::DiagnosticSink;
use super::error::{IntentError, Outcome};
use super::intent::{EngineMessage, Intent};

/// Executes queued intents strictly in order, one transaction at a time.
pub(crate) struct EngineWorker {
    label: String,
    store: StoreHandle,
    sink: Arc<dyn DiagnosticSink>,

    /// Messages submitted but not yet handled. Shared with the handle.
    backlog: Arc<AtomicUsize>,
}

impl EngineWorker {
    pub(crate) fn new(
        label: String,
        store: StoreHandle,
        sink: Arc<dyn DiagnosticSink>,
        backlog: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            label,
            store,
            sink,
            backlog,
        }
    }

    /// Run until a shutdown message arrives or every handle is dropped.
    #[instrument(skip_all, fields(engine = %self.label))]
    pub(crate) async fn run(self, mut rx: mpsc::UnboundedReceiver<EngineMessage>) {
        info!("Engine worker started");
        let mut processed: u64 = 0;

        while let Some(message) = rx.recv().await {
            self.backlog.fetch_sub(1, Ordering::SeqCst);
            match message {
                EngineMessage::Intent(intent) => {
                    let outcome = self.process(&intent).await;
                    self.sink.report(&intent, &outcome);
                    processed += 1;
                }
                EngineMessage::Flush(done) => {
                    // The flusher may have given up waiting.
                    let _ = done.send(());
                }
                EngineMessage::Shutdown => {
                    debug!("Shutdown requested");
                    break;
                }
            }
        }

        // Anything that raced in behind the shutdown is refused, not lost.
        rx.close();
        while let Ok(message) = rx.try_recv() {
            self.backlog.fetch_sub(1, Ordering::SeqCst);
            match message {
                EngineMessage::Intent(intent) => self
                    .sink
                    .report(&intent, &Outcome::Dropped(IntentError::EngineStopped)),
                EngineMessage::Flush(done) => {
                    let _ = done.send(());
                }
                EngineMessage::Shutdown => {}
            }
        }

        info!(processed, "Engine worker stopped");
    }

    /// Run one intent as one transaction.
    pub(crate) async fn process(&self, intent: &Intent) -> Outcome {
        match self.store.transaction(|tx| apply(tx, intent)).await {
            Ok(()) => Outcome::Applied,
            Err(TransactionError::Aborted(reason)) => Outcome::Dropped(reason),
            Err(TransactionError::Store(e)) => Outcome::Failed(e),
        }
    }
}
