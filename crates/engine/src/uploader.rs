//! Caller-facing upload facade.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info};

use convoy_store::{FilePayload, ItemSnapshot, ItemStatus, ItemStore};

use crate::error::TransferError;
use crate::scheduler::run_pool;
use crate::task::TaskContext;
use crate::token::TokenSupplier;
use crate::transport::Transport;
use crate::types::{ReconcileCallback, Summary, TransferEvent, UploaderConfig};

/// Bulk upload engine: owns the item store, drives the pool, and
/// exposes the user actions (select, start, cancel, retry, remove,
/// clear).
///
/// All user actions are synchronous, total mutations of the store and
/// return its new snapshot. `start_all` is the only long-running call;
/// it can safely overlap user actions on other tasks.
pub struct Uploader {
    config: UploaderConfig,
    store: Arc<ItemStore>,
    transport: Arc<dyn Transport>,
    tokens: Option<Arc<dyn TokenSupplier>>,
    events_tx: mpsc::Sender<TransferEvent>,
    events_rx: Option<mpsc::Receiver<TransferEvent>>,
    on_reconciled: Arc<Mutex<Vec<ReconcileCallback>>>,
}

impl Uploader {
    /// Creates an uploader over the given transport.
    pub fn new(config: UploaderConfig, transport: Arc<dyn Transport>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            config,
            store: Arc::new(ItemStore::new()),
            transport,
            tokens: None,
            events_tx,
            events_rx: Some(events_rx),
            on_reconciled: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Injects the credential capability. Without one, requests are
    /// sent unauthenticated.
    pub fn with_token_supplier(mut self, tokens: Arc<dyn TokenSupplier>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events_rx.take()
    }

    /// Registers a callback invoked once per successful reconciliation.
    pub fn on_reconciled(&self, callback: ReconcileCallback) {
        self.on_reconciled.lock().unwrap().push(callback);
    }

    /// Stages an in-memory payload as a queued item.
    pub fn select(&self, payload: FilePayload) -> ItemSnapshot {
        self.store.insert(payload)
    }

    /// Stages a file from disk, guessing its content type from the
    /// extension.
    pub async fn select_path(&self, path: impl AsRef<Path>) -> Result<ItemSnapshot, TransferError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let content_type = mime_guess::from_path(path)
            .first_raw()
            .unwrap_or("application/octet-stream");
        debug!(name, content_type, size = data.len(), "file selected");
        Ok(self.store.insert(FilePayload::new(name, content_type, data)))
    }

    /// Uploads everything pending (queued and previously failed items)
    /// under the configured concurrency limit and returns the partition
    /// of terminal outcomes. Items still queued afterwards (selected
    /// mid-run) are untouched; call again to send them.
    pub async fn start_all(&self) -> Result<Summary, TransferError> {
        let ctx = Arc::new(TaskContext {
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
            tokens: self.tokens.clone(),
            events: self.events_tx.clone(),
            destination: self.config.destination.clone(),
            on_reconciled: Arc::clone(&self.on_reconciled),
        });
        let delay = self.config.admission_delay_ms.map(Duration::from_millis);

        let summary = run_pool(ctx, self.config.concurrency, delay).await?;
        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "all transfers settled"
        );
        let _ = self.events_tx.try_send(TransferEvent::Settled {
            succeeded: summary.succeeded.len(),
            failed: summary.failed.len(),
        });
        Ok(summary)
    }

    /// Cancels an in-flight transfer. Idempotent; a no-op for items not
    /// currently uploading.
    pub fn cancel(&self, local_id: &str) -> Vec<ItemSnapshot> {
        let was_uploading =
            self.store.get(local_id).map(|s| s.status) == Some(ItemStatus::Uploading);
        let snaps = self.store.cancel(local_id);
        if was_uploading
            && let Some(snap) = snaps.iter().find(|s| s.local_id == local_id)
            && snap.status == ItemStatus::Cancelled
        {
            let _ = self.events_tx.try_send(TransferEvent::StatusChanged {
                local_id: local_id.to_string(),
                status: ItemStatus::Cancelled,
            });
        }
        snaps
    }

    /// Re-queues a failed item. A no-op for any other status.
    pub fn retry(&self, local_id: &str) -> Vec<ItemSnapshot> {
        let was_error = self.store.get(local_id).map(|s| s.status) == Some(ItemStatus::Error);
        let snaps = self.store.retry(local_id);
        if was_error
            && let Some(snap) = snaps.iter().find(|s| s.local_id == local_id)
            && snap.status == ItemStatus::Queued
        {
            let _ = self.events_tx.try_send(TransferEvent::StatusChanged {
                local_id: local_id.to_string(),
                status: ItemStatus::Queued,
            });
        }
        snaps
    }

    /// Deletes an item, aborting its transfer first if in flight.
    pub fn remove(&self, local_id: &str) -> Vec<ItemSnapshot> {
        self.store.remove(local_id)
    }

    /// Empties the list, aborting anything in flight.
    pub fn clear(&self) -> Vec<ItemSnapshot> {
        self.store.clear()
    }

    /// Current snapshot of all items in selection order.
    pub fn snapshot(&self) -> Vec<ItemSnapshot> {
        self.store.snapshot()
    }

    /// One item's view.
    pub fn get(&self, local_id: &str) -> Option<ItemSnapshot> {
        self.store.get(local_id)
    }

    /// Mean progress across all items.
    pub fn overall_progress(&self) -> u8 {
        self.store.overall_progress()
    }
}
