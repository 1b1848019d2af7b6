//! Per-item transfer task execution.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use convoy_store::{ItemStatus, ItemStore};

use crate::error::TransferError;
use crate::reconcile::{ServerRef, reconcile};
use crate::token::TokenSupplier;
use crate::transport::{Transport, UploadRequest};
use crate::types::{ReconcileCallback, TransferEvent};

/// Everything a transfer task needs, shared across the pool.
pub(crate) struct TaskContext {
    pub store: Arc<ItemStore>,
    pub transport: Arc<dyn Transport>,
    pub tokens: Option<Arc<dyn TokenSupplier>>,
    pub events: mpsc::Sender<TransferEvent>,
    pub destination: String,
    pub on_reconciled: Arc<Mutex<Vec<ReconcileCallback>>>,
}

impl TaskContext {
    /// Events are advisory; the store is authoritative. `try_send` keeps
    /// a lagging (or absent) receiver from stalling transfers.
    pub(crate) fn emit(&self, event: TransferEvent) {
        let _ = self.events.try_send(event);
    }

    pub(crate) fn emit_status(&self, local_id: &str, status: ItemStatus) {
        self.emit(TransferEvent::StatusChanged {
            local_id: local_id.to_string(),
            status,
        });
    }
}

/// Terminal outcome of one task, as seen by the scheduler.
pub(crate) enum TaskOutcome {
    Succeeded(ServerRef),
    Failed(String),
    Cancelled,
    /// The item was no longer admissible (removed or already handled);
    /// it does not appear in the run summary.
    Skipped,
}

/// Executes one admitted item end to end: credential, transfer,
/// progress forwarding, outcome classification. Never retries.
pub(crate) async fn run_item(ctx: &TaskContext, local_id: &str) -> TaskOutcome {
    let Some(cancel) = ctx.store.begin_upload(local_id) else {
        debug!(local_id, "skipping admission: no longer queued");
        return TaskOutcome::Skipped;
    };
    ctx.emit_status(local_id, ItemStatus::Uploading);

    let Some(payload) = ctx.store.payload(local_id) else {
        return TaskOutcome::Skipped;
    };

    // Credential first: an absent credential fails the item without a
    // request ever being attempted.
    let bearer = match &ctx.tokens {
        Some(supplier) => match supplier.bearer_token().await {
            Some(token) => Some(token),
            None => return fail_item(ctx, local_id, TransferError::AuthMissing.to_string()),
        },
        None => None,
    };

    // Forward transport progress into the store. The channel closes when
    // the transport drops its sender, so the forwarder always finishes
    // before the terminal event below.
    let (progress_tx, mut progress_rx) = mpsc::channel::<u8>(64);
    let forwarder = {
        let store = Arc::clone(&ctx.store);
        let events = ctx.events.clone();
        let local_id = local_id.to_string();
        tokio::spawn(async move {
            while let Some(percent) = progress_rx.recv().await {
                let snaps = store.set_progress(&local_id, percent);
                if let Some(snap) = snaps.iter().find(|s| s.local_id == local_id)
                    && snap.status == ItemStatus::Uploading
                {
                    let _ = events.try_send(TransferEvent::Progress {
                        local_id: local_id.clone(),
                        percent: snap.progress,
                    });
                }
            }
        })
    };

    let req = UploadRequest {
        destination: ctx.destination.clone(),
        file_name: payload.name.clone(),
        content_type: payload.content_type.clone(),
        data: payload.data.clone(),
        bearer,
    };
    debug!(local_id, size = payload.size(), "transfer started");
    let result = ctx.transport.send(req, progress_tx, cancel.clone()).await;
    let _ = forwarder.await;

    match result {
        Ok(reply) if reply.is_success() => {
            let server = reconcile(local_id, &payload.name, &reply.body);
            if ctx.store.complete(local_id, &server.id) {
                ctx.emit(TransferEvent::Progress {
                    local_id: local_id.to_string(),
                    percent: 100,
                });
                ctx.emit_status(local_id, ItemStatus::Done);
                for cb in ctx.on_reconciled.lock().unwrap().iter() {
                    cb(local_id, &server);
                }
                TaskOutcome::Succeeded(server)
            } else {
                // Cancelled or removed while the response was in flight.
                TaskOutcome::Cancelled
            }
        }
        Ok(reply) => {
            let cause = TransferError::Rejected {
                status: reply.status,
                body: reply.body,
            }
            .to_string();
            fail_item(ctx, local_id, cause)
        }
        Err(TransferError::Cancelled) => {
            // Normally the store already flipped the item when the cancel
            // was requested; flip it here if the transport aborted on its own.
            if ctx.store.get(local_id).map(|s| s.status) == Some(ItemStatus::Uploading) {
                ctx.store.cancel(local_id);
                ctx.emit_status(local_id, ItemStatus::Cancelled);
            }
            debug!(local_id, "transfer aborted");
            TaskOutcome::Cancelled
        }
        Err(e) => fail_item(ctx, local_id, e.to_string()),
    }
}

fn fail_item(ctx: &TaskContext, local_id: &str, cause: String) -> TaskOutcome {
    if ctx.store.fail(local_id, &cause) {
        warn!(local_id, error = %cause, "transfer failed");
        ctx.emit_status(local_id, ItemStatus::Error);
        TaskOutcome::Failed(cause)
    } else {
        // The failure lost a race against cancel/remove; the visible
        // state already says cancelled (or the entry is gone).
        TaskOutcome::Cancelled
    }
}
