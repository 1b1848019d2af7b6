//! Concurrency-bounded sliding-window scheduler.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use convoy_store::ItemStatus;

use crate::error::TransferError;
use crate::task::{TaskContext, TaskOutcome, run_item};
use crate::types::{CompletedTransfer, FailedTransfer, Summary};

/// Runs every pending item under `limit` concurrent transfers.
///
/// This is a sliding-window pool, not batch-by-batch execution: one
/// task per item is spawned in selection order, and each waits on a
/// fair semaphore, so the moment any transfer reaches a terminal state
/// the next queued item is admitted. A single item's failure neither
/// cancels nor blocks its siblings.
///
/// The in-flight gauge is incremented on admission and decremented
/// exactly once per terminal transition; it can never exceed `limit`.
pub(crate) async fn run_pool(
    ctx: Arc<TaskContext>,
    limit: usize,
    admission_delay: Option<Duration>,
) -> Result<Summary, TransferError> {
    if limit < 1 {
        return Err(TransferError::InvalidLimit(limit));
    }

    // Invoking the pool is the re-attempt affordance for everything
    // still pending: failed items are re-queued here, explicitly, never
    // mid-run.
    let pending = ctx.store.pending_ids();
    for local_id in &pending {
        if ctx.store.get(local_id).map(|s| s.status) == Some(ItemStatus::Error) {
            ctx.store.retry(local_id);
            ctx.emit_status(local_id, ItemStatus::Queued);
        }
    }

    if pending.is_empty() {
        return Ok(Summary::default());
    }
    debug!(items = pending.len(), limit, "transfer pool starting");

    let semaphore = Arc::new(Semaphore::new(limit));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();

    for local_id in pending {
        let ctx = Arc::clone(&ctx);
        let semaphore = Arc::clone(&semaphore);
        let in_flight = Arc::clone(&in_flight);
        tasks.spawn(async move {
            // The semaphore is fair, so admission is FIFO by selection order.
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("pool semaphore closed");
            if let Some(delay) = admission_delay {
                tokio::time::sleep(delay).await;
            }

            let admitted = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            debug_assert!(admitted <= limit, "admission window exceeded: {admitted} > {limit}");
            let outcome = run_item(&ctx, &local_id).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
            (local_id, outcome)
        });
    }

    let mut summary = Summary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((local_id, TaskOutcome::Succeeded(server))) => {
                summary.succeeded.push(CompletedTransfer { local_id, server });
            }
            Ok((local_id, TaskOutcome::Failed(error))) => {
                summary.failed.push(FailedTransfer { local_id, error });
            }
            Ok((local_id, TaskOutcome::Cancelled)) => {
                summary.failed.push(FailedTransfer {
                    local_id,
                    error: "cancelled".into(),
                });
            }
            Ok((_, TaskOutcome::Skipped)) => {}
            Err(e) => warn!(error = %e, "transfer task panicked"),
        }
    }

    debug!(
        succeeded = summary.succeeded.len(),
        failed = summary.failed.len(),
        "transfer pool settled"
    );
    Ok(summary)
}
