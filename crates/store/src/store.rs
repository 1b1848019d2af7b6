//! The authoritative item state store.

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::item::{FilePayload, ItemSnapshot, ItemStatus, TransferItem};

/// Insertion-ordered store of transfer items, keyed by local id.
///
/// Items are held in an arena that is never reordered, so snapshot
/// order is always selection order. All operations are total: a
/// missing local id or a wrong-state transition is a no-op: the UI may
/// remove an item in the same instant a network callback reports its
/// completion, and neither side may corrupt the other.
///
/// The inner mutex is never held across an await point; every
/// operation is a short synchronous critical section.
#[derive(Debug, Default)]
pub struct ItemStore {
    items: Mutex<Vec<TransferItem>>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a newly selected file as a `Queued` item and returns its view.
    pub fn insert(&self, payload: FilePayload) -> ItemSnapshot {
        let item = TransferItem::new(payload);
        let snap = ItemSnapshot::from(&item);
        debug!(local_id = %snap.local_id, size = snap.size, "item queued");
        self.items.lock().unwrap().push(item);
        snap
    }

    /// Returns the current snapshot of all items in selection order.
    pub fn snapshot(&self) -> Vec<ItemSnapshot> {
        self.items.lock().unwrap().iter().map(ItemSnapshot::from).collect()
    }

    /// Returns one item's view, if it exists.
    pub fn get(&self, local_id: &str) -> Option<ItemSnapshot> {
        let items = self.items.lock().unwrap();
        items.iter().find(|i| i.local_id() == local_id).map(ItemSnapshot::from)
    }

    /// Returns a clone of an item's payload. `Bytes` makes this cheap.
    pub fn payload(&self, local_id: &str) -> Option<FilePayload> {
        let items = self.items.lock().unwrap();
        items
            .iter()
            .find(|i| i.local_id() == local_id)
            .map(|i| i.payload().clone())
    }

    /// Ids of items a scheduler run should attempt, in selection order:
    /// everything currently `Queued` or `Error` (already-done items are
    /// never re-sent).
    pub fn pending_ids(&self) -> Vec<String> {
        let items = self.items.lock().unwrap();
        items
            .iter()
            .filter(|i| matches!(i.status(), ItemStatus::Queued | ItemStatus::Error))
            .map(|i| i.local_id().to_string())
            .collect()
    }

    /// Number of items currently `Uploading`.
    pub fn uploading_count(&self) -> usize {
        let items = self.items.lock().unwrap();
        items.iter().filter(|i| i.status() == ItemStatus::Uploading).count()
    }

    /// Mean per-item progress across all items, 0 when empty.
    pub fn overall_progress(&self) -> u8 {
        let items = self.items.lock().unwrap();
        if items.is_empty() {
            return 0;
        }
        let sum: u64 = items.iter().map(|i| u64::from(i.progress())).sum();
        (sum / items.len() as u64) as u8
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Admits a `Queued` item: transitions it to `Uploading` and returns
    /// the freshly attached cancel token. `None` means the item is gone
    /// or no longer queued (removed or cancelled since scheduling) and
    /// must be skipped.
    pub fn begin_upload(&self, local_id: &str) -> Option<CancellationToken> {
        let mut items = self.items.lock().unwrap();
        let item = items.iter_mut().find(|i| i.local_id() == local_id)?;
        let token = CancellationToken::new();
        if item.begin_upload(token.clone()) {
            debug!(local_id, "item admitted");
            Some(token)
        } else {
            None
        }
    }

    /// Records transfer progress. Returns the new snapshot; regressions
    /// and reports for non-uploading items are ignored.
    pub fn set_progress(&self, local_id: &str, percent: u8) -> Vec<ItemSnapshot> {
        {
            let mut items = self.items.lock().unwrap();
            if let Some(item) = items.iter_mut().find(|i| i.local_id() == local_id) {
                item.set_progress(percent);
            }
        }
        self.snapshot()
    }

    /// Marks an uploading item `Done` with its reconciled server id.
    /// Returns whether the transition applied; false means the item
    /// was cancelled or removed while the response was in flight, and
    /// the caller must not report a success for it.
    pub fn complete(&self, local_id: &str, server_id: &str) -> bool {
        let mut items = self.items.lock().unwrap();
        let Some(item) = items.iter_mut().find(|i| i.local_id() == local_id) else {
            return false;
        };
        let applied = item.complete(server_id);
        if applied {
            debug!(local_id, server_id, "item done");
        }
        applied
    }

    /// Marks an uploading item `Error` with a cause. Returns whether
    /// the transition applied.
    pub fn fail(&self, local_id: &str, cause: &str) -> bool {
        let mut items = self.items.lock().unwrap();
        let Some(item) = items.iter_mut().find(|i| i.local_id() == local_id) else {
            return false;
        };
        let applied = item.fail(cause);
        if applied {
            debug!(local_id, cause, "item failed");
        }
        applied
    }

    /// Cancels an uploading item: fires its cancel token so the
    /// transport aborts, and flips the visible state to `Cancelled`
    /// immediately. The in-flight task's later terminal report finds
    /// the item no longer `Uploading` and is ignored, which makes a
    /// second cancel (or a cancel racing a completion) a no-op.
    pub fn cancel(&self, local_id: &str) -> Vec<ItemSnapshot> {
        {
            let mut items = self.items.lock().unwrap();
            if let Some(item) = items.iter_mut().find(|i| i.local_id() == local_id) {
                if let Some(token) = item.cancel_token() {
                    token.cancel();
                }
                if item.mark_cancelled() {
                    debug!(local_id, "item cancelled");
                }
            }
        }
        self.snapshot()
    }

    /// Re-queues a failed item, discarding its error. A no-op for any
    /// status other than `Error`.
    pub fn retry(&self, local_id: &str) -> Vec<ItemSnapshot> {
        {
            let mut items = self.items.lock().unwrap();
            if let Some(item) = items.iter_mut().find(|i| i.local_id() == local_id)
                && item.reset_for_retry()
            {
                debug!(local_id, "item re-queued");
            }
        }
        self.snapshot()
    }

    /// Deletes an item. An uploading item is cancelled first, so no
    /// orphaned transfer keeps mutating a deleted entry.
    pub fn remove(&self, local_id: &str) -> Vec<ItemSnapshot> {
        {
            let mut items = self.items.lock().unwrap();
            if let Some(pos) = items.iter().position(|i| i.local_id() == local_id) {
                if let Some(token) = items[pos].cancel_token() {
                    token.cancel();
                }
                items.remove(pos);
                debug!(local_id, "item removed");
            }
        }
        self.snapshot()
    }

    /// Empties the store, cancelling anything still in flight.
    pub fn clear(&self) -> Vec<ItemSnapshot> {
        let mut items = self.items.lock().unwrap();
        for item in items.iter() {
            if let Some(token) = item.cancel_token() {
                token.cancel();
            }
        }
        let removed = items.len();
        items.clear();
        debug!(removed, "store cleared");
        Vec::new()
    }
}
