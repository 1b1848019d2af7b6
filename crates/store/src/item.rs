//! Data model for a single file transfer.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifecycle state of a transfer item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Queued,
    Uploading,
    Done,
    Error,
    Cancelled,
}

impl ItemStatus {
    /// Returns true for states an item can never leave on its own.
    ///
    /// `Error` is terminal for the scheduler but can be re-queued by an
    /// explicit retry.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancelled)
    }
}

/// A file staged for upload: name, content type, and immutable bytes.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl FilePayload {
    /// Creates a payload. `data` is taken as-is; `Bytes` keeps clones cheap.
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// One file awaiting, undergoing, or having completed transfer.
///
/// Fields with presence invariants (`server_id` iff `Done`, `error` iff
/// `Error`, cancel token iff `Uploading`) are private; the transition
/// methods are the only mutators and refuse wrong-state transitions, so
/// the invariants hold by construction.
#[derive(Debug)]
pub struct TransferItem {
    local_id: String,
    payload: FilePayload,
    status: ItemStatus,
    progress: u8,
    server_id: Option<String>,
    error: Option<String>,
    cancel: Option<CancellationToken>,
}

impl TransferItem {
    /// Creates a queued item with a freshly generated local id.
    ///
    /// The id embeds name and size for log readability; the uuid suffix
    /// makes it unique even for identical selections.
    pub fn new(payload: FilePayload) -> Self {
        let local_id = format!("{}-{}-{}", payload.name, payload.size(), Uuid::new_v4());
        Self {
            local_id,
            payload,
            status: ItemStatus::Queued,
            progress: 0,
            server_id: None,
            error: None,
            cancel: None,
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn payload(&self) -> &FilePayload {
        &self.payload
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    /// Progress percentage. 0 outside `Uploading`/`Done`, 100 on `Done`.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn cancel_token(&self) -> Option<&CancellationToken> {
        self.cancel.as_ref()
    }

    /// `Queued` → `Uploading`, attaching the live cancel token.
    /// Returns false (and changes nothing) from any other state.
    pub(crate) fn begin_upload(&mut self, cancel: CancellationToken) -> bool {
        if self.status != ItemStatus::Queued {
            return false;
        }
        self.status = ItemStatus::Uploading;
        self.progress = 0;
        self.cancel = Some(cancel);
        true
    }

    /// Advances progress while `Uploading`. Regressions are ignored so
    /// reported progress is monotonically non-decreasing; values above
    /// 100 are clamped. Returns the effective value when applied.
    pub(crate) fn set_progress(&mut self, percent: u8) -> Option<u8> {
        if self.status != ItemStatus::Uploading {
            return None;
        }
        let percent = percent.min(100);
        if percent > self.progress {
            self.progress = percent;
        }
        Some(self.progress)
    }

    /// `Uploading` → `Done`, recording the reconciled server id and
    /// forcing progress to 100.
    pub(crate) fn complete(&mut self, server_id: impl Into<String>) -> bool {
        if self.status != ItemStatus::Uploading {
            return false;
        }
        self.status = ItemStatus::Done;
        self.progress = 100;
        self.server_id = Some(server_id.into());
        self.cancel = None;
        true
    }

    /// `Uploading` → `Error` with a human-readable cause.
    pub(crate) fn fail(&mut self, cause: impl Into<String>) -> bool {
        if self.status != ItemStatus::Uploading {
            return false;
        }
        self.status = ItemStatus::Error;
        self.progress = 0;
        self.error = Some(cause.into());
        self.cancel = None;
        true
    }

    /// `Uploading` → `Cancelled`. The caller is responsible for firing
    /// the cancel token first; this only flips the visible state.
    pub(crate) fn mark_cancelled(&mut self) -> bool {
        if self.status != ItemStatus::Uploading {
            return false;
        }
        self.status = ItemStatus::Cancelled;
        self.progress = 0;
        self.cancel = None;
        true
    }

    /// `Error` → `Queued`, discarding the stored cause.
    pub(crate) fn reset_for_retry(&mut self) -> bool {
        if self.status != ItemStatus::Error {
            return false;
        }
        self.status = ItemStatus::Queued;
        self.progress = 0;
        self.error = None;
        true
    }
}

/// Read-only view of an item, safe to hand to callers and UIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSnapshot {
    pub local_id: String,
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub status: ItemStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&TransferItem> for ItemSnapshot {
    fn from(item: &TransferItem) -> Self {
        Self {
            local_id: item.local_id.clone(),
            name: item.payload.name.clone(),
            content_type: item.payload.content_type.clone(),
            size: item.payload.size(),
            status: item.status,
            progress: item.progress,
            server_id: item.server_id.clone(),
            error: item.error.clone(),
        }
    }
}
