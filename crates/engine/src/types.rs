//! Shared types for the upload flow: config, events, and summaries.

use serde::{Deserialize, Serialize};

use convoy_store::ItemStatus;

use crate::reconcile::ServerRef;

fn default_concurrency() -> usize {
    3
}

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploaderConfig {
    /// Upload endpoint; each file is POSTed here as one multipart request.
    pub destination: String,
    /// Maximum number of concurrently uploading items.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Optional delay applied after admission, before the transfer starts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_delay_ms: Option<u64>,
}

impl UploaderConfig {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            concurrency: default_concurrency(),
            admission_delay_ms: None,
        }
    }
}

/// Event emitted while transfers run.
///
/// Per-item ordering: progress percentages are non-decreasing and the
/// terminal `StatusChanged` is the last event for that id. No ordering
/// is guaranteed across different items. Delivery is lossy when the
/// receiver lags; the store, not the event stream, is authoritative.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Progress update for an uploading item.
    Progress { local_id: String, percent: u8 },
    /// An item changed status.
    StatusChanged { local_id: String, status: ItemStatus },
    /// A `start_all` invocation finished; counts cover this run only.
    Settled { succeeded: usize, failed: usize },
}

/// A transfer that reached `Done` during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedTransfer {
    pub local_id: String,
    pub server: ServerRef,
}

/// A transfer that reached `Error` or `Cancelled` during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTransfer {
    pub local_id: String,
    pub error: String,
}

/// Partition of every item that reached a terminal state during one
/// `start_all` invocation. Items still queued when the run ends are
/// simply left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub succeeded: Vec<CompletedTransfer>,
    pub failed: Vec<FailedTransfer>,
}

/// Callback invoked once per successful reconciliation, with the local
/// id and the server-side reference it maps to.
pub type ReconcileCallback = Box<dyn Fn(&str, &ServerRef) + Send + Sync>;
