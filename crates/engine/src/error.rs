//! Transfer error taxonomy.

/// Errors produced while transferring a single item.
///
/// Every variant is captured at the item level; a failing item never
/// aborts its siblings. A 2xx response with an unparseable body is not
/// an error at all; reconciliation downgrades it to a success with a
/// synthesized id (see [`crate::reconcile`]).
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The token supplier had no credential at send time. The transfer
    /// is failed before any request is attempted.
    #[error("no credential available")]
    AuthMissing,

    /// Transport-level failure: no HTTP response was received.
    #[error("network failure: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("server rejected upload ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// The transfer was aborted by user action.
    #[error("cancelled")]
    Cancelled,

    /// `start_all` was invoked with a concurrency limit of zero.
    #[error("concurrency limit must be at least 1, got {0}")]
    InvalidLimit(usize),

    /// Reading a file during selection failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
