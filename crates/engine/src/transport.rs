//! Transport seam between the engine and the wire.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TransferError;

/// One single-request upload: payload, destination, and credential.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub destination: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
    /// Sent as `Authorization: Bearer <token>` when present.
    pub bearer: Option<String>,
}

/// The destination's answer, success or not.
#[derive(Debug, Clone)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

impl TransportReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Future returned by [`Transport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransportReply, TransferError>> + Send + 'a>>;

/// A request-response upload transport.
///
/// Contract:
/// - Any HTTP response, 2xx or not, is `Ok`; status classification is
///   the engine's job, not the transport's.
/// - `Err(Network)` only for transport-level failures (no response),
///   `Err(Cancelled)` when `cancel` fired and the request was aborted.
/// - Byte-level progress is reported as 0–100 percent over `progress`;
///   lossy delivery is fine (the channel may be sent to with
///   `try_send`), and a transport that cannot observe bytes may skip
///   reporting entirely; the engine emits the terminal 100% on
///   success itself.
///
/// The trait keeps scheduling logic decoupled from the wire and
/// testable with scripted mocks.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        req: UploadRequest,
        progress: mpsc::Sender<u8>,
        cancel: CancellationToken,
    ) -> TransportFuture<'_>;
}
