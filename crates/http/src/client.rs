//! reqwest-backed `Transport` implementation.

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::multipart;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use convoy_engine::{Transport, TransportFuture, TransportReply, TransferError, UploadRequest};

/// Granularity of the progress-reporting request stream.
const PROGRESS_CHUNK: usize = 64 * 1024;

/// Multipart upload transport over reqwest.
///
/// Timeouts are deliberately not configured here; build your own
/// `reqwest::Client` with `Client::builder().timeout(..)` and pass it
/// to [`with_client`](Self::with_client) if the deployment needs
/// stall detection.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    /// Creates a transport with a default client.
    pub fn new() -> Result<Self, TransferError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransferError::Network(e.to_string()))?;
        Ok(Self { http })
    }

    /// Creates a transport over a caller-configured client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl Transport for HttpTransport {
    fn send(
        &self,
        req: UploadRequest,
        progress: mpsc::Sender<u8>,
        cancel: CancellationToken,
    ) -> TransportFuture<'_> {
        Box::pin(async move {
            let total = req.data.len();
            let body = reqwest::Body::wrap_stream(progress_stream(
                req.data.clone(),
                total,
                progress,
            ));
            let part = multipart::Part::stream_with_length(body, total as u64)
                .file_name(req.file_name.clone())
                .mime_str(&req.content_type)
                .map_err(|e| TransferError::Network(e.to_string()))?;
            let form = multipart::Form::new().part("file", part);

            let mut request = self.http.post(&req.destination).multipart(form);
            if let Some(token) = &req.bearer {
                request = request.bearer_auth(token);
            }

            debug!(file = %req.file_name, bytes = total, "uploading");
            let send = async {
                let resp = request
                    .send()
                    .await
                    .map_err(|e| TransferError::Network(e.to_string()))?;
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                Ok(TransportReply { status, body })
            };

            // Dropping the in-flight request future aborts the connection;
            // the engine's state machine has already flipped the item.
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(file = %req.file_name, "upload aborted");
                    Err(TransferError::Cancelled)
                }
                reply = send => reply,
            }
        })
    }
}

/// Splits the payload into fixed-size chunks and reports cumulative
/// percent as each chunk is handed to the connection. Delivery is
/// lossy (`try_send`); the engine emits the terminal 100% itself.
fn progress_stream(
    data: Bytes,
    total: usize,
    progress: mpsc::Sender<u8>,
) -> impl futures_util::Stream<Item = Result<Bytes, std::io::Error>> + Send {
    let chunks = split_chunks(data, PROGRESS_CHUNK);
    let mut sent = 0usize;
    futures_util::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len();
        let _ = progress.try_send(percent(sent, total));
        Ok(chunk)
    })
}

/// Zero-copy chunking via `Bytes::slice`.
fn split_chunks(data: Bytes, chunk_size: usize) -> Vec<Bytes> {
    let mut chunks = Vec::with_capacity(data.len().div_ceil(chunk_size.max(1)));
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + chunk_size).min(data.len());
        chunks.push(data.slice(offset..end));
        offset = end;
    }
    chunks
}

fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent as u64 * 100) / total as u64).min(100) as u8
}
