//! Injected credential capability.

use std::future::Future;
use std::pin::Pin;

/// Future returned by [`TokenSupplier::bearer_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;

/// On-demand supplier of a current bearer credential.
///
/// Implemented by the embedding application (e.g. on top of an OIDC
/// client that refreshes in the background). `None` means "not
/// authenticated": the engine fails the pending transfer with
/// [`AuthMissing`](crate::TransferError::AuthMissing) instead of
/// sending an unauthenticated request.
pub trait TokenSupplier: Send + Sync {
    fn bearer_token(&self) -> TokenFuture<'_>;
}

/// Fixed-token supplier for tests and simple deployments.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSupplier for StaticToken {
    fn bearer_token(&self) -> TokenFuture<'_> {
        Box::pin(async move { Some(self.0.clone()) })
    }
}
