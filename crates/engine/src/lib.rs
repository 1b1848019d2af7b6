//! Client-side bulk file transfer engine.
//!
//! Takes a user-selected set of files, uploads each to a remote
//! endpoint under a bounded concurrency limit, tracks per-file
//! progress, supports cancellation and retry of individual transfers,
//! and reconciles each locally-generated id with the id the server
//! assigns on success.
//!
//! The engine is transport-agnostic: it drives any [`Transport`]
//! implementation (see `convoy-http` for the reqwest one) and obtains
//! credentials from an injected [`TokenSupplier`] capability; there
//! is no ambient auth state.

mod error;
mod reconcile;
mod scheduler;
mod task;
mod token;
mod transport;
mod types;
mod uploader;

pub use convoy_store::{FilePayload, ItemSnapshot, ItemStatus, ItemStore};
pub use error::TransferError;
pub use reconcile::{ServerRef, reconcile};
pub use token::{StaticToken, TokenFuture, TokenSupplier};
pub use transport::{Transport, TransportFuture, TransportReply, UploadRequest};
pub use types::{
    CompletedTransfer, FailedTransfer, ReconcileCallback, Summary, TransferEvent, UploaderConfig,
};
pub use uploader::Uploader;
