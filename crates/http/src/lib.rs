//! HTTP transport for the transfer engine.
//!
//! Sends each file as one `POST` with a single-part multipart body,
//! reports byte-level progress from the request stream, and aborts
//! promptly when the item's cancel token fires.

mod client;

pub use client::HttpTransport;
