//! Transfer item state: the data model for queued uploads and the
//! authoritative store mapping local ids to item status, progress,
//! and errors.
//!
//! The store is the single piece of shared mutable state in the
//! engine. Every mutation is a total, synchronous transform of the
//! previous snapshot: a missing id or a wrong-state transition is a
//! no-op, never a panic.

mod item;
mod store;

pub use item::{FilePayload, ItemSnapshot, ItemStatus, TransferItem};
pub use store::ItemStore;
