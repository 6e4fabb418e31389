//! SPV bitcoin backend for Core Lightning.
//!
//! The [`sync::SyncCoordinator`] waits for the chain client to be
//! current, then [`backend::SpvBackend`] serves the backend queries
//! of the lightning node.
pub mod backend;
pub mod fees;
pub mod jsonrpc;
pub mod sync;

pub use backend::SpvBackend;
pub use sync::{SyncCoordinator, SyncOptions, SyncState, Synced};
