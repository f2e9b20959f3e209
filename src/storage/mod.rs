//! Storage Engine
//!
//! Key-value map with TTL metadata and the background sweeper.

mod entry;
mod store;
mod sweeper;

pub use entry::NEVER_EXPIRES;
pub use store::Store;
