//! In-process key-value store with per-entry TTL expiration and an optional
//! write-through persistence layer.
//!
//! Every entry carries an absolute expiry deadline computed when it is set.
//! Reads check the deadline lazily; a background sweeper periodically evicts
//! entries whose deadline has passed. When a storage directory is configured,
//! each entry is mirrored to its own file and replayed at startup, so the
//! store's contents survive process restarts.

pub mod config;
pub mod error;
pub mod persistence;
pub mod storage;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use persistence::{MirrorDir, MirrorRecord};
pub use storage::{Store, NEVER_EXPIRES};
