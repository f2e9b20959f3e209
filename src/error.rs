//! Error Types
//!
//! Missing or expired keys are absence, not errors: `get` returns `Option`
//! and `delete` on an absent key is a no-op. Errors here are the persistence
//! failures a caller relying on durability must observe.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures surfaced by store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The mirror file for a key could not be written. The in-memory entry
    /// has already been updated, so memory and disk are inconsistent until
    /// corrected; callers that require durability must treat this as fatal
    /// to the operation.
    #[error("failed to write mirror file for key `{key}`")]
    PersistenceWrite {
        key: String,
        #[source]
        source: io::Error,
    },

    /// The mirror file for a key could not be removed. A file that is
    /// already absent does not produce this error.
    #[error("failed to remove mirror file for key `{key}`")]
    PersistenceDelete {
        key: String,
        #[source]
        source: io::Error,
    },

    /// The value for a key could not be encoded for its mirror file
    #[error("failed to serialize value for key `{key}`")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The storage directory could not be created or listed
    #[error("storage directory error at `{}`", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
