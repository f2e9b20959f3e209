//! Store Configuration

use std::path::PathBuf;
use std::time::Duration;

/// Construction-time configuration for a [`Store`](crate::Store).
///
/// [`StoreConfig::storage_dir`] controls persistence: when it is `None` the
/// store is purely in-memory and the mirror layer is inert.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Interval between sweeper passes
    pub clean_interval: Duration,

    /// Directory holding the per-key mirror files; `None` disables persistence
    pub storage_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            clean_interval: Duration::from_secs(60),
            storage_dir: None,
        }
    }
}

impl StoreConfig {
    /// Create a config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sweep interval
    pub fn with_clean_interval(mut self, interval: Duration) -> Self {
        self.clean_interval = interval;
        self
    }

    /// Enable persistence, mirroring entries under `dir`
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }
}
