//! Persistence Module
//!
//! Write-through mirror files and startup replay.

mod mirror;

pub use mirror::{MirrorDir, MirrorRecord};
