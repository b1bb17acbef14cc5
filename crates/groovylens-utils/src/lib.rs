//! Shared utilities for the groovylens workspace
//!
//! Keeps the pieces that are useful outside the analysis core and carry no
//! heavy dependencies:
//!
//! - **File watching**: debounced file system monitoring (`file-watcher`
//!   feature, enabled by default)
//! - **Error handling**: small error types for utility operations

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;

#[cfg(feature = "file-watcher")]
pub mod watcher;

pub use error::{Error, Result};

#[cfg(feature = "file-watcher")]
pub use watcher::{FileWatcher, WatchEvent, WatchKind};
