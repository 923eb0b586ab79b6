//! Error types for tailcast.

use thiserror::Error;

/// Tailcast error type.
///
/// Only startup and serving failures surface here. Everything that happens
/// inside the poll loop (failed stats, failed delta reads, broken observer
/// sinks) is logged and absorbed locally so the loop keeps running.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
