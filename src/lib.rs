//! Propchat - messaging core of a property marketplace client
//!
//! This library provides the conversation and message model, the per-viewer
//! view models, date-grouped threads, the conversation list, the message
//! composer and the new-conversation flow. Persistence goes through a generic
//! document store; identity, recipient search and property listings are
//! supplied by the embedding application.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod composer;
pub mod directory;
pub mod inbox;
pub mod messaging;
pub mod new_conversation;
pub mod storage;
pub mod thread;
pub mod view;

use std::future::Future;
use std::time::Duration;

/// Result type alias for Propchat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Propchat operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage operation error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A record that was expected to exist is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// The viewer is not allowed to perform this action
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Client-side validation failed before any store call
    #[error("Validation error: {0}")]
    Validation(String),

    /// A fetch did not complete within the configured timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Recipient or property directory error
    #[error("Directory error: {0}")]
    Directory(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Initialize the Propchat library with logging
///
/// Honors `RUST_LOG`; defaults to `info`.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Run a fetch with an upper bound on its duration
///
/// The future is dropped (cancelled) when the deadline passes.
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Fetch timed out after {:?}", limit);
            Err(Error::Timeout(limit))
        }
    }
}
