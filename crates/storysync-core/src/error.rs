//! Error types shared across the engine.
//!
//! Network failures live in [`crate::api::ApiError`]; everything else that a
//! handler can fail with is defined here and folds into [`EngineError`].

use thiserror::Error;

use crate::api::ApiError;

/// Failure reported by a host platform capability (push service, client
/// windows, notification display).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PlatformError(pub String);

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The durable outbox could not complete a transaction.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Outbox database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to create outbox directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Outbox lock poisoned")]
    Poisoned,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache store is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid cache store name: {0}")]
    InvalidName(String),

    #[error("Cache store lock poisoned")]
    Poisoned,
}

/// Push subscription changes that did not go through. These are reported to
/// foreground contexts as events, never retried.
#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("Invalid application server key: {0}")]
    InvalidKey(String),

    #[error("Push service rejected the request: {0}")]
    Platform(#[from] PlatformError),

    #[error("Notification endpoint rejected the request: {0}")]
    Registration(#[from] ApiError),

    #[error("Push subscription change already in progress")]
    InProgress,
}

/// Malformed inbound data. Always degraded by the caller, never fatal.
#[derive(Error, Debug)]
pub enum PayloadDecodeError {
    #[error("Not a data URL: {0}")]
    InvalidDataUrl(String),

    #[error("Invalid base64 data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error returned by an engine event handler.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Handler task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
