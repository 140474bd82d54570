//! Error types for the chime engine.

/// Top-level error type for the reminder/notification engine.
#[derive(Debug, thiserror::Error)]
pub enum ChimeError {
    /// Malformed slot time definition (not a valid `HH:MM`).
    #[error("invalid time format: {0}")]
    InvalidTimeFormat(String),

    /// Network or backend error on an external read.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    /// External alert channel rejected or is not permitted to deliver.
    #[error("alert channel not authorized: {0}")]
    AuthorizationDenied(String),

    /// Operation invoked on an engine that is not running.
    #[error("engine not running")]
    NotRunning,

    /// Persistent store read/write error.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Schedule definition error (empty slot list, duplicate keys).
    #[error("schedule error: {0}")]
    Schedule(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ChimeError>;
