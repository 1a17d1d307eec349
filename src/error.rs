//! Error types for channel-digest.
//!
//! This module defines all error types used throughout the service.

use thiserror::Error;

/// Main error type for channel-digest operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Report pipeline errors
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    /// Slack channel errors
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Report store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Gateway (HTTP server) errors
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for channel-digest.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a report run.
#[derive(Error, Debug)]
pub enum ReportError {
    /// The history or channel-info source failed or answered `ok: false`.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Persisting the daily row failed.
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Posting the summary failed.
    #[error("Delivery failure: {0}")]
    DeliveryFailure(String),

    #[error("Report run timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("A report run is already in progress for {key}")]
    RunInProgress { key: String },
}

impl ReportError {
    /// Short, human-readable text suitable for posting back to a requester.
    ///
    /// Carries no upstream error detail.
    pub fn user_summary(&self) -> &'static str {
        match self {
            ReportError::SourceUnavailable(_) => "could not read channel history from Slack",
            ReportError::StorageFailure(_) => "could not save the report",
            ReportError::DeliveryFailure(_) => "could not post the report",
            ReportError::Timeout { .. } => "the report took too long and was cancelled",
            ReportError::RunInProgress { .. } => "a report for today is already being generated",
        }
    }
}

/// Errors related to the Slack Web API.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Slack answered with `ok: false`.
    #[error("Slack API error in {method}: {error}")]
    Api { method: String, error: String },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Rate limited, retry after {retry_after}ms")]
    RateLimited { retry_after: u64 },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request signature: {0}")]
    SignatureInvalid(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        ChannelError::Http(err.to_string())
    }
}

/// Errors related to the report store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Report store is not configured")]
    NotConfigured,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Query failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Connect(err.to_string())
            }
            other => StoreError::Query(other.to_string()),
        }
    }
}

/// Errors related to the cron scheduler.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler not running")]
    NotRunning,

    #[error("Failed to create scheduler: {0}")]
    CreationFailed(String),

    #[error("Failed to register job: {0}")]
    JobRegistrationFailed(String),

    #[error("Failed to start scheduler: {0}")]
    StartFailed(String),

    #[error("Failed to stop scheduler: {0}")]
    StopFailed(String),
}

/// Errors related to the HTTP gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

/// Errors related to Configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Invalid config value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required config: {0}")]
    MissingRequired(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}
