//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Group id must be non-zero")]
    InvalidGroupId,

    #[error("Invite TTL must be between 1 and 365 days")]
    InvalidInviteTtl,

    #[error("Webhook URL must use HTTPS in production")]
    WebhookMustBeHttps,

    #[error("Webhook secret is required when a webhook URL is set in production")]
    WebhookSecretRequired,

    #[error("Invalid daily sweep time '{0}', expected HH:MM")]
    InvalidDailyTime(String),

    #[error("Sweep interval must be at least one second")]
    InvalidSweepInterval,
}
