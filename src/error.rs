//! Error types for the disk usage exporter.
//!
//! This module defines custom error types using `thiserror` for structured
//! error handling throughout the application.

use crate::client::ResourceKind;
use thiserror::Error;

/// Main error type for exporter operations.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// A Kubernetes object does not exist, or could not be fetched
    #[error("{kind} {name:?} not found")]
    ResourceNotFound { kind: ResourceKind, name: String },

    /// Error building or using the Kubernetes API client
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] reqwest::Error),

    /// Error parsing an API response or a kernel table
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error (mount enumeration, disk usage reads)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An offloaded blocking task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Task(String),

    /// HTTP server error
    #[error("HTTP server error: {0}")]
    Server(String),
}

impl From<tokio::task::JoinError> for ExporterError {
    fn from(e: tokio::task::JoinError) -> Self {
        ExporterError::Task(e.to_string())
    }
}

/// Result type alias for exporter operations.
pub type Result<T> = std::result::Result<T, ExporterError>;
