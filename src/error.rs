// src/error.rs
use std::time::Duration;
use thiserror::Error;

/// Failures of an AMI session. Every variant ends the current session;
/// the supervisor decides whether to retry.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection to {endpoint} failed: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Authentication rejected: {0}")]
    Authentication(String),

    #[error("Login not answered within {0:?}")]
    HandshakeTimeout(Duration),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Block queue closed")]
    PipelineClosed,
}

impl BridgeError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, BridgeError::Authentication(_))
    }
}

/// Failures of a single outbound notification. Logged and dropped.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Timeout: request took longer than {0}ms")]
    Timeout(u64),

    #[error("HTTP error: status {0}")]
    HttpError(u16),

    #[error("Invalid receiver URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
