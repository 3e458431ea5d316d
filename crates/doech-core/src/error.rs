use std::time::Duration;

use thiserror::Error;

use crate::svcb::DecodeError;

/// Application-wide error types for doech.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resolver unreachable, connection failure, HTTP error status or a
    /// failing DNS response code.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// The resolver answered, but the body or an answer's presentation
    /// syntax could not be parsed.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// SVCB/HTTPS RDATA violated the wire format.
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// The browser probe failed.
    #[error("Probe error: {0}")]
    ProbeError(String),

    /// The storage collaborator rejected a batch insert.
    #[error("Sink error: {0}")]
    SinkError(String),

    /// Request exceeded its time bound.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid configuration detected before any work was dispatched.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    /// Stable category label, used in logs and serialized outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::TransportError(_) => "transport",
            AppError::MalformedResponse(_) => "malformed_response",
            AppError::DecodeError(_) => "decode",
            AppError::ProbeError(_) => "probe",
            AppError::SinkError(_) => "sink",
            AppError::Timeout(_) => "timeout",
            AppError::ConfigError(_) => "config",
            AppError::SerializationError(_) => "serialization",
            AppError::IoError(_) => "io",
        }
    }

    /// Returns true if this error means the run must not start at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::ConfigError(_))
    }

    /// Re-labels any error raised by a storage collaborator as a sink error.
    pub fn into_sink_error(self) -> AppError {
        match self {
            AppError::SinkError(_) => self,
            other => AppError::SinkError(other.to_string()),
        }
    }
}
