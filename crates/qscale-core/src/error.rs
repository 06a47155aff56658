//! Error types for the controller and its collaborators.

use thiserror::Error;

use crate::types::TickOutcome;

/// Result type alias for collaborator calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Failures reported by a queue backend or platform client.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous: {0}")]
    Ambiguous(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("invalid url: {0}")]
    Url(String),
}

/// Per-tick failures. None of these stop the control loop.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("queue {queue} unavailable: {source}")]
    SampleUnavailable {
        queue: String,
        #[source]
        source: BackendError,
    },

    #[error("reading instances of {application} failed: {source}")]
    PlatformReadFailure {
        application: String,
        #[source]
        source: BackendError,
    },

    #[error("scaling {application} to {target} failed: {source}")]
    PlatformWriteFailure {
        application: String,
        target: u32,
        #[source]
        source: BackendError,
    },
}

impl ScaleError {
    /// The tick outcome this error maps to.
    pub fn outcome(&self) -> TickOutcome {
        match self {
            ScaleError::SampleUnavailable { .. } => TickOutcome::SampleUnavailable,
            ScaleError::PlatformReadFailure { .. } => TickOutcome::PlatformReadFailure,
            ScaleError::PlatformWriteFailure { .. } => TickOutcome::PlatformWriteFailure,
        }
    }
}

/// Startup configuration problems. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
