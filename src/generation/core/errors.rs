//! Error types for the generation studio.

use thiserror::Error;

use crate::generation::core::ids::JobId;
use crate::generation::core::job::{JobEvent, JobState};

/// Generation subsystem error type.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Invalid configuration or unsupported values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Detailed settings out of range.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    /// A job event that the state machine does not accept.
    #[error("invalid job transition: {event:?} while {from}")]
    InvalidTransition {
        /// State the job was in.
        from: JobState,
        /// Rejected event.
        event: JobEvent,
    },
    /// The request was aborted by the user.
    #[error("generation cancelled")]
    Cancelled,
    /// The request future was dropped before the service answered.
    #[error("generation request dropped before completion")]
    Interrupted,
    /// HTTP transport error.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The generation service answered with a non-success status.
    #[error("generation service returned {status}: {body}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// URL parse error.
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Regex error.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    /// No job with that id in the registry.
    #[error("unknown job: {0}")]
    UnknownJob(JobId),
}

impl GenerationError {
    /// Whether this error is a user-initiated abort rather than a failure.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Interrupted => true,
            Self::Service { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Convenience result alias for generation operations.
pub type GenerationResult<T> = Result<T, GenerationError>;
