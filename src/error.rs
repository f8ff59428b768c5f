//! Error types for Agent Desk.

use reqwest::StatusCode;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Acceptance error: {0}")]
    Accept(#[from] AcceptError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors reported by the job-routing service, kept distinguishable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    /// The offer expired or another worker already claimed it.
    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Routing service unavailable (HTTP {status}): {reason}")]
    Unavailable { status: u16, reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Map a non-success HTTP status to an error kind.
    pub fn from_status(status: StatusCode, resource: &str, body: &str) -> Self {
        let reason = if body.is_empty() {
            status.to_string()
        } else {
            format!("{status}: {body}")
        };
        match status {
            StatusCode::NOT_FOUND => Self::NotFound {
                resource: resource.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized { reason },
            StatusCode::CONFLICT | StatusCode::GONE | StatusCode::PRECONDITION_FAILED => {
                Self::Conflict { reason }
            }
            _ => Self::Unavailable {
                status: status.as_u16(),
                reason,
            },
        }
    }

    /// Whether the next poll tick may reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Unavailable { .. })
    }

    /// HTTP status the bridge answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Unavailable { .. } | Self::Transport(_) | Self::InvalidResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Terminal failures of one acceptance attempt.
#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    #[error("Failed to fetch detail for job {job_id}: {source}")]
    DetailFetchFailed {
        job_id: String,
        #[source]
        source: GatewayError,
    },

    /// The offer may already be consumed server-side; re-poll instead of retrying.
    #[error("Failed to accept offer {offer_id}: {source}")]
    AcceptFailed {
        offer_id: String,
        #[source]
        source: GatewayError,
    },

    #[error("Worker {worker_id} already has an acceptance in flight")]
    AcceptanceInProgress { worker_id: String },

    #[error("Offer {offer_id} is not on the board")]
    UnknownOffer { offer_id: String },
}

/// Worker session errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Worker {worker_id} could not be registered")]
    RegistrationRejected { worker_id: String },

    #[error("Worker {worker_id} is not registered")]
    NotRegistered { worker_id: String },

    #[error(transparent)]
    Accept(#[from] AcceptError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
