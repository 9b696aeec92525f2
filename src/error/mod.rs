//! Error types for idflow.

pub mod classify;

pub use classify::{classify, ErrorKind};

use thiserror::Error;

/// Flow-level error: a classified kind plus human-readable detail.
///
/// For remote-originated failures the detail is the raw provider message
/// (the input to [`classify`]); for local failures it is produced by the
/// validating code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{detail}")]
pub struct FlowError {
    pub kind: ErrorKind,
    pub detail: String,
}

impl FlowError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Build from a raw provider message, classifying it on the way.
    pub fn classified(raw: impl Into<String>) -> Self {
        let detail = raw.into();
        Self {
            kind: classify(&detail),
            detail,
        }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, detail)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "cancelled before confirmation")
    }
}

/// Transport and wire-shape failures from the remote client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<ClientError> for FlowError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Network(detail) => Self::new(ErrorKind::NetworkFailure, detail),
            ClientError::Http { status: 401 | 403, body } => {
                Self::new(ErrorKind::InvalidOrExpiredToken, body)
            }
            other => Self::new(ErrorKind::Unknown, other.to_string()),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, FlowError>;
