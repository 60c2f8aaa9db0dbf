//! Client error types.

use std::time::Duration;

use bbs_models::{Error, ErrorKind};
use http::StatusCode;
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be built. Never retried.
    #[error("failed to create request: {0}")]
    Build(String),

    #[error("request failed: {0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A typed BBS error: router rejection, unreadable response, or the
    /// error embedded in a response body.
    #[error(transparent)]
    Bbs(#[from] Error),

    #[error("event stream returned {0}")]
    BadResponse(StatusCode),

    #[error("event stream connection lost: {0}")]
    Stream(String),

    #[error("unrecognized event type: {0}")]
    UnrecognizedEventType(String),

    #[error("invalid {event_type} payload: {reason}")]
    InvalidPayload { event_type: String, reason: String },

    #[error("event source closed")]
    SourceClosed,
}

impl ClientError {
    /// The canonical kind closest to this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Build(_) => ErrorKind::InvalidRequest,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Bbs(err) => err.kind,
            Self::BadResponse(_) => ErrorKind::InvalidResponse,
            Self::UnrecognizedEventType(_) => ErrorKind::InvalidRecord,
            Self::InvalidPayload { .. } => ErrorKind::InvalidProtobufMessage,
            Self::Transport(_) | Self::Stream(_) | Self::SourceClosed => ErrorKind::UnknownError,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }
}
