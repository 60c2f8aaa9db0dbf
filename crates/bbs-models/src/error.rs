//! Canonical BBS error kinds.
//!
//! Every failure that crosses a crate boundary or the wire is reduced to an
//! [`Error`] carrying one [`ErrorKind`] and a human-readable message. The
//! numeric values of `ErrorKind` are part of the wire contract.

use std::fmt;

use thiserror::Error;

/// Result type alias for model-level operations.
pub type ModelResult<T> = Result<T, Error>;

/// Wire-stable error classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ErrorKind {
    UnknownError = 0,
    InvalidRecord = 3,
    InvalidRequest = 4,
    InvalidResponse = 5,
    InvalidProtobufMessage = 6,
    InvalidJson = 7,
    FailedToOpenEnvelope = 8,
    InvalidStateTransition = 9,
    ResourceConflict = 11,
    ResourceExists = 12,
    ResourceNotFound = 13,
    RouterError = 14,
    ActualLrpCannotBeClaimed = 15,
    ActualLrpCannotBeStarted = 16,
    ActualLrpCannotBeCrashed = 17,
    ActualLrpCannotBeFailed = 18,
    ActualLrpCannotBeRemoved = 19,
    ActualLrpCannotBeUnclaimed = 21,
    RunningOnDifferentCell = 24,
    GuidGeneration = 26,
    Deserialize = 27,
    Deadlock = 28,
    Unrecoverable = 29,
    LockCollision = 30,
    Timeout = 31,
    BadRequest = 32,
}

impl ErrorKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::UnknownError => "UnknownError",
            Self::InvalidRecord => "InvalidRecord",
            Self::InvalidRequest => "InvalidRequest",
            Self::InvalidResponse => "InvalidResponse",
            Self::InvalidProtobufMessage => "InvalidProtobufMessage",
            Self::InvalidJson => "InvalidJSON",
            Self::FailedToOpenEnvelope => "FailedToOpenEnvelope",
            Self::InvalidStateTransition => "InvalidStateTransition",
            Self::ResourceConflict => "ResourceConflict",
            Self::ResourceExists => "ResourceExists",
            Self::ResourceNotFound => "ResourceNotFound",
            Self::RouterError => "RouterError",
            Self::ActualLrpCannotBeClaimed => "ActualLRPCannotBeClaimed",
            Self::ActualLrpCannotBeStarted => "ActualLRPCannotBeStarted",
            Self::ActualLrpCannotBeCrashed => "ActualLRPCannotBeCrashed",
            Self::ActualLrpCannotBeFailed => "ActualLRPCannotBeFailed",
            Self::ActualLrpCannotBeRemoved => "ActualLRPCannotBeRemoved",
            Self::ActualLrpCannotBeUnclaimed => "ActualLRPCannotBeUnclaimed",
            Self::RunningOnDifferentCell => "RunningOnDifferentCell",
            Self::GuidGeneration => "GUIDGeneration",
            Self::Deserialize => "Deserialize",
            Self::Deadlock => "Deadlock",
            Self::Unrecoverable => "Unrecoverable",
            Self::LockCollision => "LockCollision",
            Self::Timeout => "Timeout",
            Self::BadRequest => "BadRequest",
        }
    }

    /// Transient kinds that a storage-level retry loop may re-attempt.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Deadlock)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed BBS error: kind plus message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    // ── Canonical instances ────────────────────────────────────────

    pub fn unknown() -> Self {
        Self::new(ErrorKind::UnknownError, "the request failed for an unknown reason")
    }

    pub fn resource_not_found() -> Self {
        Self::new(
            ErrorKind::ResourceNotFound,
            "the requested resource could not be found",
        )
    }

    pub fn resource_exists() -> Self {
        Self::new(ErrorKind::ResourceExists, "the requested resource already exists")
    }

    pub fn deadlock() -> Self {
        Self::new(ErrorKind::Deadlock, "the request failed due to deadlock")
    }

    pub fn bad_request() -> Self {
        Self::new(ErrorKind::BadRequest, "the request received is invalid")
    }

    pub fn unrecoverable() -> Self {
        Self::new(
            ErrorKind::Unrecoverable,
            "the request failed due to an unrecoverable error",
        )
    }

    pub fn deserialize() -> Self {
        Self::new(ErrorKind::Deserialize, "could not deserialize record")
    }

    pub fn cannot_be_claimed() -> Self {
        Self::new(ErrorKind::ActualLrpCannotBeClaimed, "cannot claim actual LRP")
    }

    pub fn cannot_be_started() -> Self {
        Self::new(ErrorKind::ActualLrpCannotBeStarted, "cannot start actual LRP")
    }

    pub fn cannot_be_crashed() -> Self {
        Self::new(ErrorKind::ActualLrpCannotBeCrashed, "cannot crash actual LRP")
    }

    pub fn cannot_be_failed() -> Self {
        Self::new(
            ErrorKind::ActualLrpCannotBeFailed,
            "cannot fail actual LRP: not unclaimed",
        )
    }

    pub fn cannot_be_removed() -> Self {
        Self::new(ErrorKind::ActualLrpCannotBeRemoved, "cannot remove actual LRP")
    }

    pub fn cannot_be_unclaimed() -> Self {
        Self::new(
            ErrorKind::ActualLrpCannotBeUnclaimed,
            "cannot unclaim actual LRP: already unclaimed",
        )
    }

    pub fn router_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RouterError, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidResponse, message)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind, kind.name())
    }
}
