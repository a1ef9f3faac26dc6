use std::fmt;

/// Failure taxonomy shared by every service in the store.
///
/// Variants map one-to-one onto the outcomes callers are expected to
/// distinguish: retry after refresh (`Conflict`), capability missing
/// (`Unavailable`), bad input (`InvalidArgument`), and so on. Anything
/// coming out of the filesystem or the version store surfaces as
/// `Internal` with the underlying tool message attached.
#[derive(Debug)]
pub enum StoreError {
    NotFound(String),
    InvalidArgument(String),
    Conflict(String),
    PreconditionFailed(String),
    Unavailable(String),
    Internal(String),
}

impl StoreError {
    pub fn not_found<S: Into<String>>(message: S) -> Self {
        StoreError::NotFound(message.into())
    }

    pub fn invalid<S: Into<String>>(message: S) -> Self {
        StoreError::InvalidArgument(message.into())
    }

    pub fn conflict<S: Into<String>>(message: S) -> Self {
        StoreError::Conflict(message.into())
    }

    pub fn precondition<S: Into<String>>(message: S) -> Self {
        StoreError::PreconditionFailed(message.into())
    }

    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        StoreError::Unavailable(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        StoreError::Internal(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(message) => write!(f, "not found: {message}"),
            StoreError::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            StoreError::Conflict(message) => write!(f, "conflict: {message}"),
            StoreError::PreconditionFailed(message) => {
                write!(f, "precondition failed: {message}")
            }
            StoreError::Unavailable(message) => write!(f, "unavailable: {message}"),
            StoreError::Internal(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        StoreError::Internal(value.to_string())
    }
}

impl From<git2::Error> for StoreError {
    fn from(value: git2::Error) -> Self {
        StoreError::Internal(value.message().to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Internal(value.to_string())
    }
}
