//! Common result and error types for the deptrack workspace.

/// The standard result type for fallible internal operations.
///
/// `Err` means the tracker itself is broken (a bug, or an environment it
/// cannot work in such as a thread pool that fails to start). Problems in the
/// user's sources are reported as diagnostics and the operation still returns
/// `Ok`.
pub type TrackResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug or an unusable environment, not a user
/// input problem.
#[derive(Debug, thiserror::Error)]
#[error("internal tracker error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
