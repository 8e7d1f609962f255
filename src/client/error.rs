//! Errors reported by a document store.

use std::time::Duration;

/// HTTP-style status for a throttled request.
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Error returned by a [`DocumentClient`](super::DocumentClient) call.
///
/// Variants are the finite set of kinds the retry layer reasons about:
/// only [`RemoteError::Throttled`] is ever retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Request rejected by rate limiting. Retry after the advised wait.
    #[error("request throttled: {message}")]
    Throttled {
        /// Server-supplied detail.
        message: String,
        /// Server-advised wait before retrying. `None` means retry at once.
        retry_after: Option<Duration>,
    },

    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A resource with the same id already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The request was malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Any other failure reported by the store or the transport.
    #[error("remote failure (status {status}): {message}")]
    Transient {
        /// Status code reported by the store.
        status: u16,
        /// Server-supplied detail.
        message: String,
    },
}

impl RemoteError {
    /// Classifies a raw status response.
    ///
    /// `retry_after` is only kept for throttled responses.
    pub fn from_status(
        status: u16,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let message = message.into();
        match status {
            STATUS_TOO_MANY_REQUESTS => RemoteError::Throttled {
                message,
                retry_after,
            },
            404 => RemoteError::NotFound(message),
            409 => RemoteError::Conflict(message),
            400 => RemoteError::BadRequest(message),
            _ => RemoteError::Transient { status, message },
        }
    }

    /// Shorthand for a throttling error.
    pub fn throttled(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        RemoteError::Throttled {
            message: message.into(),
            retry_after,
        }
    }

    /// Status code equivalent of this error.
    pub fn status(&self) -> u16 {
        match self {
            RemoteError::Throttled { .. } => STATUS_TOO_MANY_REQUESTS,
            RemoteError::NotFound(_) => 404,
            RemoteError::Conflict(_) => 409,
            RemoteError::BadRequest(_) => 400,
            RemoteError::Transient { status, .. } => *status,
        }
    }

    /// Server-advised wait, present only on throttling errors.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::Throttled { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Returns true for throttling errors.
    pub fn is_throttled(&self) -> bool {
        matches!(self, RemoteError::Throttled { .. })
    }

    pub(crate) fn internal(err: impl std::fmt::Display) -> Self {
        RemoteError::Transient {
            status: 500,
            message: err.to_string(),
        }
    }
}
