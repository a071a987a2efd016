//! Error types for relationship operations.

use thiserror::Error;

/// Errors produced by a [`crate::RelationStore`] backend.
///
/// The first five variants classify rejections from the remote service so
/// callers can surface a precise diagnosis; the remaining variants cover
/// the transport itself. None of the messages carry credentials.
#[derive(Debug, Error)]
pub enum Error {
    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The credential was rejected or lacks permission.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The remote service is rate limiting this client.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The operation conflicts with current remote state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The remote service rejected the request as invalid.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Any other rejection, carrying the HTTP status for diagnosis.
    #[error("GitHub API error ({status}): {message}")]
    Api {
        /// HTTP status code of the rejection.
        status: u16,
        /// Message body reported by the service.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Transport-level HTTP failure (connection, TLS, protocol).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl Error {
    /// Classify a non-success HTTP status into an error variant.
    ///
    /// `what` names the resource or operation for the message; `message`
    /// is the body text reported by the service (may be empty).
    #[must_use]
    pub fn from_status(status: u16, what: &str, message: &str) -> Self {
        let detail = if message.is_empty() {
            what.to_string()
        } else {
            format!("{what}: {message}")
        };

        match status {
            404 => Self::NotFound(detail),
            401 => Self::Forbidden(detail),
            403 if is_rate_limit_message(message) => Self::RateLimited(detail),
            403 => Self::Forbidden(detail),
            409 => Self::Conflict(detail),
            422 => Self::Validation(detail),
            429 => Self::RateLimited(detail),
            _ => Self::Api {
                status,
                message: detail,
            },
        }
    }
}

/// Convert a `reqwest::Error` into a domain [`Error`].
///
/// Timeouts get their own variant; everything else is a transport error.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// GitHub reports secondary rate limits as 403 with a telltale message.
fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("rate limit") || lower.contains("abuse")
}

/// A specialized Result type for relationship operations.
pub type Result<T> = std::result::Result<T, Error>;
