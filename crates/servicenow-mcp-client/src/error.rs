//! ServiceNow client errors.

use thiserror::Error;

/// Longest response body kept in a [`ClientError::Status`]
pub(crate) const MAX_ERROR_BODY: usize = 512;

/// Result alias for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised while talking to ServiceNow.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured instance URL cannot be used
    #[error("Invalid ServiceNow instance URL '{url}': {reason}")]
    InvalidInstanceUrl {
        /// URL as configured
        url: String,
        /// What is wrong with it
        reason: String,
    },

    /// A caller-supplied argument was rejected before any request was sent
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// HTTP 401 or 403
    #[error("ServiceNow rejected the credentials (HTTP {status})")]
    Unauthorized {
        /// Status code
        status: u16,
    },

    /// Any other non-success status
    #[error("ServiceNow returned HTTP {status}: {body}")]
    Status {
        /// Status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// Connection, TLS or timeout failure
    #[error("ServiceNow request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Success status with a body that is not a Table API envelope
    #[error("Unexpected ServiceNow response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// Stable snake_case identifier surfaced in tool results.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInstanceUrl { .. } => "invalid_instance_url",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Status { .. } => "http_status",
            Self::Transport(_) => "transport",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }

    pub(crate) fn status(status: u16, body: &str) -> Self {
        let body = match body.char_indices().nth(MAX_ERROR_BODY) {
            Some((cut, _)) => format!("{}...", &body[..cut]),
            None => body.to_string(),
        };
        Self::Status { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_body_truncated() {
        let err = ClientError::status(500, &"x".repeat(2000));
        match err {
            ClientError::Status { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), MAX_ERROR_BODY + 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_short_body_kept() {
        let err = ClientError::status(404, "No Record found");
        assert_eq!(err.to_string(), "ServiceNow returned HTTP 404: No Record found");
        assert_eq!(err.kind(), "http_status");
    }
}
