//! Token lifecycle errors.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::claims::TokenType;

/// Boxed error used to carry transport failures as a source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for token operations
pub type TokenResult<T> = Result<T, TokenError>;

/// Errors raised by the claims builder, signer and lifecycle manager.
///
/// Signature failures and expiry stay distinct: a forged token is always
/// reported as [`TokenError::BadSignature`], never as expired.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Subject was empty or whitespace
    #[error("Token subject must not be empty")]
    InvalidSubject,

    /// Signature mismatch, wrong key or unexpected algorithm
    #[error("Invalid token signature: {0}")]
    BadSignature(String),

    /// Not a structurally valid compact JWS
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Correctly signed but past its expiry
    #[error("Token expired at {}", expired_at.to_rfc3339())]
    Expired {
        /// When the token stopped being valid
        expired_at: DateTime<Utc>,
    },

    /// An access token was presented where a refresh token is required (or
    /// the reverse)
    #[error("Expected {expected} token, got {actual} token")]
    WrongTokenType {
        /// Type the operation requires
        expected: TokenType,
        /// Type carried by the token
        actual: TokenType,
    },

    /// Credentials were rejected or could not be checked
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        /// Caller-safe description; never says which field was wrong
        message: String,
        /// Underlying transport failure, if any
        #[source]
        source: Option<BoxError>,
    },

    /// Neither a usable token nor username/password is configured
    #[error(
        "No ServiceNow credentials available: set SERVICENOW_JWT_TOKEN or SERVICENOW_USERNAME and SERVICENOW_PASSWORD"
    )]
    NoCredentialsAvailable,

    /// Signature is valid but issuer, audience or a required claim is wrong
    #[error("Invalid token claims: {0}")]
    InvalidClaims(String),

    /// Invalid JWT or ServiceNow settings
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TokenError {
    /// Stable snake_case identifier surfaced in tool results.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidSubject => "invalid_subject",
            Self::BadSignature(_) => "bad_signature",
            Self::Malformed(_) => "malformed",
            Self::Expired { .. } => "expired",
            Self::WrongTokenType { .. } => "wrong_token_type",
            Self::AuthenticationFailed { .. } => "authentication_failed",
            Self::NoCredentialsAvailable => "no_credentials_available",
            Self::InvalidClaims(_) => "invalid_claims",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Rejected credentials, without a transport cause.
    pub fn rejected_credentials() -> Self {
        Self::AuthenticationFailed {
            message: "Invalid ServiceNow credentials".to_string(),
            source: None,
        }
    }

    /// Credential check that could not complete.
    pub fn verification_unavailable(source: BoxError) -> Self {
        Self::AuthenticationFailed {
            message: "Could not verify credentials with ServiceNow".to_string(),
            source: Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kinds_are_distinct() {
        let errors = [
            TokenError::InvalidSubject,
            TokenError::BadSignature(String::new()),
            TokenError::Malformed(String::new()),
            TokenError::Expired {
                expired_at: Utc::now(),
            },
            TokenError::WrongTokenType {
                expected: TokenType::Refresh,
                actual: TokenType::Access,
            },
            TokenError::rejected_credentials(),
            TokenError::NoCredentialsAvailable,
            TokenError::InvalidClaims(String::new()),
            TokenError::Configuration(String::new()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(TokenError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_wrong_token_type_message() {
        let err = TokenError::WrongTokenType {
            expected: TokenType::Refresh,
            actual: TokenType::Access,
        };
        assert_eq!(
            err.to_string(),
            "Expected refresh token, got access token"
        );
    }

    #[test]
    fn test_verification_unavailable_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
        let err = TokenError::verification_unavailable(Box::new(io));
        assert_eq!(err.kind(), "authentication_failed");
        assert!(err.source().is_some());
        assert!(!err.to_string().contains("password"));
    }
}
