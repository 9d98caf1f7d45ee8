//! Credential fallback gate.
//!
//! Decides, per call, how the server authenticates to ServiceNow: a
//! configured JWT access token when it validates, otherwise the configured
//! username and password. Nothing is cached, so a token that expires
//! mid-session drops to basic auth on the next call.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::claims::{TokenClaims, TokenType};
use crate::config::ServiceNowConfig;
use crate::error::{TokenError, TokenResult};
use crate::manager::TokenManager;

/// Resolved way of authenticating one ServiceNow request.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Validated JWT access token, sent as a bearer token
    Jwt {
        /// The raw token
        token: SecretString,
        /// Its verified claims
        claims: TokenClaims,
    },
    /// HTTP basic credentials
    Basic {
        /// Username
        username: String,
        /// Password
        password: SecretString,
    },
}

impl CredentialSource {
    /// Short name for logs and tool output.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Jwt { .. } => "jwt",
            Self::Basic { .. } => "basic",
        }
    }

    /// The user the request runs as.
    pub fn username(&self) -> &str {
        match self {
            Self::Jwt { claims, .. } => &claims.subject,
            Self::Basic { username, .. } => username,
        }
    }
}

/// Resolves a [`CredentialSource`] from configuration.
#[derive(Debug, Clone)]
pub struct CredentialGate {
    manager: Arc<TokenManager>,
}

impl CredentialGate {
    /// Create a gate that validates tokens with `manager`.
    pub fn new(manager: Arc<TokenManager>) -> Self {
        Self { manager }
    }

    /// Pick the credentials for the next request.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::NoCredentialsAvailable`] when the token is
    /// missing or invalid and no username/password pair is configured.
    pub fn resolve(&self, config: &ServiceNowConfig) -> TokenResult<CredentialSource> {
        if let Some(token) = config
            .jwt_token
            .as_ref()
            .filter(|t| !t.expose_secret().trim().is_empty())
        {
            match self.validate_access(token.expose_secret()) {
                Ok(claims) => {
                    debug!(subject = %claims.subject, "Using configured JWT for ServiceNow");
                    return Ok(CredentialSource::Jwt {
                        token: token.clone(),
                        claims,
                    });
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        kind = e.kind(),
                        "Configured JWT is not usable, falling back to basic auth"
                    );
                }
            }
        }

        if config.has_basic_credentials()
            && let (Some(username), Some(password)) = (&config.username, &config.password)
        {
            debug!(username = %username, "Using basic auth for ServiceNow");
            return Ok(CredentialSource::Basic {
                username: username.clone(),
                password: password.clone(),
            });
        }

        Err(TokenError::NoCredentialsAvailable)
    }

    fn validate_access(&self, token: &str) -> TokenResult<TokenClaims> {
        let validated = self.manager.validate(token)?;
        if validated.claims.token_type != TokenType::Access {
            return Err(TokenError::WrongTokenType {
                expected: TokenType::Access,
                actual: validated.claims.token_type,
            });
        }
        Ok(validated.claims)
    }
}
