//! Token lifecycle: issue, validate, refresh and introspect.
//!
//! The manager holds no mutable state. Every operation is a pure function of
//! its input, the frozen [`JwtConfig`] and the injected [`Clock`], apart from
//! the credential check inside [`TokenManager::issue`].

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::claims::{ClaimsBuilder, TokenClaims, TokenContext, TokenType};
use crate::clock::{Clock, SystemClock};
use crate::config::JwtConfig;
use crate::error::{TokenError, TokenResult};
use crate::signer::TokenSigner;
use crate::verifier::{CredentialCheck, CredentialVerifier};

/// Access/refresh pair returned by issue and refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    /// Signed access token
    pub access_token: String,
    /// Signed refresh token
    pub refresh_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    /// Access token expiry (RFC 3339)
    pub expires_at: DateTime<Utc>,
    /// Refresh token expiry (RFC 3339)
    pub refresh_expires_at: DateTime<Utc>,
}

/// A token that passed signature, claims and expiry checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    /// Verified claims
    pub claims: TokenClaims,
    /// False once the freshness share of the lifetime has elapsed; callers
    /// should refresh soon
    pub fresh: bool,
}

/// Best-effort description of an arbitrary token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenIntrospection {
    /// Claims decoded without verification, if the payload is readable
    pub claims: Option<TokenClaims>,
    /// Expired, or unreadable
    pub is_expired: bool,
    /// Signature checks out against the configured key
    pub is_signature_valid: bool,
    /// First problem found, if any
    pub error: Option<String>,
}

/// Stateless token lifecycle manager.
#[derive(Debug, Clone)]
pub struct TokenManager {
    config: Arc<JwtConfig>,
    claims: ClaimsBuilder,
    signer: TokenSigner,
    clock: Arc<dyn Clock>,
    defaults: TokenContext,
}

impl TokenManager {
    /// Create a manager on the system clock.
    pub fn new(config: JwtConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a manager with an explicit clock.
    pub fn with_clock(config: JwtConfig, clock: Arc<dyn Clock>) -> Self {
        let config = Arc::new(config);
        Self {
            claims: ClaimsBuilder::new(config.clone(), clock.clone()),
            signer: TokenSigner::new(config.clone()),
            config,
            clock,
            defaults: TokenContext::default(),
        }
    }

    /// Instance URL and client id used when an issue request names none.
    #[must_use]
    pub fn with_defaults(mut self, defaults: TokenContext) -> Self {
        self.defaults = defaults;
        self
    }

    /// The frozen configuration.
    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Verify credentials against ServiceNow, then mint a pair.
    ///
    /// # Errors
    ///
    /// - [`TokenError::InvalidSubject`] for an empty username
    /// - [`TokenError::Configuration`] when no instance URL is given or
    ///   configured
    /// - [`TokenError::AuthenticationFailed`] when the instance rejects the
    ///   credentials or cannot be reached
    ///
    /// # Example
    ///
    /// ```rust
    /// use secrecy::SecretString;
    /// use servicenow_mcp_auth::{
    ///     CredentialCheck, JwtConfig, StaticVerifier, TokenContext, TokenManager,
    /// };
    ///
    /// # tokio_test::block_on(async {
    /// let manager = TokenManager::new(
    ///     JwtConfig::builder()
    ///         .secret("an-example-secret-that-is-32-bytes-long")
    ///         .build()?,
    /// )
    /// .with_defaults(TokenContext::for_instance("https://dev12345.service-now.com"));
    ///
    /// let password = SecretString::new("pw".to_string());
    /// let pair = manager
    ///     .issue(&StaticVerifier(CredentialCheck::Accepted), "alice", &password, None)
    ///     .await?;
    /// assert_eq!(pair.token_type, "Bearer");
    ///
    /// let rejected = manager
    ///     .issue(&StaticVerifier(CredentialCheck::Rejected), "alice", &password, None)
    ///     .await;
    /// assert!(rejected.is_err());
    /// # Ok::<(), servicenow_mcp_auth::TokenError>(())
    /// # }).unwrap();
    /// ```
    pub async fn issue<V>(
        &self,
        verifier: &V,
        username: &str,
        password: &SecretString,
        instance_url: Option<&str>,
    ) -> TokenResult<TokenPair>
    where
        V: CredentialVerifier + ?Sized,
    {
        if username.trim().is_empty() {
            return Err(TokenError::InvalidSubject);
        }

        let instance_url = instance_url
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .or_else(|| self.defaults.instance_url.clone())
            .ok_or_else(|| {
                TokenError::Configuration(
                    "ServiceNow instance URL is required: pass instance_url or set SERVICENOW_INSTANCE_URL"
                        .to_string(),
                )
            })?;

        match verifier
            .verify_credentials(&instance_url, username, password)
            .await
        {
            Ok(CredentialCheck::Accepted) => {}
            Ok(CredentialCheck::Rejected) => {
                warn!(username, instance_url = %instance_url, "ServiceNow rejected credentials");
                return Err(TokenError::rejected_credentials());
            }
            Err(e) => {
                warn!(username, instance_url = %instance_url, error = %e, "Credential check failed");
                return Err(TokenError::verification_unavailable(e));
            }
        }

        let context = TokenContext::for_instance(instance_url)
            .with_client_id(self.defaults.client_id.clone());
        let pair = self.issue_for_subject(username, &context)?;
        info!(username, "Issued token pair");
        Ok(pair)
    }

    /// Mint a pair for an already-authenticated subject.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidSubject`] for an empty subject, and
    /// [`TokenError::Configuration`] when a configured lifetime cannot be
    /// turned into an expiry.
    pub fn issue_for_subject(
        &self,
        subject: &str,
        context: &TokenContext,
    ) -> TokenResult<TokenPair> {
        let (access, refresh) = self.claims.build_pair(subject, context)?;
        Ok(TokenPair {
            access_token: self.signer.sign(&access)?,
            refresh_token: self.signer.sign(&refresh)?,
            token_type: "Bearer".to_string(),
            expires_in: access.lifetime().num_seconds(),
            expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Verify a token, then check expiry.
    ///
    /// Signature problems win over expiry: a forged token that is also stale
    /// reports [`TokenError::BadSignature`].
    ///
    /// # Errors
    ///
    /// Any [`TokenSigner::verify`] error, or [`TokenError::Expired`].
    pub fn validate(&self, token: &str) -> TokenResult<ValidatedToken> {
        let claims = self.signer.verify(token)?;

        let now = self.clock.now();
        if claims.is_expired_at(now) {
            debug!(subject = %claims.subject, expired_at = %claims.expires_at, "Token expired");
            return Err(TokenError::Expired {
                expired_at: claims.expires_at,
            });
        }

        let fresh = is_fresh(&claims, now, self.config.freshness_ratio());
        Ok(ValidatedToken { claims, fresh })
    }

    /// Exchange a refresh token for a new pair. No password involved.
    ///
    /// # Errors
    ///
    /// Any [`TokenManager::validate`] error, or
    /// [`TokenError::WrongTokenType`] for an access token.
    pub fn refresh(&self, refresh_token: &str) -> TokenResult<TokenPair> {
        let validated = self.validate(refresh_token)?;
        let claims = validated.claims;

        if claims.token_type != TokenType::Refresh {
            warn!(subject = %claims.subject, "Refresh attempted with an access token");
            return Err(TokenError::WrongTokenType {
                expected: TokenType::Refresh,
                actual: claims.token_type,
            });
        }

        let pair = self.issue_for_subject(&claims.subject, &claims.context())?;
        info!(subject = %claims.subject, "Refreshed token pair");
        Ok(pair)
    }

    /// Describe a token. Never fails.
    pub fn introspect(&self, token: &str) -> TokenIntrospection {
        let decoded = self.signer.decode_unsafe(token);
        let verified = self.signer.verify(token);

        // Claims problems are only detected after the signature checked out.
        let is_signature_valid = matches!(verified, Ok(_) | Err(TokenError::InvalidClaims(_)));

        match decoded {
            Err(e) => TokenIntrospection {
                claims: None,
                is_expired: true,
                is_signature_valid,
                error: Some(e.to_string()),
            },
            Ok(claims) => {
                let now = self.clock.now();
                let is_expired = claims.is_expired_at(now);
                let error = match verified {
                    Err(e) => Some(e.to_string()),
                    Ok(_) if is_expired => Some(
                        TokenError::Expired {
                            expired_at: claims.expires_at,
                        }
                        .to_string(),
                    ),
                    Ok(_) => None,
                };
                TokenIntrospection {
                    claims: Some(claims),
                    is_expired,
                    is_signature_valid,
                    error,
                }
            }
        }
    }
}

fn is_fresh(claims: &TokenClaims, now: DateTime<Utc>, ratio: f64) -> bool {
    let lifetime = claims.lifetime().num_milliseconds() as f64;
    let elapsed = (now - claims.issued_at).num_milliseconds() as f64;
    elapsed < lifetime * ratio
}
