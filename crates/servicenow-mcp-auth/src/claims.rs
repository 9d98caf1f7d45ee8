//! Token claims and the claims builder.
//!
//! Timestamps travel as fractional NumericDate seconds (`1760000000.123456`)
//! so that two tokens minted within the same second still carry distinct,
//! ordered `iat` values. In memory they are microsecond-precision
//! [`DateTime<Utc>`] values, which round-trip exactly through the f64 form.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::JwtConfig;
use crate::error::{TokenError, TokenResult};

/// Kind of token, carried in the `type` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// Short-lived token that authorizes calls
    Access,
    /// Long-lived token that can only mint new pairs
    Refresh,
}

impl TokenType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (the ServiceNow username)
    #[serde(rename = "sub")]
    pub subject: String,
    /// Issuer
    #[serde(rename = "iss")]
    pub issuer: String,
    /// Audience
    #[serde(rename = "aud")]
    pub audience: String,
    /// Issued at
    #[serde(rename = "iat", with = "numeric_date")]
    pub issued_at: DateTime<Utc>,
    /// Expiration
    #[serde(rename = "exp", with = "numeric_date")]
    pub expires_at: DateTime<Utc>,
    /// Access or refresh
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// ServiceNow instance the credentials were verified against
    #[serde(
        rename = "snow_instance",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub instance_url: Option<String>,
    /// OAuth client id configured for the instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Unique token id
    #[serde(rename = "jti")]
    pub token_id: String,
}

impl TokenClaims {
    /// Total validity window.
    #[must_use]
    pub fn lifetime(&self) -> chrono::TimeDelta {
        self.expires_at - self.issued_at
    }

    /// Whether the token is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Instance and client binding to carry into refreshed tokens.
    #[must_use]
    pub fn context(&self) -> TokenContext {
        TokenContext {
            instance_url: self.instance_url.clone(),
            client_id: self.client_id.clone(),
        }
    }
}

/// Optional ServiceNow binding embedded in both tokens of a pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenContext {
    /// Instance URL
    pub instance_url: Option<String>,
    /// OAuth client id
    pub client_id: Option<String>,
}

impl TokenContext {
    /// Context bound to an instance URL.
    #[must_use]
    pub fn for_instance(instance_url: impl Into<String>) -> Self {
        Self {
            instance_url: Some(instance_url.into()),
            client_id: None,
        }
    }

    /// Set the client id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id;
        self
    }
}

/// Builds claims from the immutable config and an injected clock.
#[derive(Debug, Clone)]
pub struct ClaimsBuilder {
    config: Arc<JwtConfig>,
    clock: Arc<dyn Clock>,
}

impl ClaimsBuilder {
    /// Create a builder.
    pub fn new(config: Arc<JwtConfig>, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock }
    }

    /// Build claims for `subject` issued now.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::InvalidSubject`] for an empty or
    /// whitespace-only subject, and [`TokenError::Configuration`] when the
    /// configured lifetime pushes the expiry past what a timestamp can hold.
    pub fn build(
        &self,
        subject: &str,
        token_type: TokenType,
        context: &TokenContext,
    ) -> TokenResult<TokenClaims> {
        self.build_at(self.now(), subject, token_type, context)
    }

    /// Build an access/refresh pair sharing one issue instant.
    ///
    /// # Errors
    ///
    /// Same as [`ClaimsBuilder::build`].
    pub fn build_pair(
        &self,
        subject: &str,
        context: &TokenContext,
    ) -> TokenResult<(TokenClaims, TokenClaims)> {
        let now = self.now();
        let access = self.build_at(now, subject, TokenType::Access, context)?;
        let refresh = self.build_at(now, subject, TokenType::Refresh, context)?;
        Ok((access, refresh))
    }

    fn now(&self) -> DateTime<Utc> {
        // NumericDate carries microseconds; anything finer would not survive
        // a sign/verify round trip.
        self.clock.now().trunc_subsecs(6)
    }

    fn build_at(
        &self,
        now: DateTime<Utc>,
        subject: &str,
        token_type: TokenType,
        context: &TokenContext,
    ) -> TokenResult<TokenClaims> {
        if subject.trim().is_empty() {
            return Err(TokenError::InvalidSubject);
        }

        let ttl = self.config.ttl(token_type);
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            TokenError::Configuration(format!(
                "{token_type} token lifetime of {} hours overflows the expiry timestamp",
                ttl.num_hours()
            ))
        })?;

        Ok(TokenClaims {
            subject: subject.to_string(),
            issuer: self.config.issuer().to_string(),
            audience: self.config.audience().to_string(),
            issued_at: now,
            expires_at,
            token_type,
            instance_url: context.instance_url.clone(),
            client_id: context.client_id.clone(),
            token_id: uuid::Uuid::new_v4().to_string(),
        })
    }
}

/// Serde adapter for fractional NumericDate seconds.
pub(crate) mod numeric_date {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(crate) fn to_seconds(instant: DateTime<Utc>) -> f64 {
        instant.timestamp_micros() as f64 / 1_000_000.0
    }

    pub(crate) fn from_seconds(seconds: f64) -> Option<DateTime<Utc>> {
        if !seconds.is_finite() {
            return None;
        }
        DateTime::from_timestamp_micros((seconds * 1_000_000.0).round() as i64)
    }

    pub(crate) fn serialize<S: Serializer>(
        instant: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(to_seconds(*instant))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let seconds = f64::deserialize(deserializer)?;
        from_seconds(seconds).ok_or_else(|| D::Error::custom("NumericDate out of range"))
    }
}
