//! JWT and ServiceNow connection configuration.
//!
//! Both structs are constructed once at startup and shared read-only behind
//! an `Arc`. Nothing in this crate reads the process environment; the server
//! crate layers settings and hands the finished values in.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::TimeDelta;
use jsonwebtoken::Algorithm;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::claims::TokenType;
use crate::error::{TokenError, TokenResult};

/// Default token issuer
pub const DEFAULT_ISSUER: &str = "servicenow-mcp-server";
/// Default token audience
pub const DEFAULT_AUDIENCE: &str = "servicenow-api";
/// Default access token lifetime in hours
pub const DEFAULT_ACCESS_TTL_HOURS: u64 = 24;
/// Default refresh token lifetime in days
pub const DEFAULT_REFRESH_TTL_DAYS: u64 = 30;
/// Share of a token's lifetime after which it is no longer reported fresh
pub const DEFAULT_FRESHNESS_RATIO: f64 = 0.8;
/// Minimum HMAC secret length in bytes
pub const MIN_SECRET_BYTES: usize = 32;
/// Default ServiceNow request timeout
pub const DEFAULT_SERVICENOW_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the signing secret came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOrigin {
    /// Supplied by the operator (`JWT_SECRET_KEY`)
    Configured,
    /// Generated at startup; tokens stop verifying after a restart
    Generated,
}

/// Generate a 32-byte random secret, base64url encoded without padding.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; MIN_SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Parse an algorithm name, accepting only the HMAC family.
///
/// # Errors
///
/// Returns [`TokenError::Configuration`] for unknown names and for
/// asymmetric algorithms, which need key material this server does not
/// manage.
pub fn parse_algorithm(name: &str) -> TokenResult<Algorithm> {
    let algorithm = Algorithm::from_str(name.trim())
        .map_err(|_| TokenError::Configuration(format!("Unknown JWT algorithm: {name}")))?;
    ensure_hmac(algorithm)
}

fn ensure_hmac(algorithm: Algorithm) -> TokenResult<Algorithm> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => Err(TokenError::Configuration(format!(
            "Unsupported JWT algorithm {other:?}: only HS256, HS384 and HS512 are supported"
        ))),
    }
}

/// Immutable signing configuration.
#[derive(Clone)]
pub struct JwtConfig {
    secret: SecretString,
    key_origin: KeyOrigin,
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    access_ttl: TimeDelta,
    refresh_ttl: TimeDelta,
    freshness_ratio: f64,
}

// Manual Debug impl to keep the secret out of logs
impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"[REDACTED]")
            .field("key_origin", &self.key_origin)
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("freshness_ratio", &self.freshness_ratio)
            .finish()
    }
}

impl JwtConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> JwtConfigBuilder {
        JwtConfigBuilder::default()
    }

    /// HMAC secret.
    pub fn secret(&self) -> &SecretString {
        &self.secret
    }

    /// Where the secret came from.
    pub fn key_origin(&self) -> KeyOrigin {
        self.key_origin
    }

    /// Signing algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Expected and emitted issuer.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Expected and emitted audience.
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> TimeDelta {
        self.access_ttl
    }

    /// Refresh token lifetime.
    pub fn refresh_ttl(&self) -> TimeDelta {
        self.refresh_ttl
    }

    /// Lifetime for a token type.
    pub fn ttl(&self, token_type: TokenType) -> TimeDelta {
        match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        }
    }

    /// Freshness threshold as a share of the lifetime.
    pub fn freshness_ratio(&self) -> f64 {
        self.freshness_ratio
    }
}

/// Builder for [`JwtConfig`].
#[derive(Default)]
pub struct JwtConfigBuilder {
    secret: Option<String>,
    algorithm: Option<Algorithm>,
    issuer: Option<String>,
    audience: Option<String>,
    access_ttl_hours: Option<u64>,
    refresh_ttl_days: Option<u64>,
    freshness_ratio: Option<f64>,
}

impl fmt::Debug for JwtConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfigBuilder")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl_hours", &self.access_ttl_hours)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .field("freshness_ratio", &self.freshness_ratio)
            .finish()
    }
}

impl JwtConfigBuilder {
    /// Use an operator-supplied secret.
    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Use a secret if one was supplied; otherwise one is generated.
    #[must_use]
    pub fn maybe_secret(mut self, secret: Option<String>) -> Self {
        self.secret = secret;
        self
    }

    /// Set the algorithm.
    #[must_use]
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    /// Set the issuer.
    #[must_use]
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Set the audience.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Set the access token lifetime in hours.
    #[must_use]
    pub fn access_ttl_hours(mut self, hours: u64) -> Self {
        self.access_ttl_hours = Some(hours);
        self
    }

    /// Set the refresh token lifetime in days.
    #[must_use]
    pub fn refresh_ttl_days(mut self, days: u64) -> Self {
        self.refresh_ttl_days = Some(days);
        self
    }

    /// Set the freshness ratio (exclusive 0, inclusive 1).
    #[must_use]
    pub fn freshness_ratio(mut self, ratio: f64) -> Self {
        self.freshness_ratio = Some(ratio);
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Configuration`] when the secret is shorter than
    /// 32 bytes, a lifetime is zero or out of range, the algorithm is not
    /// HMAC, issuer or audience is blank, or the freshness ratio is outside
    /// `(0, 1]`.
    pub fn build(self) -> TokenResult<JwtConfig> {
        let (secret, key_origin) = match self.secret {
            Some(secret) => {
                if secret.len() < MIN_SECRET_BYTES {
                    return Err(TokenError::Configuration(format!(
                        "JWT secret must be at least {MIN_SECRET_BYTES} bytes (got {})",
                        secret.len()
                    )));
                }
                (secret, KeyOrigin::Configured)
            }
            None => (generate_secret(), KeyOrigin::Generated),
        };

        let algorithm = ensure_hmac(self.algorithm.unwrap_or(Algorithm::HS256))?;

        let issuer = self.issuer.unwrap_or_else(|| DEFAULT_ISSUER.to_string());
        let audience = self
            .audience
            .unwrap_or_else(|| DEFAULT_AUDIENCE.to_string());
        if issuer.trim().is_empty() || audience.trim().is_empty() {
            return Err(TokenError::Configuration(
                "JWT issuer and audience must not be empty".to_string(),
            ));
        }

        let access_hours = self.access_ttl_hours.unwrap_or(DEFAULT_ACCESS_TTL_HOURS);
        let access_ttl = positive_delta(access_hours, TimeDelta::try_hours, "JWT_EXPIRY_HOURS")?;
        let refresh_days = self.refresh_ttl_days.unwrap_or(DEFAULT_REFRESH_TTL_DAYS);
        let refresh_ttl = positive_delta(
            refresh_days,
            TimeDelta::try_days,
            "JWT_REFRESH_EXPIRY_DAYS",
        )?;

        let freshness_ratio = self.freshness_ratio.unwrap_or(DEFAULT_FRESHNESS_RATIO);
        if freshness_ratio.is_nan() || freshness_ratio <= 0.0 || freshness_ratio > 1.0 {
            return Err(TokenError::Configuration(format!(
                "Freshness ratio must be in (0, 1], got {freshness_ratio}"
            )));
        }

        Ok(JwtConfig {
            secret: SecretString::new(secret),
            key_origin,
            algorithm,
            issuer,
            audience,
            access_ttl,
            refresh_ttl,
            freshness_ratio,
        })
    }
}

fn positive_delta(
    amount: u64,
    unit: fn(i64) -> Option<TimeDelta>,
    key: &str,
) -> TokenResult<TimeDelta> {
    if amount == 0 {
        return Err(TokenError::Configuration(format!(
            "{key} must be greater than zero"
        )));
    }
    i64::try_from(amount)
        .ok()
        .and_then(unit)
        .ok_or_else(|| TokenError::Configuration(format!("{key} is out of range: {amount}")))
}

/// ServiceNow connection settings.
#[derive(Debug, Clone)]
pub struct ServiceNowConfig {
    /// Instance base URL, e.g. `https://dev12345.service-now.com`
    pub instance_url: Option<String>,
    /// Basic-auth username
    pub username: Option<String>,
    /// Basic-auth password
    pub password: Option<SecretString>,
    /// Pre-issued JWT access token
    pub jwt_token: Option<SecretString>,
    /// OAuth client id
    pub client_id: Option<String>,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl Default for ServiceNowConfig {
    fn default() -> Self {
        Self {
            instance_url: None,
            username: None,
            password: None,
            jwt_token: None,
            client_id: None,
            timeout: DEFAULT_SERVICENOW_TIMEOUT,
        }
    }
}

impl ServiceNowConfig {
    /// Whether both username and password are present and non-empty.
    pub fn has_basic_credentials(&self) -> bool {
        let username = self.username.as_deref().is_some_and(|u| !u.is_empty());
        let password = self
            .password
            .as_ref()
            .is_some_and(|p| !p.expose_secret().is_empty());
        username && password
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = JwtConfig::builder()
            .secret("a".repeat(32))
            .build()
            .unwrap();
        assert_eq!(config.algorithm(), Algorithm::HS256);
        assert_eq!(config.issuer(), DEFAULT_ISSUER);
        assert_eq!(config.audience(), DEFAULT_AUDIENCE);
        assert_eq!(config.access_ttl(), TimeDelta::hours(24));
        assert_eq!(config.refresh_ttl(), TimeDelta::days(30));
        assert_eq!(config.key_origin(), KeyOrigin::Configured);
    }

    #[test]
    fn test_missing_secret_is_generated() {
        let config = JwtConfig::builder().build().unwrap();
        assert_eq!(config.key_origin(), KeyOrigin::Generated);
        assert!(config.secret().expose_secret().len() >= MIN_SECRET_BYTES);
    }

    #[test]
    fn test_generated_secrets_differ() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(URL_SAFE_NO_PAD.decode(&a).is_ok());
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = JwtConfig::builder().secret("too-short").build().unwrap_err();
        assert!(matches!(err, TokenError::Configuration(_)));
    }

    #[test]
    fn test_zero_lifetimes_rejected() {
        let secret = "s".repeat(40);
        assert!(
            JwtConfig::builder()
                .secret(&secret)
                .access_ttl_hours(0)
                .build()
                .is_err()
        );
        assert!(
            JwtConfig::builder()
                .secret(&secret)
                .refresh_ttl_days(0)
                .build()
                .is_err()
        );
        assert!(
            JwtConfig::builder()
                .secret(&secret)
                .access_ttl_hours(u64::MAX)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("HS512").unwrap(), Algorithm::HS512);
        assert!(matches!(
            parse_algorithm("RS256"),
            Err(TokenError::Configuration(_))
        ));
        assert!(matches!(
            parse_algorithm("none"),
            Err(TokenError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let secret = "super-secret-value-that-is-long-enough";
        let config = JwtConfig::builder().secret(secret).build().unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains(secret));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_has_basic_credentials() {
        let mut config = ServiceNowConfig {
            username: Some("admin".to_string()),
            ..Default::default()
        };
        assert!(!config.has_basic_credentials());
        config.password = Some(SecretString::new("pw".to_string()));
        assert!(config.has_basic_credentials());
    }
}
