//! HMAC signing and verification.
//!
//! Cryptography is delegated to `jsonwebtoken`. Expiry is deliberately
//! left out of `jsonwebtoken`'s validation: [`TokenSigner::verify`] answers
//! "was this minted by us, for us?" and the lifecycle manager applies the
//! clock afterwards, which is what keeps `BadSignature` and `Expired` apart.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::claims::TokenClaims;
use crate::config::JwtConfig;
use crate::error::{TokenError, TokenResult};

/// Signs claims into compact JWS tokens and verifies them.
#[derive(Clone)]
pub struct TokenSigner {
    config: Arc<JwtConfig>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

// Manual Debug impl to keep key material out of logs
impl fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &self.config.algorithm())
            .field("issuer", &self.config.issuer())
            .field("audience", &self.config.audience())
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Create a signer for `config`.
    pub fn new(config: Arc<JwtConfig>) -> Self {
        let secret = config.secret().expose_secret().as_bytes();
        let encoding_key = EncodingKey::from_secret(secret);
        let decoding_key = DecodingKey::from_secret(secret);

        let mut validation = Validation::new(config.algorithm());
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "iss", "aud"]);
        validation.set_issuer(&[config.issuer()]);
        validation.set_audience(&[config.audience()]);

        Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        }
    }

    /// Sign `claims` with the configured algorithm and secret.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Configuration`] if `jsonwebtoken` refuses to
    /// sign, which only happens when the key does not fit the algorithm.
    pub fn sign(&self, claims: &TokenClaims) -> TokenResult<String> {
        encode(&Header::new(self.config.algorithm()), claims, &self.encoding_key)
            .map_err(|e| TokenError::Configuration(format!("Failed to sign token: {e}")))
    }

    /// Verify structure, algorithm, signature, issuer and audience, then
    /// decode the claims. Expiry is not inspected.
    ///
    /// # Errors
    ///
    /// - [`TokenError::Malformed`] when the token is not a three-segment
    ///   JWS with base64url JSON header and payload
    /// - [`TokenError::BadSignature`] for a signature mismatch, a different
    ///   key or a different algorithm
    /// - [`TokenError::InvalidClaims`] for a foreign issuer or audience, or
    ///   a payload missing required claims
    pub fn verify(&self, token: &str) -> TokenResult<TokenClaims> {
        // Structural checks first, so that a base64 failure reported by
        // jsonwebtoken below can only come from the signature segment.
        let segments = Segments::split(token)?;
        segments.payload_json()?;
        self.check_algorithm(&segments.header_json()?)?;

        let data = decode::<serde_json::Value>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                let err = classify(&e);
                debug!(error = %e, kind = err.kind(), "Token verification failed");
                err
            })?;

        serde_json::from_value(data.claims)
            .map_err(|e| TokenError::InvalidClaims(format!("Unexpected claims: {e}")))
    }

    /// Reject headers naming any algorithm other than the configured one,
    /// including ones `jsonwebtoken` cannot parse such as `none`.
    fn check_algorithm(&self, header: &serde_json::Value) -> TokenResult<()> {
        let expected = self.config.algorithm();
        match header.get("alg").and_then(serde_json::Value::as_str) {
            Some(alg) if alg.parse::<Algorithm>().is_ok_and(|a| a == expected) => Ok(()),
            Some(alg) => {
                debug!(alg, "Token header names a different algorithm");
                Err(TokenError::BadSignature(format!(
                    "Token was signed with a different algorithm ({alg})"
                )))
            }
            None => Err(TokenError::BadSignature(
                "Token header names no algorithm".to_string(),
            )),
        }
    }

    /// Decode the payload without verifying anything.
    ///
    /// Introspection only; never trust the result for authorization.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] when the payload cannot be decoded
    /// into claims.
    pub fn decode_unsafe(&self, token: &str) -> TokenResult<TokenClaims> {
        let payload = Segments::split(token)?.payload_json()?;
        serde_json::from_value(payload)
            .map_err(|e| TokenError::Malformed(format!("Payload is not a claims object: {e}")))
    }
}

fn classify(err: &jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::InvalidSignature => {
            TokenError::BadSignature("Signature does not match".to_string())
        }
        ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => TokenError::BadSignature(
            "Token was signed with a different algorithm".to_string(),
        ),
        ErrorKind::Base64(_) => {
            TokenError::BadSignature("Signature segment is not valid base64url".to_string())
        }
        ErrorKind::InvalidIssuer => TokenError::InvalidClaims("Unexpected issuer".to_string()),
        ErrorKind::InvalidAudience => {
            TokenError::InvalidClaims("Unexpected audience".to_string())
        }
        ErrorKind::MissingRequiredClaim(claim) => {
            TokenError::InvalidClaims(format!("Missing required claim: {claim}"))
        }
        _ => TokenError::Malformed(err.to_string()),
    }
}

/// The three segments of a compact JWS.
struct Segments<'a> {
    header: &'a str,
    payload: &'a str,
}

impl<'a> Segments<'a> {
    fn split(token: &'a str) -> TokenResult<Self> {
        let mut parts = token.trim().split('.');
        let (Some(header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed(
                "Expected three dot-separated segments".to_string(),
            ));
        };

        let segments = Self { header, payload };
        segments.header_json()?;
        Ok(segments)
    }

    fn header_json(&self) -> TokenResult<serde_json::Value> {
        decode_segment(self.header, "header")
    }

    fn payload_json(&self) -> TokenResult<serde_json::Value> {
        decode_segment(self.payload, "payload")
    }
}

fn decode_segment(segment: &str, name: &str) -> TokenResult<serde_json::Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| TokenError::Malformed(format!("Token {name} is not valid base64url: {e}")))?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|e| TokenError::Malformed(format!("Token {name} is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(TokenError::Malformed(format!(
            "Token {name} is not a JSON object"
        )));
    }
    Ok(value)
}
