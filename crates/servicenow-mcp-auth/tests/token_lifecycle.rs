//! Token lifecycle integration tests
//!
//! Tests cover:
//! - Issue after a credential check, then validate
//! - Lifetimes per token type
//! - Signature failures never reported as expiry
//! - Refresh rules (refresh tokens only, strictly later issue time)
//! - Introspection never failing

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use servicenow_mcp_auth::{
    BoxError, CredentialCheck, CredentialVerifier, JwtConfig, ManualClock, StaticVerifier,
    TokenContext, TokenError, TokenManager, TokenType,
};
use std::sync::Arc;

const TEST_SECRET: &str = "integration-test-secret-with-32-bytes+";
const INSTANCE: &str = "https://dev12345.service-now.com";

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_760_000_000, 0).unwrap()
}

fn manager_with(config: JwtConfig) -> (TokenManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let manager = TokenManager::with_clock(config, clock.clone())
        .with_defaults(TokenContext::for_instance(INSTANCE));
    (manager, clock)
}

fn manager() -> (TokenManager, Arc<ManualClock>) {
    manager_with(JwtConfig::builder().secret(TEST_SECRET).build().unwrap())
}

fn password() -> SecretString {
    SecretString::new("correct-horse".to_string())
}

/// Replace one character in the middle of the signature segment.
fn tamper_signature(token: &str) -> String {
    let sig_start = token.rfind('.').unwrap() + 1;
    let idx = sig_start + 10;
    let mut chars: Vec<char> = token.chars().collect();
    chars[idx] = if chars[idx] == 'A' { 'B' } else { 'A' };
    chars.into_iter().collect()
}

struct UnreachableVerifier;

#[async_trait::async_trait]
impl CredentialVerifier for UnreachableVerifier {
    async fn verify_credentials(
        &self,
        _instance_url: &str,
        _username: &str,
        _password: &SecretString,
    ) -> Result<CredentialCheck, BoxError> {
        Err(Box::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }
}

/// Test: The "alice" scenario
#[tokio::test]
async fn test_issue_then_validate_access_token() {
    // GIVEN: A manager and a verifier that accepts alice's credentials
    let (manager, _clock) = manager();
    let verifier = StaticVerifier(CredentialCheck::Accepted);

    // WHEN: A pair is issued
    let pair = manager
        .issue(&verifier, "alice", &password(), None)
        .await
        .expect("issue should succeed");

    // THEN: The access token validates for alice with type access
    let validated = manager.validate(&pair.access_token).unwrap();
    assert_eq!(validated.claims.subject, "alice");
    assert_eq!(validated.claims.token_type, TokenType::Access);
    assert_eq!(validated.claims.instance_url.as_deref(), Some(INSTANCE));
    assert!(validated.fresh);
}

/// Test: An explicit instance URL overrides the configured default
#[tokio::test]
async fn test_issue_with_explicit_instance() {
    let (manager, _clock) = manager();
    let pair = manager
        .issue(
            &StaticVerifier(CredentialCheck::Accepted),
            "alice",
            &password(),
            Some("https://other.service-now.com"),
        )
        .await
        .unwrap();

    let claims = manager.validate(&pair.refresh_token).unwrap().claims;
    assert_eq!(
        claims.instance_url.as_deref(),
        Some("https://other.service-now.com")
    );
}

/// Test: Lifetimes equal the configured duration per token type
#[test]
fn test_lifetime_matches_configuration() {
    let config = JwtConfig::builder()
        .secret(TEST_SECRET)
        .access_ttl_hours(2)
        .refresh_ttl_days(7)
        .build()
        .unwrap();
    let (manager, _clock) = manager_with(config);

    let pair = manager
        .issue_for_subject("alice", &TokenContext::default())
        .unwrap();
    let access = manager.validate(&pair.access_token).unwrap().claims;
    let refresh = manager.validate(&pair.refresh_token).unwrap().claims;

    assert_eq!(access.expires_at - access.issued_at, TimeDelta::hours(2));
    assert_eq!(refresh.expires_at - refresh.issued_at, TimeDelta::days(7));
    assert_eq!(pair.expires_in, 7200);
}

/// Test: A lifetime past the representable range fails issuance cleanly
#[test]
fn test_lifetime_beyond_timestamp_range() {
    // GIVEN: a TTL that fits a duration but not an expiry instant
    let config = JwtConfig::builder()
        .secret(TEST_SECRET)
        .access_ttl_hours(100_000_000_000)
        .build()
        .unwrap();
    let (manager, _clock) = manager_with(config);

    // WHEN: a pair is issued
    let err = manager
        .issue_for_subject("alice", &TokenContext::default())
        .unwrap_err();

    // THEN: a configuration error, not a panic
    assert!(matches!(err, TokenError::Configuration(_)), "{err:?}");
    assert_eq!(err.kind(), "configuration");
}

/// Test: Rejected credentials produce a generic authentication failure
#[tokio::test]
async fn test_rejected_credentials() {
    let (manager, _clock) = manager();
    let err = manager
        .issue(
            &StaticVerifier(CredentialCheck::Rejected),
            "alice",
            &password(),
            None,
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "authentication_failed");
    let message = err.to_string();
    assert!(!message.contains("correct-horse"));
    assert!(!message.to_lowercase().contains("username"));
}

/// Test: Transport failures are authentication failures with a source
#[tokio::test]
async fn test_unreachable_instance() {
    let (manager, _clock) = manager();
    let err = manager
        .issue(&UnreachableVerifier, "alice", &password(), None)
        .await
        .unwrap_err();

    match err {
        TokenError::AuthenticationFailed { source, .. } => {
            assert!(source.unwrap().to_string().contains("connection refused"));
        }
        other => panic!("expected AuthenticationFailed, got {other:?}"),
    }
}

/// Test: Issuing without any instance URL is a configuration error
#[tokio::test]
async fn test_issue_without_instance_url() {
    let clock = Arc::new(ManualClock::new(t0()));
    let manager = TokenManager::with_clock(
        JwtConfig::builder().secret(TEST_SECRET).build().unwrap(),
        clock,
    );

    let err = manager
        .issue(
            &StaticVerifier(CredentialCheck::Accepted),
            "alice",
            &password(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::Configuration(_)));
}

/// Test: Empty usernames never reach the verifier
#[tokio::test]
async fn test_empty_subject() {
    let (manager, _clock) = manager();
    let err = manager
        .issue(&UnreachableVerifier, "  ", &password(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, TokenError::InvalidSubject));
}

/// Test: A tampered signature is BadSignature, even when the token is stale
#[test]
fn test_tampered_signature_is_never_expired() {
    // GIVEN: A genuine access token
    let (manager, clock) = manager();
    let pair = manager
        .issue_for_subject("alice", &TokenContext::default())
        .unwrap();
    let forged = tamper_signature(&pair.access_token);

    // WHEN: It is validated before and after expiry
    let fresh_err = manager.validate(&forged).unwrap_err();
    clock.advance(TimeDelta::days(3));
    let stale_err = manager.validate(&forged).unwrap_err();

    // THEN: Both report the signature problem
    assert!(matches!(fresh_err, TokenError::BadSignature(_)));
    assert!(matches!(stale_err, TokenError::BadSignature(_)));
}

/// Test: A correctly signed token that expired one second ago is Expired
#[test]
fn test_expired_one_second_ago() {
    let (manager, clock) = manager();
    let pair = manager
        .issue_for_subject("alice", &TokenContext::default())
        .unwrap();

    clock.set(pair.expires_at + TimeDelta::seconds(1));
    match manager.validate(&pair.access_token) {
        Err(TokenError::Expired { expired_at }) => assert_eq!(expired_at, pair.expires_at),
        other => panic!("expected Expired, got {other:?}"),
    }
}

/// Test: Expiry is inclusive of the exact expiry instant
#[test]
fn test_expired_at_exact_instant() {
    let (manager, clock) = manager();
    let pair = manager
        .issue_for_subject("alice", &TokenContext::default())
        .unwrap();

    clock.set(pair.expires_at - TimeDelta::milliseconds(1));
    assert!(manager.validate(&pair.access_token).is_ok());
    clock.set(pair.expires_at);
    assert!(matches!(
        manager.validate(&pair.access_token),
        Err(TokenError::Expired { .. })
    ));
}

/// Test: Tokens signed with a different secret are rejected
#[test]
fn test_different_secret() {
    let (manager, _clock) = manager();
    let (foreign, _clock) = manager_with(
        JwtConfig::builder()
            .secret("a-completely-different-secret-32-bytes!")
            .build()
            .unwrap(),
    );
    let pair = foreign
        .issue_for_subject("mallory", &TokenContext::default())
        .unwrap();

    assert!(matches!(
        manager.validate(&pair.access_token),
        Err(TokenError::BadSignature(_))
    ));
}

/// Test: Tokens signed with a different HMAC algorithm are rejected
#[test]
fn test_different_algorithm() {
    let (manager, _clock) = manager();
    let (hs512, _clock) = manager_with(
        JwtConfig::builder()
            .secret(TEST_SECRET)
            .algorithm(jsonwebtoken::Algorithm::HS512)
            .build()
            .unwrap(),
    );
    let pair = hs512
        .issue_for_subject("alice", &TokenContext::default())
        .unwrap();

    assert!(matches!(
        manager.validate(&pair.access_token),
        Err(TokenError::BadSignature(_))
    ));
}

/// Test: An unsigned `alg: none` copy of a genuine token is a forgery
#[test]
fn test_unsigned_token_is_bad_signature() {
    use base64::Engine as _;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    // GIVEN: a genuine payload under an unsigned header
    let (manager, _clock) = manager();
    let pair = manager
        .issue_for_subject("alice", &TokenContext::default())
        .unwrap();
    let payload = pair.access_token.split('.').nth(1).unwrap();
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let forged = format!("{header}.{payload}.");

    // WHEN/THEN: validation reports a signature failure
    let err = manager.validate(&forged).unwrap_err();
    assert!(matches!(err, TokenError::BadSignature(_)), "{err:?}");
    assert_eq!(err.kind(), "bad_signature");

    // AND: introspection shows the claims but not a valid signature
    let info = manager.introspect(&forged);
    assert_eq!(info.claims.unwrap().subject, "alice");
    assert!(!info.is_signature_valid);
}

/// Test: Same key, foreign issuer or audience
#[test]
fn test_foreign_issuer_and_audience() {
    let (manager, _clock) = manager();

    for config in [
        JwtConfig::builder()
            .secret(TEST_SECRET)
            .issuer("someone-else")
            .build()
            .unwrap(),
        JwtConfig::builder()
            .secret(TEST_SECRET)
            .audience("another-api")
            .build()
            .unwrap(),
    ] {
        let (foreign, _clock) = manager_with(config);
        let pair = foreign
            .issue_for_subject("alice", &TokenContext::default())
            .unwrap();
        let err = manager.validate(&pair.access_token).unwrap_err();
        assert!(matches!(err, TokenError::InvalidClaims(_)), "got {err:?}");

        let info = manager.introspect(&pair.access_token);
        assert!(info.is_signature_valid);
        assert!(info.error.is_some());
    }
}

/// Test: Refresh with an access token is refused
#[test]
fn test_refresh_with_access_token() {
    let (manager, _clock) = manager();
    let pair = manager
        .issue_for_subject("alice", &TokenContext::default())
        .unwrap();

    match manager.refresh(&pair.access_token) {
        Err(TokenError::WrongTokenType { expected, actual }) => {
            assert_eq!(expected, TokenType::Refresh);
            assert_eq!(actual, TokenType::Access);
        }
        other => panic!("expected WrongTokenType, got {other:?}"),
    }
}

/// Test: Refresh keeps the subject and binding with a strictly later iat
#[test]
fn test_refresh_mints_later_pair() {
    // GIVEN: A pair bound to an instance
    let (manager, clock) = manager();
    let context =
        TokenContext::for_instance(INSTANCE).with_client_id(Some("mcp-client".to_string()));
    let original = manager.issue_for_subject("alice", &context).unwrap();
    let original_claims = manager.validate(&original.access_token).unwrap().claims;

    // WHEN: Refreshed within the same second
    clock.advance(TimeDelta::milliseconds(250));
    let refreshed = manager.refresh(&original.refresh_token).unwrap();

    // THEN: Same subject and binding, later issue time
    let claims = manager.validate(&refreshed.access_token).unwrap().claims;
    assert_eq!(claims.subject, "alice");
    assert_eq!(claims.context(), context);
    assert!(claims.issued_at > original_claims.issued_at);
    assert_eq!(claims.issued_at.timestamp(), original_claims.issued_at.timestamp());
    assert_ne!(refreshed.refresh_token, original.refresh_token);
}

/// Test: Expired refresh tokens cannot be used
#[test]
fn test_refresh_with_expired_refresh_token() {
    let (manager, clock) = manager();
    let pair = manager
        .issue_for_subject("alice", &TokenContext::default())
        .unwrap();
    clock.advance(TimeDelta::days(31));

    assert!(matches!(
        manager.refresh(&pair.refresh_token),
        Err(TokenError::Expired { .. })
    ));
}

/// Test: Introspection never fails on garbage
#[test]
fn test_introspect_garbage() {
    let (manager, _clock) = manager();
    for token in ["", "random bytes \u{1}\u{2}", "a.b.c", "....", "eyJhbGciOiJIUzI1NiJ9"] {
        let info = manager.introspect(token);
        assert!(info.claims.is_none(), "{token:?}");
        assert!(info.is_expired);
        assert!(!info.is_signature_valid);
        assert!(info.error.is_some());
    }
}

/// Test: Introspection of a forged token still shows its claims
#[test]
fn test_introspect_forged() {
    let (manager, _clock) = manager();
    let pair = manager
        .issue_for_subject("alice", &TokenContext::default())
        .unwrap();

    let info = manager.introspect(&tamper_signature(&pair.access_token));
    assert_eq!(info.claims.unwrap().subject, "alice");
    assert!(!info.is_expired);
    assert!(!info.is_signature_valid);
}
