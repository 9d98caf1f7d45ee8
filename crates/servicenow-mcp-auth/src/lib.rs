//! # ServiceNow MCP Auth
//!
//! Self-contained JWT lifecycle for the ServiceNow MCP server, plus the
//! gate that decides how each ServiceNow call authenticates.
//!
//! ## Components
//!
//! - [`ClaimsBuilder`] - stamps subject, issuer, audience, type and
//!   timestamps from the frozen [`JwtConfig`] and an injected [`Clock`]
//! - [`TokenSigner`] - HMAC sign/verify via `jsonwebtoken`, plus an
//!   unverified decode for introspection
//! - [`TokenManager`] - issue (after a [`CredentialVerifier`] check),
//!   validate, refresh and introspect
//! - [`CredentialGate`] - resolves a [`CredentialSource`] per call: a valid
//!   configured JWT, else basic credentials
//!
//! ## Example
//!
//! ```rust
//! use servicenow_mcp_auth::{JwtConfig, TokenContext, TokenManager, TokenType};
//!
//! let config = JwtConfig::builder()
//!     .secret("an-example-secret-that-is-32-bytes-long")
//!     .build()?;
//! let manager = TokenManager::new(config);
//!
//! let pair = manager.issue_for_subject("alice", &TokenContext::default())?;
//! let validated = manager.validate(&pair.access_token)?;
//! assert_eq!(validated.claims.subject, "alice");
//! assert_eq!(validated.claims.token_type, TokenType::Access);
//!
//! let refreshed = manager.refresh(&pair.refresh_token)?;
//! assert!(manager.refresh(&refreshed.access_token).is_err());
//! # Ok::<(), servicenow_mcp_auth::TokenError>(())
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]

pub mod claims;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod manager;
pub mod signer;
pub mod verifier;

pub use claims::{ClaimsBuilder, TokenClaims, TokenContext, TokenType};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    JwtConfig, JwtConfigBuilder, KeyOrigin, ServiceNowConfig, generate_secret, parse_algorithm,
};
pub use error::{BoxError, TokenError, TokenResult};
pub use gate::{CredentialGate, CredentialSource};
pub use manager::{TokenIntrospection, TokenManager, TokenPair, ValidatedToken};
pub use signer::TokenSigner;
pub use verifier::{CredentialCheck, CredentialVerifier, StaticVerifier};
