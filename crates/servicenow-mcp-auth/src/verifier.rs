//! Credential verification seam.
//!
//! Issuing a token pair requires proof that the username/password actually
//! work against the ServiceNow instance. The lifecycle manager does not know
//! how to talk to ServiceNow; the client crate implements this trait.

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::BoxError;

/// Outcome of a completed credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialCheck {
    /// The instance accepted the credentials
    Accepted,
    /// The instance rejected the credentials
    Rejected,
}

/// Verifies username/password credentials against an instance.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Check the credentials.
    ///
    /// # Errors
    ///
    /// Returns an error when the check itself could not complete (network
    /// failure, timeout, unexpected status). Rejection is not an error.
    async fn verify_credentials(
        &self,
        instance_url: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<CredentialCheck, BoxError>;
}

/// Verifier that returns a fixed outcome. Useful for tests and for offline
/// tooling that should never touch the network.
#[derive(Debug, Clone, Copy)]
pub struct StaticVerifier(pub CredentialCheck);

#[async_trait]
impl CredentialVerifier for StaticVerifier {
    async fn verify_credentials(
        &self,
        _instance_url: &str,
        _username: &str,
        _password: &SecretString,
    ) -> Result<CredentialCheck, BoxError> {
        Ok(self.0)
    }
}
