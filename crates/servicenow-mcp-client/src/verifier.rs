//! Credential verification backed by a live ServiceNow probe.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use servicenow_mcp_auth::{BoxError, CredentialCheck, CredentialSource, CredentialVerifier};
use tracing::debug;

use crate::client::ServiceNowClient;
use crate::error::ClientError;

/// Checks a username/password pair with a one-record incident query.
///
/// HTTP 200 accepts, 401/403 rejects, anything else is reported as a
/// failure to verify.
#[derive(Debug, Clone, Copy)]
pub struct BasicAuthVerifier {
    timeout: Duration,
}

impl BasicAuthVerifier {
    /// Verifier whose probe gives up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CredentialVerifier for BasicAuthVerifier {
    async fn verify_credentials(
        &self,
        instance_url: &str,
        username: &str,
        password: &SecretString,
    ) -> Result<CredentialCheck, BoxError> {
        let client = ServiceNowClient::new(instance_url, self.timeout)?;
        let credentials = CredentialSource::Basic {
            username: username.to_string(),
            password: password.clone(),
        };

        match client.test_connection(&credentials).await {
            Ok(()) => Ok(CredentialCheck::Accepted),
            Err(ClientError::Unauthorized { status }) => {
                debug!(status, username, "Credential probe rejected");
                Ok(CredentialCheck::Rejected)
            }
            Err(e) => Err(Box::new(e)),
        }
    }
}
