//! ServiceNow Table API client.

use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode, header};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use servicenow_mcp_auth::CredentialSource;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::query::{IncidentQuery, KnowledgeQuery};

const TABLE_API: &str = "api/now/table/";
const INCIDENT_TABLE: &str = "incident";
const KNOWLEDGE_TABLE: &str = "kb_knowledge";

/// Table API response envelope
#[derive(Debug, Deserialize)]
struct TableResponse<T> {
    result: T,
}

/// HTTP client bound to one ServiceNow instance.
///
/// Redirects are never followed. Every call takes the [`CredentialSource`]
/// to authenticate with, so the same client serves bearer and basic auth.
#[derive(Clone)]
pub struct ServiceNowClient {
    http: reqwest::Client,
    instance_url: String,
    table_base: Url,
}

impl std::fmt::Debug for ServiceNowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceNowClient")
            .field("http", &"<reqwest::Client>")
            .field("instance_url", &self.instance_url)
            .finish()
    }
}

impl ServiceNowClient {
    /// Create a client for `instance_url`. Trailing slashes are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidInstanceUrl`] when the URL is not an
    /// absolute http(s) URL, or [`ClientError::Transport`] if the HTTP
    /// client cannot be built.
    pub fn new(instance_url: &str, timeout: Duration) -> ClientResult<Self> {
        let trimmed = instance_url.trim().trim_end_matches('/');
        let invalid = |reason: &str| ClientError::InvalidInstanceUrl {
            url: instance_url.to_string(),
            reason: reason.to_string(),
        };

        let base = Url::parse(&format!("{trimmed}/")).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if base.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        let table_base = base.join(TABLE_API).map_err(|e| invalid(&e.to_string()))?;

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            instance_url: trimmed.to_string(),
            table_base,
        })
    }

    /// Instance URL without trailing slash.
    pub fn instance_url(&self) -> &str {
        &self.instance_url
    }

    /// List incidents matching `query`.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    #[instrument(skip(self, credentials), fields(method = credentials.method()))]
    pub async fn get_incidents(
        &self,
        credentials: &CredentialSource,
        query: &IncidentQuery,
    ) -> ClientResult<Vec<Value>> {
        let encoded = query.encoded_query()?;
        let url = self.table_url(&[INCIDENT_TABLE])?;
        let request = with_query(self.http.get(url), query.limit(), encoded.as_deref());
        self.send(request, credentials).await
    }

    /// Search knowledge articles.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    #[instrument(skip(self, credentials), fields(method = credentials.method()))]
    pub async fn search_knowledge_base(
        &self,
        credentials: &CredentialSource,
        query: &KnowledgeQuery,
    ) -> ClientResult<Vec<Value>> {
        let encoded = query.encoded_query()?;
        let url = self.table_url(&[KNOWLEDGE_TABLE])?;
        let request = with_query(self.http.get(url), query.limit(), encoded.as_deref());
        self.send(request, credentials).await
    }

    /// Fetch one knowledge article by `sys_id`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] for an empty id without
    /// sending a request.
    #[instrument(skip(self, credentials), fields(method = credentials.method()))]
    pub async fn get_knowledge_article(
        &self,
        credentials: &CredentialSource,
        article_id: &str,
    ) -> ClientResult<Value> {
        let article_id = article_id.trim();
        if article_id.is_empty() {
            return Err(ClientError::InvalidArgument(
                "article_id must not be empty".to_string(),
            ));
        }
        let url = self.table_url(&[KNOWLEDGE_TABLE, article_id])?;
        self.send(self.http.get(url), credentials).await
    }

    /// Probe the instance with a one-record incident query.
    ///
    /// # Errors
    ///
    /// See [`ClientError`]. Rejected credentials yield
    /// [`ClientError::Unauthorized`].
    #[instrument(skip(self, credentials), fields(method = credentials.method()))]
    pub async fn test_connection(&self, credentials: &CredentialSource) -> ClientResult<()> {
        let url = self.table_url(&[INCIDENT_TABLE])?;
        let request = with_query(self.http.get(url), 1, None);
        let _: Value = self.send(request, credentials).await?;
        Ok(())
    }

    fn table_url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.table_base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidInstanceUrl {
                url: self.instance_url.clone(),
                reason: "cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        credentials: &CredentialSource,
    ) -> ClientResult<T> {
        let request = match credentials {
            CredentialSource::Jwt { token, .. } => request.bearer_auth(token.expose_secret()),
            CredentialSource::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose_secret()))
            }
        };

        let response = request
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        debug!(status = status.as_u16(), "ServiceNow responded");

        match status {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let envelope: TableResponse<T> = serde_json::from_slice(&body)
                    .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
                Ok(envelope.result)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(status = status.as_u16(), "ServiceNow rejected credentials");
                Err(ClientError::Unauthorized {
                    status: status.as_u16(),
                })
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ClientError::status(status.as_u16(), &body))
            }
        }
    }
}

fn with_query(request: RequestBuilder, limit: u32, encoded: Option<&str>) -> RequestBuilder {
    let request = request.query(&[("sysparm_limit", limit.to_string())]);
    match encoded {
        Some(encoded) => request.query(&[("sysparm_query", encoded)]),
        None => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slashes_stripped() {
        let client =
            ServiceNowClient::new("https://dev12345.service-now.com//", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.instance_url(), "https://dev12345.service-now.com");
        assert_eq!(
            client.table_url(&["incident"]).unwrap().as_str(),
            "https://dev12345.service-now.com/api/now/table/incident"
        );
    }

    #[test]
    fn test_article_id_is_path_encoded() {
        let client =
            ServiceNowClient::new("https://dev12345.service-now.com", Duration::from_secs(5))
                .unwrap();
        let url = client.table_url(&["kb_knowledge", "a/b c"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://dev12345.service-now.com/api/now/table/kb_knowledge/a%2Fb%20c"
        );
    }

    #[test]
    fn test_rejects_bad_urls() {
        for url in ["", "not a url", "ftp://example.com", "dev12345.service-now.com"] {
            assert!(
                matches!(
                    ServiceNowClient::new(url, Duration::from_secs(5)),
                    Err(ClientError::InvalidInstanceUrl { .. })
                ),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn test_debug_hides_http_client() {
        let client =
            ServiceNowClient::new("https://dev12345.service-now.com", Duration::from_secs(5))
                .unwrap();
        assert!(format!("{client:?}").contains("<reqwest::Client>"));
    }
}
