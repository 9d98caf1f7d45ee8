//! The ServiceNow MCP tool handler.
//!
//! ServiceNow tools resolve their credentials through the
//! [`CredentialGate`] on every call. JWT tools go straight to the
//! [`TokenManager`].
//!
//! Domain failures come back as tool results with `isError: true` and a
//! `{success: false, error, error_kind, timestamp}` body. Unknown tools and
//! undecodable arguments are JSON-RPC errors.

use std::future::Future;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use servicenow_mcp_auth::{
    CredentialGate, CredentialSource, CredentialVerifier, KeyOrigin, ServiceNowConfig, TokenContext,
    TokenError, TokenManager, TokenPair,
};
use servicenow_mcp_client::{
    BasicAuthVerifier, ClientError, ClientResult, IncidentQuery, KnowledgeQuery, ServiceNowClient,
};
use servicenow_mcp_core::types::ToolAnnotations;
use servicenow_mcp_core::{
    McpError, McpHandler, McpResult, RequestContext, ServerInfo, Tool, ToolInputSchema, ToolResult,
};
use tracing::{Instrument, info, info_span, warn};

use crate::args::{
    ArticleArgs, GenerateTokenArgs, IncidentArgs, KnowledgeSearchArgs, RefreshArgs, TokenArgs,
};
use crate::sanitize::sanitize_article;

/// Server name reported in `initialize`
pub const SERVER_NAME: &str = "servicenow-mcp";
/// Server version reported in `initialize`
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Tool names.
pub mod names {
    /// List incidents
    pub const GET_INCIDENTS: &str = "get_servicenow_incidents";
    /// Search the knowledge base
    pub const SEARCH_KNOWLEDGE: &str = "search_knowledge_base";
    /// Fetch one knowledge article
    pub const GET_ARTICLE: &str = "get_knowledge_article";
    /// Probe the instance
    pub const TEST_CONNECTION: &str = "test_connection";
    /// Issue a token pair
    pub const GENERATE_TOKEN: &str = "generate_jwt_token";
    /// Validate a token
    pub const VALIDATE_TOKEN: &str = "validate_jwt_token";
    /// Refresh a token pair
    pub const REFRESH_TOKEN: &str = "refresh_jwt_token";
    /// Introspect a token
    pub const TOKEN_INFO: &str = "get_jwt_token_info";
}

/// A failed tool call, rendered as an error result.
#[derive(Debug)]
struct ToolFailure {
    message: String,
    kind: &'static str,
}

impl ToolFailure {
    fn configuration(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: "configuration",
        }
    }
}

impl From<TokenError> for ToolFailure {
    fn from(err: TokenError) -> Self {
        Self {
            message: error_chain(&err),
            kind: err.kind(),
        }
    }
}

impl From<ClientError> for ToolFailure {
    fn from(err: ClientError) -> Self {
        Self {
            message: error_chain(&err),
            kind: err.kind(),
        }
    }
}

/// `err` followed by each cause its message does not already include.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}

type ToolOutcome = Result<Value, ToolFailure>;

struct ServerState {
    manager: Arc<TokenManager>,
    gate: CredentialGate,
    servicenow: ServiceNowConfig,
    client: Option<ServiceNowClient>,
    verifier: Arc<dyn CredentialVerifier>,
}

/// MCP handler exposing the ServiceNow and JWT tools.
#[derive(Clone)]
pub struct ServiceNowMcp {
    state: Arc<ServerState>,
}

impl std::fmt::Debug for ServiceNowMcp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceNowMcp")
            .field("instance_url", &self.state.servicenow.instance_url)
            .field("key_origin", &self.state.manager.config().key_origin())
            .finish_non_exhaustive()
    }
}

impl ServiceNowMcp {
    /// Handler that verifies `generate_jwt_token` credentials against the
    /// configured instance.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidInstanceUrl`] when the configured
    /// instance URL is unusable.
    pub fn new(manager: TokenManager, servicenow: ServiceNowConfig) -> ClientResult<Self> {
        let verifier = Arc::new(BasicAuthVerifier::new(servicenow.timeout));
        Self::with_verifier(manager, servicenow, verifier)
    }

    /// Handler with an explicit credential verifier.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidInstanceUrl`] when the configured
    /// instance URL is unusable.
    pub fn with_verifier(
        manager: TokenManager,
        servicenow: ServiceNowConfig,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> ClientResult<Self> {
        let client = servicenow
            .instance_url
            .as_deref()
            .map(|url| ServiceNowClient::new(url, servicenow.timeout))
            .transpose()?;

        let manager = Arc::new(manager.with_defaults(TokenContext {
            instance_url: servicenow.instance_url.clone(),
            client_id: servicenow.client_id.clone(),
        }));

        Ok(Self {
            state: Arc::new(ServerState {
                gate: CredentialGate::new(manager.clone()),
                manager,
                servicenow,
                client,
                verifier,
            }),
        })
    }

    async fn dispatch(&self, name: &str, args: Value) -> McpResult<ToolResult> {
        let outcome = match name {
            names::GET_INCIDENTS => self.get_incidents(parse_args(name, args)?).await,
            names::SEARCH_KNOWLEDGE => self.search_knowledge_base(parse_args(name, args)?).await,
            names::GET_ARTICLE => self.get_knowledge_article(parse_args(name, args)?).await,
            names::TEST_CONNECTION => self.test_connection().await,
            names::GENERATE_TOKEN => self.generate_token(parse_args(name, args)?).await,
            names::VALIDATE_TOKEN => Ok(self.validate_token(&parse_args(name, args)?)),
            names::REFRESH_TOKEN => self.refresh_token(&parse_args(name, args)?),
            names::TOKEN_INFO => self.token_info(&parse_args(name, args)?),
            _ => return Err(McpError::tool_not_found(name)),
        };

        match outcome {
            Ok(value) => Ok(ToolResult::json(&value)?),
            Err(failure) => {
                warn!(tool = name, error_kind = failure.kind, error = %failure.message, "Tool failed");
                let body = json!({
                    "success": false,
                    "error": failure.message,
                    "error_kind": failure.kind,
                    "timestamp": timestamp(),
                });
                Ok(ToolResult::json(&body)?.into_error())
            }
        }
    }

    fn connection(&self) -> Result<(&ServiceNowClient, CredentialSource), ToolFailure> {
        let client = self.state.client.as_ref().ok_or_else(|| {
            ToolFailure::configuration("SERVICENOW_INSTANCE_URL is not configured")
        })?;
        let credentials = self.state.gate.resolve(&self.state.servicenow)?;
        Ok((client, credentials))
    }

    async fn get_incidents(&self, args: IncidentArgs) -> ToolOutcome {
        let (client, credentials) = self.connection()?;
        let incidents = client
            .get_incidents(&credentials, &IncidentQuery::from(args))
            .await?;
        info!(count = incidents.len(), "Retrieved incidents");
        Ok(json!({
            "success": true,
            "count": incidents.len(),
            "incidents": incidents,
            "timestamp": timestamp(),
        }))
    }

    async fn search_knowledge_base(&self, args: KnowledgeSearchArgs) -> ToolOutcome {
        let (client, credentials) = self.connection()?;
        let mut articles = client
            .search_knowledge_base(&credentials, &KnowledgeQuery::from(args))
            .await?;
        articles.iter_mut().for_each(sanitize_article);
        info!(count = articles.len(), "Searched knowledge base");
        Ok(json!({
            "success": true,
            "count": articles.len(),
            "articles": articles,
            "timestamp": timestamp(),
        }))
    }

    async fn get_knowledge_article(&self, args: ArticleArgs) -> ToolOutcome {
        let (client, credentials) = self.connection()?;
        let article = client
            .get_knowledge_article(&credentials, &args.article_id)
            .await?;
        info!(article_id = %args.article_id, "Retrieved knowledge article");
        Ok(json!({
            "success": true,
            "article": article,
            "timestamp": timestamp(),
        }))
    }

    async fn test_connection(&self) -> ToolOutcome {
        let (client, credentials) = self.connection()?;
        client.test_connection(&credentials).await?;
        info!(auth_method = credentials.method(), "ServiceNow connection test passed");
        Ok(json!({
            "success": true,
            "message": "ServiceNow connection is working",
            "connection_details": {
                "instance_url": client.instance_url(),
                "username": credentials.username(),
                "auth_method": credentials.method(),
            },
            "timestamp": timestamp(),
        }))
    }

    async fn generate_token(&self, args: GenerateTokenArgs) -> ToolOutcome {
        let pair = self
            .state
            .manager
            .issue(
                self.state.verifier.as_ref(),
                &args.username,
                &args.password,
                args.instance_url.as_deref(),
            )
            .await?;

        let config = self.state.manager.config();
        let mut instructions = json!({
            "access_token": "Set as SERVICENOW_JWT_TOKEN environment variable",
            "refresh_token": "Store securely for token renewal",
            "expires_in_hours": config.access_ttl().num_hours(),
            "refresh_expires_in_days": config.refresh_ttl().num_days(),
            "key_origin": config.key_origin(),
        });
        if config.key_origin() == KeyOrigin::Generated {
            instructions["warning"] = json!(
                "The signing key was generated at startup. These tokens stop validating when the \
                 server restarts. Set JWT_SECRET_KEY (see `servicenow-mcp token generate-secret`)."
            );
        }

        Ok(json!({
            "success": true,
            "message": "JWT tokens generated successfully",
            "tokens": tokens_view(&pair),
            "usage_instructions": instructions,
            "timestamp": timestamp(),
        }))
    }

    fn validate_token(&self, args: &TokenArgs) -> Value {
        match self.state.manager.validate(args.token.expose_secret()) {
            Ok(validated) => json!({
                "valid": true,
                "claims": validated.claims,
                "fresh": validated.fresh,
                "timestamp": timestamp(),
            }),
            Err(err) => json!({
                "valid": false,
                "error": err.to_string(),
                "error_kind": err.kind(),
                "timestamp": timestamp(),
            }),
        }
    }

    fn refresh_token(&self, args: &RefreshArgs) -> ToolOutcome {
        let pair = self
            .state
            .manager
            .refresh(args.refresh_token.expose_secret())?;
        Ok(json!({
            "success": true,
            "message": "JWT tokens refreshed successfully",
            "tokens": tokens_view(&pair),
            "usage_instructions": {
                "access_token": "Update SERVICENOW_JWT_TOKEN environment variable",
                "refresh_token": "Store the new refresh token securely",
                "expires_in_hours": self.state.manager.config().access_ttl().num_hours(),
            },
            "timestamp": timestamp(),
        }))
    }

    fn token_info(&self, args: &TokenArgs) -> ToolOutcome {
        let introspection = self.state.manager.introspect(args.token.expose_secret());
        let mut value = serde_json::to_value(&introspection)
            .map_err(|e| ToolFailure::configuration(e.to_string()))?;
        if let Some(map) = value.as_object_mut() {
            map.insert("timestamp".to_string(), json!(timestamp()));
        }
        Ok(value)
    }
}

impl McpHandler for ServiceNowMcp {
    fn server_info(&self) -> ServerInfo {
        ServerInfo::new(SERVER_NAME, SERVER_VERSION).with_title("ServiceNow")
    }

    fn list_tools(&self) -> Vec<Tool> {
        let read_only = ToolAnnotations::default()
            .with_read_only(true)
            .with_open_world(true);
        let local = ToolAnnotations::default()
            .with_read_only(true)
            .with_open_world(false);

        vec![
            Tool::new(
                names::GET_INCIDENTS,
                "List ServiceNow incidents filtered by state, priority, assignment group or caller",
            )
            .with_schema(schema::<IncidentArgs>())
            .with_annotations(read_only.clone()),
            Tool::new(
                names::SEARCH_KNOWLEDGE,
                "Search knowledge base articles by short description and category",
            )
            .with_schema(schema::<KnowledgeSearchArgs>())
            .with_annotations(read_only.clone()),
            Tool::new(
                names::GET_ARTICLE,
                "Fetch a single knowledge base article by sys_id",
            )
            .with_schema(schema::<ArticleArgs>())
            .with_annotations(read_only.clone()),
            Tool::new(
                names::TEST_CONNECTION,
                "Check that the ServiceNow instance is reachable with the configured credentials",
            )
            .with_annotations(read_only),
            Tool::new(
                names::GENERATE_TOKEN,
                "Verify a ServiceNow username and password, then issue an access/refresh token pair",
            )
            .with_schema(schema::<GenerateTokenArgs>())
            .with_annotations(
                ToolAnnotations::default()
                    .with_read_only(false)
                    .with_open_world(true),
            ),
            Tool::new(
                names::VALIDATE_TOKEN,
                "Validate a JWT: signature, issuer, audience and expiry",
            )
            .with_schema(schema::<TokenArgs>())
            .with_annotations(local.clone()),
            Tool::new(
                names::REFRESH_TOKEN,
                "Exchange a refresh token for a new token pair",
            )
            .with_schema(schema::<RefreshArgs>())
            .with_annotations(local.clone()),
            Tool::new(
                names::TOKEN_INFO,
                "Describe any token without failing: claims, expiry and signature status",
            )
            .with_schema(schema::<TokenArgs>())
            .with_annotations(local),
        ]
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        args: Value,
        ctx: &'a RequestContext,
    ) -> impl Future<Output = McpResult<ToolResult>> + Send + 'a {
        let span = info_span!("tool_call", tool = name, request_id = %ctx.request_id);
        self.dispatch(name, args).instrument(span)
    }
}

fn schema<A: JsonSchema>() -> ToolInputSchema {
    match serde_json::to_value(schemars::schema_for!(A)).and_then(ToolInputSchema::from_value) {
        Ok(schema) => schema,
        Err(e) => {
            warn!(
                args = std::any::type_name::<A>(),
                error = %e,
                "Tool input schema is unusable, advertising an empty one"
            );
            ToolInputSchema::default()
        }
    }
}

fn parse_args<A: DeserializeOwned>(tool: &str, args: Value) -> McpResult<A> {
    serde_json::from_value(args)
        .map_err(|e| McpError::invalid_params(format!("Invalid arguments for {tool}: {e}")))
}

fn tokens_view(pair: &TokenPair) -> Value {
    json!({
        "access_token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "token_type": pair.token_type,
        "expires_in": pair.expires_in,
        "expires_at": pair.expires_at,
        "refresh_expires_at": pair.refresh_expires_at,
    })
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
