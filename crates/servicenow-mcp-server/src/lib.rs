//! # ServiceNow MCP Server
//!
//! Exposes ServiceNow incidents and knowledge base articles to AI assistants
//! as MCP tools, plus the JWT helpers that let the server authenticate with
//! a token instead of a stored password.
//!
//! ## Tools
//!
//! | Tool | Purpose |
//! |------|---------|
//! | `get_servicenow_incidents` | List incidents by state, priority, group or caller |
//! | `search_knowledge_base` | Search articles by short description and category |
//! | `get_knowledge_article` | Fetch one article by `sys_id` |
//! | `test_connection` | Probe the instance with the resolved credentials |
//! | `generate_jwt_token` | Verify username/password, issue an access/refresh pair |
//! | `validate_jwt_token` | Full validation, reports freshness |
//! | `refresh_jwt_token` | Exchange a refresh token for a new pair |
//! | `get_jwt_token_info` | Introspect any token without failing |
//!
//! ## Credentials
//!
//! Each ServiceNow call goes through the credential gate: a valid
//! `SERVICENOW_JWT_TOKEN` is sent as a bearer token, otherwise
//! `SERVICENOW_USERNAME`/`SERVICENOW_PASSWORD` as basic auth.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]

pub mod args;
pub mod cli;
pub mod logging;
pub mod sanitize;
pub mod settings;
pub mod tools;

pub use cli::{Cli, Command, CommandOutput, TokenCommand};
pub use logging::{LogFormat, LoggingConfig, LoggingGuard};
pub use settings::{Settings, SettingsError};
pub use tools::{SERVER_NAME, SERVER_VERSION, ServiceNowMcp};

use secrecy::ExposeSecret;
use servicenow_mcp_auth::{KeyOrigin, TokenManager};
use servicenow_mcp_client::ClientError;
use servicenow_mcp_core::McpError;
use thiserror::Error;
use tracing::{info, warn};

/// Failures that stop the server.
#[derive(Debug, Error)]
pub enum ServeError {
    /// The ServiceNow client could not be built
    #[error(transparent)]
    Client(#[from] ClientError),

    /// stdin/stdout failed
    #[error("Transport failed: {0}")]
    Transport(#[from] McpError),
}

/// Warn about settings that work but will surprise an operator.
pub fn log_startup_warnings(settings: &Settings) {
    if settings.jwt.key_origin() == KeyOrigin::Generated {
        warn!(
            "JWT_SECRET_KEY is not set; using a key generated at startup. Issued tokens stop \
             validating after a restart. Run `servicenow-mcp token generate-secret` to create one."
        );
    }

    let servicenow = &settings.servicenow;
    if servicenow.instance_url.is_none() {
        warn!("SERVICENOW_INSTANCE_URL is not set; ServiceNow tools will fail until it is");
    }
    let has_token = servicenow
        .jwt_token
        .as_ref()
        .is_some_and(|t| !t.expose_secret().trim().is_empty());
    if !has_token && !servicenow.has_basic_credentials() {
        warn!("No ServiceNow credentials configured (SERVICENOW_JWT_TOKEN or SERVICENOW_USERNAME/SERVICENOW_PASSWORD)");
    }
}

/// Serve the tools over stdio until EOF or Ctrl-C.
///
/// # Errors
///
/// Returns [`ServeError`] when the handler cannot be built or the stdio
/// transport fails.
pub async fn serve(settings: Settings) -> Result<(), ServeError> {
    log_startup_warnings(&settings);

    let manager = TokenManager::new(settings.jwt);
    let handler = ServiceNowMcp::new(manager, settings.servicenow)?;
    info!(
        server = SERVER_NAME,
        version = SERVER_VERSION,
        ?handler,
        "Starting ServiceNow MCP server"
    );

    tokio::select! {
        result = servicenow_mcp_core::transport::run_stdio(handler) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, shutting down"),
    }
    Ok(())
}
