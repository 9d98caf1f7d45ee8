//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use servicenow_mcp_auth::TokenManager;

use crate::logging::LogFormat;

/// ServiceNow MCP server and token tooling
#[derive(Parser, Debug)]
#[command(
    name = "servicenow-mcp",
    version,
    about = "ServiceNow tools for AI assistants over the Model Context Protocol",
    long_about = "Serves ServiceNow incident and knowledge base tools over MCP stdio, and \
                  manages the JWTs used to authenticate against ServiceNow.\n\n\
                  Settings come from an optional --config file, then the environment \
                  (JWT_SECRET_KEY, SERVICENOW_INSTANCE_URL, ...), after loading .env."
)]
pub struct Cli {
    /// Subcommand to run (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Settings file (.toml, .yaml, .yml or .json)
    #[arg(long, global = true, env = "SERVICENOW_MCP_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Load environment variables from this file instead of `./.env`
    #[arg(long, global = true, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `servicenow_mcp_client=trace`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log line format
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the MCP server on stdin/stdout
    Serve,

    /// Token utilities
    #[command(subcommand)]
    Token(TokenCommand),
}

/// Token utilities. All of them use the configured signing settings.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TokenCommand {
    /// Print a random 32-byte secret for JWT_SECRET_KEY
    GenerateSecret,

    /// Describe a token without failing
    Inspect {
        /// The token
        token: String,
    },

    /// Validate a token; exits with status 1 when it is not valid
    Validate {
        /// The token
        token: String,
    },

    /// Exchange a refresh token for a new pair
    Refresh {
        /// The refresh token
        token: String,
    },
}

/// JSON printed by a token command, and whether it succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutput {
    /// Printed to stdout
    pub body: Value,
    /// Maps to the exit status
    pub success: bool,
}

impl TokenCommand {
    /// Run a command that needs the token manager.
    ///
    /// `GenerateSecret` does not; callers handle it before settings load.
    pub fn execute(&self, manager: &TokenManager) -> CommandOutput {
        match self {
            Self::GenerateSecret => CommandOutput {
                body: json!({ "secret": servicenow_mcp_auth::generate_secret() }),
                success: true,
            },
            Self::Inspect { token } => CommandOutput {
                body: json!(manager.introspect(token)),
                success: true,
            },
            Self::Validate { token } => match manager.validate(token) {
                Ok(validated) => CommandOutput {
                    body: json!({
                        "valid": true,
                        "fresh": validated.fresh,
                        "claims": validated.claims,
                    }),
                    success: true,
                },
                Err(err) => CommandOutput {
                    body: json!({
                        "valid": false,
                        "error": err.to_string(),
                        "error_kind": err.kind(),
                    }),
                    success: false,
                },
            },
            Self::Refresh { token } => match manager.refresh(token) {
                Ok(pair) => CommandOutput {
                    body: json!(pair),
                    success: true,
                },
                Err(err) => CommandOutput {
                    body: json!({
                        "error": err.to_string(),
                        "error_kind": err.kind(),
                    }),
                    success: false,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use servicenow_mcp_auth::{JwtConfig, TokenContext};

    fn manager() -> TokenManager {
        TokenManager::new(
            JwtConfig::builder()
                .secret("cli-unit-test-secret-with-at-least-32b")
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::try_parse_from(["servicenow-mcp"]).unwrap();
        assert_eq!(cli.command, None);

        let cli = Cli::try_parse_from([
            "servicenow-mcp",
            "serve",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.command, Some(Command::Serve));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }

    #[test]
    fn test_token_subcommands_parse() {
        let cli = Cli::try_parse_from(["servicenow-mcp", "token", "validate", "abc.def.ghi"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Token(TokenCommand::Validate {
                token: "abc.def.ghi".to_string()
            }))
        );
        let cli = Cli::try_parse_from(["servicenow-mcp", "token", "generate-secret"]).unwrap();
        assert_eq!(cli.command, Some(Command::Token(TokenCommand::GenerateSecret)));
    }

    #[test]
    fn test_validate_and_refresh_outputs() {
        let manager = manager();
        let pair = manager
            .issue_for_subject("alice", &TokenContext::default())
            .unwrap();

        let valid = TokenCommand::Validate {
            token: pair.access_token.clone(),
        }
        .execute(&manager);
        assert!(valid.success);
        assert_eq!(valid.body["claims"]["sub"], "alice");

        let wrong_type = TokenCommand::Refresh {
            token: pair.access_token.clone(),
        }
        .execute(&manager);
        assert!(!wrong_type.success);
        assert_eq!(wrong_type.body["error_kind"], "wrong_token_type");

        let refreshed = TokenCommand::Refresh {
            token: pair.refresh_token,
        }
        .execute(&manager);
        assert!(refreshed.success);
        assert_eq!(refreshed.body["token_type"], "Bearer");
    }

    #[test]
    fn test_invalid_token_fails_validate_but_not_inspect() {
        let manager = manager();
        let invalid = TokenCommand::Validate {
            token: "garbage".to_string(),
        }
        .execute(&manager);
        assert!(!invalid.success);
        assert_eq!(invalid.body["valid"], false);

        let inspected = TokenCommand::Inspect {
            token: "garbage".to_string(),
        }
        .execute(&manager);
        assert!(inspected.success);
        assert_eq!(inspected.body["is_signature_valid"], false);
    }

    #[test]
    fn test_generate_secret_output() {
        let output = TokenCommand::GenerateSecret.execute(&manager());
        assert_eq!(output.body["secret"].as_str().unwrap().len(), 43);
    }
}
