//! Tool argument types. The JSON schemas advertised in `tools/list` are
//! derived from these with `schemars`.

use schemars::JsonSchema;
use secrecy::SecretString;
use serde::Deserialize;
use servicenow_mcp_client::{IncidentQuery, KnowledgeQuery};

/// Arguments for `get_servicenow_incidents`.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct IncidentArgs {
    /// Incident state: 1=New, 2=In Progress, 3=On Hold, 6=Resolved, 7=Closed
    pub state: Option<String>,
    /// Priority: 1=Critical, 2=High, 3=Moderate, 4=Low, 5=Planning
    pub priority: Option<String>,
    /// Assignment group name
    pub assignment_group: Option<String>,
    /// Caller e-mail address
    pub caller_id: Option<String>,
    /// Maximum number of incidents to return (default 20)
    pub limit: Option<u32>,
}

impl From<IncidentArgs> for IncidentQuery {
    fn from(args: IncidentArgs) -> Self {
        Self {
            state: args.state,
            priority: args.priority,
            assignment_group: args.assignment_group,
            caller_id: args.caller_id,
            limit: args.limit,
        }
    }
}

/// Arguments for `search_knowledge_base`.
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct KnowledgeSearchArgs {
    /// Text matched against article short descriptions
    pub search_term: Option<String>,
    /// Knowledge category
    pub category: Option<String>,
    /// Maximum number of articles to return (default 10)
    pub limit: Option<u32>,
}

impl From<KnowledgeSearchArgs> for KnowledgeQuery {
    fn from(args: KnowledgeSearchArgs) -> Self {
        Self {
            search_term: args.search_term,
            category: args.category,
            limit: args.limit,
        }
    }
}

/// Arguments for `get_knowledge_article`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ArticleArgs {
    /// The article `sys_id`
    pub article_id: String,
}

/// Arguments for `generate_jwt_token`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateTokenArgs {
    /// ServiceNow username
    pub username: String,
    /// ServiceNow password, used once to verify the account
    #[schemars(with = "String")]
    pub password: SecretString,
    /// Instance URL; defaults to SERVICENOW_INSTANCE_URL
    pub instance_url: Option<String>,
}

/// Arguments for tools that take a single token.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TokenArgs {
    /// The JWT to check
    #[schemars(with = "String")]
    pub token: SecretString,
}

/// Arguments for `refresh_jwt_token`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct RefreshArgs {
    /// A refresh token from `generate_jwt_token` or an earlier refresh
    #[schemars(with = "String")]
    pub refresh_token: SecretString,
}
