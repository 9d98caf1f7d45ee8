//! Table API query parameters.
//!
//! ServiceNow encoded queries join conditions with `^`. Values containing
//! `^` would smuggle extra conditions into the query, so they are refused.

use crate::error::{ClientError, ClientResult};

/// Default number of incidents returned
pub const DEFAULT_INCIDENT_LIMIT: u32 = 20;
/// Default number of knowledge articles returned
pub const DEFAULT_KNOWLEDGE_LIMIT: u32 = 10;
/// Upper bound applied to every `sysparm_limit`
pub const MAX_LIMIT: u32 = 1000;

/// Filters for `GET /api/now/table/incident`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentQuery {
    /// Incident state, e.g. `1` (New) or `2` (In Progress)
    pub state: Option<String>,
    /// Priority, `1` (Critical) to `5` (Planning)
    pub priority: Option<String>,
    /// Assignment group name
    pub assignment_group: Option<String>,
    /// Caller e-mail address
    pub caller_id: Option<String>,
    /// Maximum records (default 20)
    pub limit: Option<u32>,
}

impl IncidentQuery {
    /// Effective `sysparm_limit`.
    pub fn limit(&self) -> u32 {
        clamp_limit(self.limit, DEFAULT_INCIDENT_LIMIT)
    }

    /// Encoded `sysparm_query`, or `None` when no filter is set.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] when a value contains `^`.
    pub fn encoded_query(&self) -> ClientResult<Option<String>> {
        encode(&[
            ("state=", self.state.as_deref()),
            ("priority=", self.priority.as_deref()),
            ("assignment_group.name=", self.assignment_group.as_deref()),
            ("caller_id.email=", self.caller_id.as_deref()),
        ])
    }
}

/// Filters for `GET /api/now/table/kb_knowledge`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeQuery {
    /// Substring matched against the short description
    pub search_term: Option<String>,
    /// Knowledge category
    pub category: Option<String>,
    /// Maximum records (default 10)
    pub limit: Option<u32>,
}

impl KnowledgeQuery {
    /// Effective `sysparm_limit`.
    pub fn limit(&self) -> u32 {
        clamp_limit(self.limit, DEFAULT_KNOWLEDGE_LIMIT)
    }

    /// Encoded `sysparm_query`, or `None` when no filter is set.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidArgument`] when a value contains `^`.
    pub fn encoded_query(&self) -> ClientResult<Option<String>> {
        encode(&[
            ("short_descriptionLIKE", self.search_term.as_deref()),
            ("category=", self.category.as_deref()),
        ])
    }
}

fn clamp_limit(limit: Option<u32>, default: u32) -> u32 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

fn encode(conditions: &[(&str, Option<&str>)]) -> ClientResult<Option<String>> {
    let mut parts = Vec::new();
    for (prefix, value) in conditions {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            continue;
        };
        if value.contains('^') {
            return Err(ClientError::InvalidArgument(format!(
                "Filter value must not contain '^': {value}"
            )));
        }
        parts.push(format!("{prefix}{value}"));
    }
    Ok((!parts.is_empty()).then(|| parts.join("^")))
}
