//! # ServiceNow MCP Client
//!
//! Thin client for the ServiceNow Table API (`/api/now/table/...`).
//!
//! Every request carries the [`CredentialSource`](servicenow_mcp_auth::CredentialSource)
//! chosen by the credential gate: a JWT goes out as a bearer token, a
//! username/password pair as HTTP basic auth.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | [`ServiceNowClient::get_incidents`] | `GET incident?sysparm_limit&sysparm_query` |
//! | [`ServiceNowClient::search_knowledge_base`] | `GET kb_knowledge?sysparm_limit&sysparm_query` |
//! | [`ServiceNowClient::get_knowledge_article`] | `GET kb_knowledge/{sys_id}` |
//! | [`ServiceNowClient::test_connection`] | `GET incident?sysparm_limit=1` |
//!
//! [`BasicAuthVerifier`] plugs the connection probe into the token
//! manager so token pairs are only issued for working credentials.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    clippy::all
)]

pub mod client;
pub mod error;
pub mod query;
pub mod verifier;

pub use client::ServiceNowClient;
pub use error::{ClientError, ClientResult};
pub use query::{
    DEFAULT_INCIDENT_LIMIT, DEFAULT_KNOWLEDGE_LIMIT, IncidentQuery, KnowledgeQuery, MAX_LIMIT,
};
pub use verifier::BasicAuthVerifier;
