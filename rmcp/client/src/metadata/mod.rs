//! OAuth 2.0 metadata consumed by MCP clients.
//!
//! - RFC 9728 protected resource metadata, located from a `WWW-Authenticate`
//!   challenge or the well-known conventions ([`McpMetadataDiscovery`]).
//! - RFC 8414 / OpenID Connect authorization server metadata
//!   ([`AuthorizationServerMetadata`]).

mod authorization_server;
mod challenge;
mod discovery;

pub use authorization_server::{AuthorizationServerMetadata, fetch_authorization_server_metadata};
pub use challenge::WwwAuthenticateParameters;
pub use discovery::McpMetadataDiscovery;

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

/// Protected resource metadata as published by an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_servers: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_methods_supported: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,

    /// Any further claims of the document.
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

impl ProtectedResourceMetadata {
    /// Reject documents with a missing or invalid `resource`, invalid
    /// authorization server URLs, or list fields that are present but empty.
    pub fn validate(&self) -> Result<()> {
        if self.resource.trim().is_empty() {
            return Err(Error::Discovery("resource cannot be empty".into()));
        }
        Url::parse(&self.resource).map_err(|_| {
            Error::Discovery(format!("resource must be a valid URL: {}", self.resource))
        })?;
        if let Some(servers) = &self.authorization_servers {
            if servers.is_empty() {
                return Err(Error::Discovery("authorization_servers cannot be empty".into()));
            }
            for server in servers {
                Url::parse(server).map_err(|_| {
                    Error::Discovery(format!("authorization_servers must be valid URLs: {server}"))
                })?;
            }
        }
        for (name, list) in [
            ("scopes_supported", &self.scopes_supported),
            ("bearer_methods_supported", &self.bearer_methods_supported),
        ] {
            if list.as_ref().is_some_and(Vec::is_empty) {
                return Err(Error::Discovery(format!("{name} cannot be empty")));
            }
        }
        Ok(())
    }
}

/// Result of discovery: the challenge parameters, when the probe returned
/// one, and the validated protected resource metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McpMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub www_authenticate_parameters: Option<WwwAuthenticateParameters>,
    pub protected_resource_metadata: ProtectedResourceMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> ProtectedResourceMetadata {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn valid_document() {
        let metadata = parse(json!({
            "resource": "https://host/mcp",
            "authorization_servers": ["https://auth.example.com"],
            "resource_documentation": "https://host/docs",
        }));
        metadata.validate().unwrap();
        assert_eq!(metadata.claims["resource_documentation"], json!("https://host/docs"));
    }

    #[test]
    fn present_but_empty_lists_are_rejected() {
        for field in ["authorization_servers", "scopes_supported", "bearer_methods_supported"] {
            let metadata = parse(json!({ "resource": "https://host/mcp", field: [] }));
            let err = metadata.validate().unwrap_err();
            assert_eq!(err.to_string(), format!("{field} cannot be empty"));
        }
    }

    #[test]
    fn invalid_resource_is_rejected() {
        assert!(parse(json!({ "resource": "" })).validate().is_err());
        assert!(parse(json!({ "resource": "/relative" })).validate().is_err());
    }
}
