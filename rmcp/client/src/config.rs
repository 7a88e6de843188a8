//! MCP client configuration.

use crate::{
    Error, Result,
    registration::{
        ClientRegistration, DynamicClientRegistrationRequest, GrantType,
        InMemoryClientRegistrationStore,
    },
};
use std::collections::BTreeMap;
use tracing::info;
use url::Url;

/// Redirect path template, `{registration_id}` is substituted.
pub const REDIRECT_PATH: &str = "/authorize/oauth2/code/{registration_id}";

/// MCP servers this client talks to, keyed by registration id.
#[derive(Clone, Debug)]
pub struct McpClientOAuth2Config {
    base_url: String,
    servers: BTreeMap<String, String>,
    client_name: Option<String>,
}

impl McpClientOAuth2Config {
    /// `base_url` is this client's externally reachable URL, used to build
    /// redirect URIs.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        Url::parse(base_url)
            .map_err(|e| Error::config(format!("invalid base url [{base_url}]: {e}")))?;
        Ok(Self {
            base_url: base_url.to_string(),
            servers: BTreeMap::new(),
            client_name: None,
        })
    }

    /// Add an MCP server under `registration_id`.
    pub fn server(mut self, registration_id: &str, url: &str) -> Result<Self> {
        if registration_id.trim().is_empty() {
            return Err(Error::config("registration id cannot be blank"));
        }
        Url::parse(url).map_err(|e| Error::config(format!("invalid MCP server url [{url}]: {e}")))?;
        self.servers.insert(registration_id.to_string(), url.to_string());
        Ok(self)
    }

    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = Some(client_name.into());
        self
    }

    pub fn servers(&self) -> &BTreeMap<String, String> {
        &self.servers
    }

    pub fn redirect_uri(&self, registration_id: &str) -> String {
        format!(
            "{}{}",
            self.base_url,
            REDIRECT_PATH.replace("{registration_id}", registration_id)
        )
    }

    /// Registration template for an `authorization_code` client.
    pub fn registration_request(&self, registration_id: &str) -> Result<DynamicClientRegistrationRequest> {
        let mut builder = DynamicClientRegistrationRequest::builder()
            .grant_types(vec![GrantType::AuthorizationCode, GrantType::RefreshToken])
            .redirect_uris(vec![self.redirect_uri(registration_id)]);
        if let Some(client_name) = &self.client_name {
            builder = builder.client_name(client_name);
        }
        builder.build()
    }

    /// Register every configured server with `store`. Stops at the first
    /// failure; servers registered so far stay registered.
    pub async fn register_all(
        &self,
        store: &InMemoryClientRegistrationStore,
    ) -> Result<Vec<ClientRegistration>> {
        let mut registrations = Vec::with_capacity(self.servers.len());
        for (registration_id, url) in &self.servers {
            let request = self.registration_request(registration_id)?;
            let registration = store.register_mcp_client(registration_id, url, &request).await?;
            info!(registration_id = %registration_id, url = %url, "MCP client registered");
            registrations.push(registration);
        }
        Ok(registrations)
    }
}
