use super::request::DynamicClientRegistrationRequest;
use crate::{
    Error, Result,
    metadata::{AuthorizationServerMetadata, fetch_authorization_server_metadata},
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

/// RFC 7591 client registration response. Every field but `client_id` is
/// optional; present values take precedence over the request's.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicClientRegistrationResponse {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
}

impl fmt::Debug for DynamicClientRegistrationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicClientRegistrationResponse")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("token_endpoint_auth_method", &self.token_endpoint_auth_method)
            .field("grant_types", &self.grant_types)
            .field("redirect_uris", &self.redirect_uris)
            .field("scope", &self.scope)
            .field("client_name", &self.client_name)
            .finish()
    }
}

/// Registers clients with an authorization server's registration endpoint.
#[derive(Clone, Debug, Default)]
pub struct DynamicClientRegistrar {
    client: Client,
}

impl DynamicClientRegistrar {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Register `request` with the authorization server identified by
    /// `issuer`, returning the response alongside the server's metadata.
    pub async fn register(
        &self,
        request: &DynamicClientRegistrationRequest,
        issuer: &str,
    ) -> Result<(DynamicClientRegistrationResponse, AuthorizationServerMetadata)> {
        let metadata = fetch_authorization_server_metadata(&self.client, issuer).await?;
        let endpoint = metadata.registration_endpoint.as_deref().ok_or_else(|| {
            Error::Registration(format!(
                "No registration endpoint found for auth server [{issuer}]"
            ))
        })?;

        debug!(endpoint = %endpoint, ?request, "registering dynamic OAuth client");
        let response = self.client.post(endpoint).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Registration(format!(
                "dynamic client registration returned HTTP {status}: {body}"
            )));
        }
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(Error::Registration("Cannot register client".into()));
        }
        let registration: DynamicClientRegistrationResponse = serde_json::from_slice(&body)?;
        info!(client_id = %registration.client_id, issuer = %issuer, "registered dynamic OAuth client");
        Ok((registration, metadata))
    }
}
