use super::{
    request::{ClientAuthenticationMethod, DynamicClientRegistrationRequest, GrantType},
    service::DynamicClientRegistrationResponse,
};
use crate::metadata::AuthorizationServerMetadata;
use serde::Serialize;
use std::fmt;

/// A realized client identity, usable against its authorization server.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ClientRegistration {
    pub registration_id: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub client_authentication_method: ClientAuthenticationMethod,
    pub authorization_grant_type: GrantType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub provider: ProviderDetails,
}

/// Endpoints of the authorization server a registration belongs to.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProviderDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk_set_uri: Option<String>,
}

impl From<&AuthorizationServerMetadata> for ProviderDetails {
    fn from(metadata: &AuthorizationServerMetadata) -> Self {
        Self {
            issuer: Some(metadata.issuer.clone()),
            authorization_uri: metadata.authorization_endpoint.clone(),
            token_uri: metadata.token_endpoint.clone(),
            jwk_set_uri: metadata.jwks_uri.clone(),
        }
    }
}

impl fmt::Debug for ClientRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistration")
            .field("registration_id", &self.registration_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("client_authentication_method", &self.client_authentication_method)
            .field("authorization_grant_type", &self.authorization_grant_type)
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("client_name", &self.client_name)
            .field("provider", &self.provider)
            .finish()
    }
}

impl ClientRegistration {
    /// Minimal registration for a statically configured client.
    pub fn new(
        registration_id: impl Into<String>,
        client_id: impl Into<String>,
        authorization_grant_type: GrantType,
    ) -> Self {
        Self {
            registration_id: registration_id.into(),
            client_id: client_id.into(),
            client_secret: None,
            client_authentication_method: ClientAuthenticationMethod::default(),
            authorization_grant_type,
            redirect_uri: None,
            scopes: Vec::new(),
            client_name: None,
            provider: ProviderDetails::default(),
        }
    }

    /// Merge a registration response with its request.
    ///
    /// Each field comes from the response when present and falls back to the
    /// request otherwise. The grant type and redirect URI are the first of
    /// their lists; the grant type defaults to `client_credentials`.
    pub fn from_registration(
        registration_id: impl Into<String>,
        request: &DynamicClientRegistrationRequest,
        response: &DynamicClientRegistrationResponse,
        metadata: &AuthorizationServerMetadata,
    ) -> Self {
        let client_authentication_method = response
            .token_endpoint_auth_method
            .as_deref()
            .map(ClientAuthenticationMethod::from)
            .or_else(|| request.token_endpoint_auth_method().cloned())
            .unwrap_or_default();

        let authorization_grant_type = response
            .grant_types
            .as_ref()
            .and_then(|grants| grants.first())
            .map(|grant| GrantType::from(grant.as_str()))
            .or_else(|| request.grant_types().first().cloned())
            .unwrap_or(GrantType::ClientCredentials);

        let redirect_uri = response
            .redirect_uris
            .as_ref()
            .and_then(|uris| uris.first())
            .or_else(|| request.redirect_uris().and_then(|uris| uris.first()))
            .cloned();

        let scopes = response
            .scope
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| request.scope().filter(|s| !s.trim().is_empty()))
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        Self {
            registration_id: registration_id.into(),
            client_id: response.client_id.clone(),
            client_secret: response.client_secret.clone(),
            client_authentication_method,
            authorization_grant_type,
            redirect_uri,
            scopes,
            client_name: response
                .client_name
                .clone()
                .or_else(|| request.client_name().map(String::from)),
            provider: ProviderDetails::from(metadata),
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_client_authentication_method(mut self, method: ClientAuthenticationMethod) -> Self {
        self.client_authentication_method = method;
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_provider(mut self, provider: ProviderDetails) -> Self {
        self.provider = provider;
        self
    }

    /// Copy without the client secret, for display.
    pub fn redacted(&self) -> Self {
        Self {
            client_secret: self.client_secret.as_ref().map(|_| "[REDACTED]".to_string()),
            ..self.clone()
        }
    }
}
