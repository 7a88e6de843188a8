use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth 2.0 grant types a client may register for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    AuthorizationCode,
    ClientCredentials,
    RefreshToken,
    #[serde(untagged)]
    Other(String),
}

impl GrantType {
    pub fn as_str(&self) -> &str {
        match self {
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
            GrantType::Other(value) => value,
        }
    }
}

impl From<&str> for GrantType {
    fn from(value: &str) -> Self {
        match value {
            "authorization_code" => GrantType::AuthorizationCode,
            "client_credentials" => GrantType::ClientCredentials,
            "refresh_token" => GrantType::RefreshToken,
            other => GrantType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a client authenticates at the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthenticationMethod {
    #[default]
    ClientSecretBasic,
    ClientSecretPost,
    None,
    #[serde(untagged)]
    Other(String),
}

impl ClientAuthenticationMethod {
    pub fn as_str(&self) -> &str {
        match self {
            ClientAuthenticationMethod::ClientSecretBasic => "client_secret_basic",
            ClientAuthenticationMethod::ClientSecretPost => "client_secret_post",
            ClientAuthenticationMethod::None => "none",
            ClientAuthenticationMethod::Other(value) => value,
        }
    }
}

impl From<&str> for ClientAuthenticationMethod {
    fn from(value: &str) -> Self {
        match value {
            "client_secret_basic" => ClientAuthenticationMethod::ClientSecretBasic,
            "client_secret_post" => ClientAuthenticationMethod::ClientSecretPost,
            "none" => ClientAuthenticationMethod::None,
            other => ClientAuthenticationMethod::Other(other.to_string()),
        }
    }
}

/// Response types for the authorization endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Code,
}

/// RFC 7591 client registration request.
///
/// Only constructed through [`DynamicClientRegistrationRequestBuilder::build`],
/// which enforces the grant type rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DynamicClientRegistrationRequest {
    grant_types: Vec<GrantType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_uris: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_endpoint_auth_method: Option<ClientAuthenticationMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_types: Option<Vec<ResponseType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

impl DynamicClientRegistrationRequest {
    pub fn builder() -> DynamicClientRegistrationRequestBuilder {
        DynamicClientRegistrationRequestBuilder::default()
    }

    /// A builder pre-filled from this request.
    pub fn to_builder(&self) -> DynamicClientRegistrationRequestBuilder {
        DynamicClientRegistrationRequestBuilder {
            grant_types: Some(self.grant_types.clone()),
            redirect_uris: self.redirect_uris.clone(),
            token_endpoint_auth_method: self.token_endpoint_auth_method.clone(),
            response_types: self.response_types.clone(),
            client_name: self.client_name.clone(),
            client_uri: self.client_uri.clone(),
            scope: self.scope.clone(),
        }
    }

    pub fn grant_types(&self) -> &[GrantType] {
        &self.grant_types
    }

    pub fn redirect_uris(&self) -> Option<&[String]> {
        self.redirect_uris.as_deref()
    }

    pub fn token_endpoint_auth_method(&self) -> Option<&ClientAuthenticationMethod> {
        self.token_endpoint_auth_method.as_ref()
    }

    pub fn response_types(&self) -> Option<&[ResponseType]> {
        self.response_types.as_deref()
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    pub fn client_uri(&self) -> Option<&str> {
        self.client_uri.as_deref()
    }

    /// Space-separated scopes.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Whether a non-blank scope is present.
    pub fn has_scope(&self) -> bool {
        self.scope.as_deref().is_some_and(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DynamicClientRegistrationRequestBuilder {
    grant_types: Option<Vec<GrantType>>,
    redirect_uris: Option<Vec<String>>,
    token_endpoint_auth_method: Option<ClientAuthenticationMethod>,
    response_types: Option<Vec<ResponseType>>,
    client_name: Option<String>,
    client_uri: Option<String>,
    scope: Option<String>,
}

impl DynamicClientRegistrationRequestBuilder {
    pub fn grant_types(mut self, grant_types: Vec<GrantType>) -> Self {
        self.grant_types = Some(grant_types);
        self
    }

    pub fn redirect_uris(mut self, redirect_uris: Vec<String>) -> Self {
        self.redirect_uris = Some(redirect_uris);
        self
    }

    pub fn token_endpoint_auth_method(mut self, method: ClientAuthenticationMethod) -> Self {
        self.token_endpoint_auth_method = Some(method);
        self
    }

    pub fn response_types(mut self, response_types: Vec<ResponseType>) -> Self {
        self.response_types = Some(response_types);
        self
    }

    pub fn client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = Some(client_name.into());
        self
    }

    pub fn client_uri(mut self, client_uri: impl Into<String>) -> Self {
        self.client_uri = Some(client_uri.into());
        self
    }

    /// Space-separated scope string.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Scopes joined with spaces.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = scopes
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.scope = Some(joined);
        self
    }

    pub fn build(self) -> Result<DynamicClientRegistrationRequest> {
        let grant_types = match self.grant_types {
            None => vec![GrantType::ClientCredentials],
            Some(grant_types) if grant_types.is_empty() => {
                return Err(Error::config("grantTypes cannot be empty"));
            }
            Some(grant_types) => grant_types,
        };

        let mut response_types = self.response_types;
        if grant_types.contains(&GrantType::AuthorizationCode) {
            if self.redirect_uris.as_ref().is_none_or(Vec::is_empty) {
                return Err(Error::config(
                    "redirectUris must not be empty when grant type contains authorization_code",
                ));
            }
            response_types.get_or_insert_with(|| vec![ResponseType::Code]);
        }
        if grant_types.contains(&GrantType::RefreshToken)
            && !grant_types.contains(&GrantType::AuthorizationCode)
        {
            return Err(Error::config(
                "grant types must contain authorization_code when refresh_token is present",
            ));
        }

        Ok(DynamicClientRegistrationRequest {
            grant_types,
            redirect_uris: self.redirect_uris,
            token_endpoint_auth_method: self.token_endpoint_auth_method,
            response_types,
            client_name: self.client_name,
            client_uri: self.client_uri,
            scope: self.scope,
        })
    }
}
