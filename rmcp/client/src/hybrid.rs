//! Per-request choice between user-delegated and service credentials.
//!
//! The caller passes a [`TransportContext`] with every outgoing request. A
//! context carrying a principal is served with that user's
//! `authorization_code` token; anything else falls back to the service's
//! `client_credentials` token.

use crate::{
    Result,
    token::{ServiceAuthorizedClientManager, UserAuthorizedClientManager},
};
use http::{HeaderMap, HeaderValue, header::AUTHORIZATION};
use std::sync::Arc;
use tracing::debug;

/// Principal name used for service-to-service tokens.
pub const SERVICE_PRINCIPAL: &str = "mcp-client-service";

/// Request context carried alongside an outgoing MCP call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportContext {
    /// The authenticated user, if the call happens on behalf of one.
    pub principal: Option<String>,
    /// URI of the inbound exchange, used as the return target when the user
    /// must first authorize.
    pub exchange: Option<String>,
}

impl TransportContext {
    pub fn user(principal: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            exchange: None,
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }
}

/// Resolves the bearer token for an outgoing MCP request.
#[derive(Clone)]
pub struct HybridCredentialResolver {
    service: Arc<ServiceAuthorizedClientManager>,
    user: Arc<UserAuthorizedClientManager>,
    service_registration_id: String,
    user_registration_id: String,
}

impl HybridCredentialResolver {
    pub fn new(
        service: Arc<ServiceAuthorizedClientManager>,
        service_registration_id: impl Into<String>,
        user: Arc<UserAuthorizedClientManager>,
        user_registration_id: impl Into<String>,
    ) -> Self {
        Self {
            service,
            user,
            service_registration_id: service_registration_id.into(),
            user_registration_id: user_registration_id.into(),
        }
    }

    /// The access token value for a call made under `context`.
    ///
    /// Fails with [`Error::AuthorizationRequired`](crate::Error::AuthorizationRequired)
    /// when the user has not authorized this client yet.
    pub async fn resolve(&self, context: Option<&TransportContext>) -> Result<String> {
        let principal = context.and_then(|c| c.principal.as_deref());
        let authorized = match principal {
            Some(principal) => {
                debug!(registration_id = %self.user_registration_id, principal, "using user credentials");
                let return_to = context.and_then(|c| c.exchange.as_deref());
                self.user
                    .authorize(&self.user_registration_id, principal, return_to)
                    .await?
            }
            None => {
                debug!(registration_id = %self.service_registration_id, "using service credentials");
                self.service
                    .authorize(&self.service_registration_id, SERVICE_PRINCIPAL)
                    .await?
            }
        };
        Ok(authorized.access_token.token_value)
    }

    /// Set `Authorization: Bearer <token>` on `headers`.
    pub async fn authorize_headers(
        &self,
        context: Option<&TransportContext>,
        headers: &mut HeaderMap,
    ) -> Result<()> {
        let token = self.resolve(context).await?;
        let value = HeaderValue::try_from(format!("Bearer {token}"))
            .map_err(|_| crate::Error::Token("access token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Attach the resolved bearer token to a `reqwest` request.
    pub async fn authorize_request(
        &self,
        context: Option<&TransportContext>,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder> {
        let token = self.resolve(context).await?;
        Ok(request.bearer_auth(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error,
        registration::{ClientRegistration, GrantType, InMemoryClientRegistrationStore, ProviderDetails},
        token::{AuthorizationCodeTokenClient, ClientCredentialsTokenClient},
    };
    use mockito::{Matcher, Server};
    use serde_json::json;

    async fn resolver(server: &mut Server) -> HybridCredentialResolver {
        let provider = ProviderDetails {
            authorization_uri: Some(format!("{}/oauth2/authorize", server.url())),
            token_uri: Some(format!("{}/oauth2/token", server.url())),
            ..ProviderDetails::default()
        };
        let store = Arc::new(InMemoryClientRegistrationStore::default());
        store.add_pre_registered_client(
            ClientRegistration::new("svc", "svc-client", GrantType::ClientCredentials)
                .with_client_secret("secret")
                .with_provider(provider.clone()),
            "https://host/mcp",
        );
        store.add_pre_registered_client(
            ClientRegistration::new("user", "user-client", GrantType::AuthorizationCode)
                .with_redirect_uri("http://localhost/authorize/oauth2/code/user")
                .with_provider(provider),
            "https://host/mcp",
        );
        server
            .mock("POST", "/oauth2/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()))
            .with_body(json!({ "access_token": "service-token", "expires_in": 3600 }).to_string())
            .create_async()
            .await;

        HybridCredentialResolver::new(
            Arc::new(ServiceAuthorizedClientManager::new(
                store.clone(),
                ClientCredentialsTokenClient::default(),
            )),
            "svc",
            Arc::new(UserAuthorizedClientManager::new(
                store,
                AuthorizationCodeTokenClient::default(),
            )),
            "user",
        )
    }

    #[tokio::test]
    async fn no_context_uses_service_credentials() {
        let mut server = Server::new_async().await;
        let resolver = resolver(&mut server).await;

        let mut headers = HeaderMap::new();
        resolver.authorize_headers(None, &mut headers).await.unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer service-token");

        // a context without a principal is treated the same
        let token = resolver
            .resolve(Some(&TransportContext::default()))
            .await
            .unwrap();
        assert_eq!(token, "service-token");
    }

    #[tokio::test]
    async fn user_context_uses_authorization_code() {
        let mut server = Server::new_async().await;
        let resolver = resolver(&mut server).await;

        let context = TransportContext::user("alice").with_exchange("/chat");
        let err = resolver.resolve(Some(&context)).await.unwrap_err();
        let Error::AuthorizationRequired { url } = err else {
            panic!("expected authorization to be required, got {err:?}");
        };
        assert!(url.contains("client_id=user-client"));

        let mut headers = HeaderMap::new();
        assert!(resolver.authorize_headers(Some(&context), &mut headers).await.is_err());
        assert!(headers.get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn resolution_is_the_same_from_a_spawned_task() {
        let mut server = Server::new_async().await;
        let resolver = resolver(&mut server).await;
        let context = TransportContext::user("alice");

        let spawned = {
            let resolver = resolver.clone();
            let context = context.clone();
            tokio::spawn(async move { resolver.resolve(Some(&context)).await })
        };
        assert!(matches!(
            spawned.await.unwrap(),
            Err(Error::AuthorizationRequired { .. })
        ));
        assert_eq!(
            tokio::spawn(async move { resolver.resolve(None).await })
                .await
                .unwrap()
                .unwrap(),
            "service-token"
        );
    }

    #[tokio::test]
    async fn authorized_user_gets_user_token() {
        let mut server = Server::new_async().await;
        let resolver = resolver(&mut server).await;
        server
            .mock("POST", "/oauth2/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()))
            .with_body(json!({ "access_token": "alice-token", "expires_in": 3600 }).to_string())
            .create_async()
            .await;

        let context = TransportContext::user("alice");
        let Err(Error::AuthorizationRequired { url }) = resolver.resolve(Some(&context)).await else {
            panic!("expected authorization to be required");
        };
        let state = url::Url::parse(&url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        resolver.user.complete_authorization(&state, "code").await.unwrap();

        let mut headers = HeaderMap::new();
        resolver.authorize_headers(Some(&context), &mut headers).await.unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer alice-token");

        let spawned = tokio::spawn(async move {
            let mut headers = HeaderMap::new();
            resolver
                .authorize_headers(Some(&context), &mut headers)
                .await
                .map(|()| headers)
        });
        assert_eq!(spawned.await.unwrap().unwrap()[AUTHORIZATION], "Bearer alice-token");
    }
}
