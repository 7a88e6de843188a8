use super::{AuthorizedClient, DEFAULT_CLOCK_SKEW, OAuth2AccessToken, TokenEndpoint};
use crate::{
    Error, Result,
    registration::{ClientRegistration, ClientRegistrationStore},
};
use chrono::{Duration, Utc};
use reqwest::Client;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::debug;

/// Token client for the `client_credentials` grant.
#[derive(Clone, Debug, Default)]
pub struct ClientCredentialsTokenClient {
    endpoint: TokenEndpoint,
}

impl ClientCredentialsTokenClient {
    pub fn new(client: Client) -> Self {
        Self {
            endpoint: TokenEndpoint::new(client),
        }
    }

    /// Request a token for `registration`, bound to `resource` when given.
    pub async fn request_token(
        &self,
        registration: &ClientRegistration,
        resource: Option<&str>,
    ) -> Result<OAuth2AccessToken> {
        let mut params = vec![("grant_type", "client_credentials".to_string())];
        if !registration.scopes.is_empty() {
            params.push(("scope", registration.scopes.join(" ")));
        }
        if let Some(resource) = resource {
            params.push(("resource", resource.to_string()));
        }
        let response = self.endpoint.request(registration, params).await?;
        Ok(response.into_token(Utc::now(), &registration.scopes)?.0)
    }
}

/// Obtains and caches service tokens per registration.
pub struct ServiceAuthorizedClientManager {
    store: Arc<dyn ClientRegistrationStore>,
    client: ClientCredentialsTokenClient,
    clock_skew: Duration,
    tokens: Mutex<HashMap<String, AuthorizedClient>>,
}

impl ServiceAuthorizedClientManager {
    pub fn new(store: Arc<dyn ClientRegistrationStore>, client: ClientCredentialsTokenClient) -> Self {
        Self {
            store,
            client,
            clock_skew: DEFAULT_CLOCK_SKEW,
            tokens: Mutex::default(),
        }
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// A token for `registration_id`, reusing the cached one until it is
    /// about to expire. The token's audience is the registration's resource.
    pub async fn authorize(&self, registration_id: &str, principal: &str) -> Result<AuthorizedClient> {
        if let Some(cached) = self.cached(registration_id) {
            return Ok(cached);
        }

        let registration = self
            .store
            .find_by_registration_id(registration_id)
            .ok_or_else(|| Error::UnknownRegistration(registration_id.to_string()))?;
        let resource = self.store.find_resource_id_by_registration_id(registration_id);
        let access_token = self
            .client
            .request_token(&registration, resource.as_deref())
            .await?;
        debug!(registration_id, principal, expires_at = ?access_token.expires_at, "obtained service token");

        let authorized = AuthorizedClient {
            registration_id: registration_id.to_string(),
            principal_name: principal.to_string(),
            access_token,
            refresh_token: None,
        };
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(registration_id.to_string(), authorized.clone());
        Ok(authorized)
    }

    fn cached(&self, registration_id: &str) -> Option<AuthorizedClient> {
        let tokens = self.tokens.lock().unwrap_or_else(PoisonError::into_inner);
        tokens
            .get(registration_id)
            .filter(|c| !c.access_token.is_expired(Utc::now(), self.clock_skew))
            .cloned()
    }
}
