use super::{AuthorizedClient, DEFAULT_CLOCK_SKEW, OAuth2AccessToken, TokenEndpoint};
use crate::{
    Error, Result,
    registration::{ClientRegistration, ClientRegistrationStore},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, info, warn};
use url::Url;

/// An authorization request waiting for its callback.
#[derive(Clone)]
pub struct PendingAuthorization {
    pub registration_id: String,
    pub principal_name: String,
    pub state: String,
    pub authorization_url: String,
    /// Where the user agent goes once the flow completes.
    pub return_to: Option<String>,
    resource: Option<String>,
    code_verifier: String,
    created_at: DateTime<Utc>,
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("registration_id", &self.registration_id)
            .field("principal_name", &self.principal_name)
            .field("authorization_url", &self.authorization_url)
            .field("return_to", &self.return_to)
            .finish_non_exhaustive()
    }
}

/// Outcome of a completed authorization code flow.
#[derive(Clone, Debug)]
pub struct CompletedAuthorization {
    pub authorized_client: AuthorizedClient,
    pub return_to: Option<String>,
}

/// Token client for the `authorization_code` and `refresh_token` grants,
/// with PKCE (`S256`).
#[derive(Clone, Debug, Default)]
pub struct AuthorizationCodeTokenClient {
    endpoint: TokenEndpoint,
}

impl AuthorizationCodeTokenClient {
    pub fn new(client: Client) -> Self {
        Self {
            endpoint: TokenEndpoint::new(client),
        }
    }

    /// Build the authorization request for `registration`, carrying
    /// `resource` so the resulting tokens are bound to it.
    pub fn authorization_request(
        &self,
        registration: &ClientRegistration,
        principal: &str,
        resource: Option<&str>,
    ) -> Result<PendingAuthorization> {
        let authorization_uri = registration
            .provider
            .authorization_uri
            .as_deref()
            .ok_or_else(|| {
                Error::config(format!(
                    "no authorization endpoint for client registration [{}]",
                    registration.registration_id
                ))
            })?;

        let state = random_token();
        let code_verifier = random_token();
        let mut url = Url::parse(authorization_uri)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &registration.client_id);
            if let Some(redirect_uri) = &registration.redirect_uri {
                query.append_pair("redirect_uri", redirect_uri);
            }
            if !registration.scopes.is_empty() {
                query.append_pair("scope", &registration.scopes.join(" "));
            }
            query
                .append_pair("state", &state)
                .append_pair("code_challenge", &code_challenge(&code_verifier))
                .append_pair("code_challenge_method", "S256");
            if let Some(resource) = resource {
                query.append_pair("resource", resource);
            }
        }

        Ok(PendingAuthorization {
            registration_id: registration.registration_id.clone(),
            principal_name: principal.to_string(),
            state,
            authorization_url: url.into(),
            return_to: None,
            resource: resource.map(String::from),
            code_verifier,
            created_at: Utc::now(),
        })
    }

    /// Redeem `code` for tokens. The `resource` of the authorization
    /// request is sent again.
    pub async fn exchange_code(
        &self,
        registration: &ClientRegistration,
        pending: &PendingAuthorization,
        code: &str,
    ) -> Result<(OAuth2AccessToken, Option<String>)> {
        let mut params = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("code_verifier", pending.code_verifier.clone()),
        ];
        if let Some(redirect_uri) = &registration.redirect_uri {
            params.push(("redirect_uri", redirect_uri.clone()));
        }
        if let Some(resource) = &pending.resource {
            params.push(("resource", resource.clone()));
        }
        let response = self.endpoint.request(registration, params).await?;
        Ok(response.into_token(Utc::now(), &registration.scopes)?)
    }

    /// Refresh an access token. A refresh without a new refresh token keeps
    /// the old one.
    pub async fn refresh(
        &self,
        registration: &ClientRegistration,
        refresh_token: &str,
        resource: Option<&str>,
    ) -> Result<(OAuth2AccessToken, Option<String>)> {
        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.to_string()),
        ];
        if !registration.scopes.is_empty() {
            params.push(("scope", registration.scopes.join(" ")));
        }
        if let Some(resource) = resource {
            params.push(("resource", resource.to_string()));
        }
        let response = self.endpoint.request(registration, params).await?;
        let (token, refreshed) = response.into_token(Utc::now(), &registration.scopes)?;
        Ok((token, refreshed.or_else(|| Some(refresh_token.to_string()))))
    }
}

type PrincipalKey = (String, String);

/// How long an authorization request waits for its callback.
pub const DEFAULT_PENDING_AUTHORIZATION_TTL: Duration = Duration::minutes(10);

/// Tracks user-delegated tokens per registration and principal.
///
/// Without a usable token, [`authorize`](Self::authorize) fails with
/// [`Error::AuthorizationRequired`] carrying the URL to send the user agent
/// to; the callback then lands in
/// [`complete_authorization`](Self::complete_authorization).
///
/// Each (registration, principal) has at most one outstanding request. A
/// newer request replaces the older one, and requests older than the
/// pending TTL are dropped.
pub struct UserAuthorizedClientManager {
    store: Arc<dyn ClientRegistrationStore>,
    client: AuthorizationCodeTokenClient,
    clock_skew: Duration,
    pending_ttl: Duration,
    authorized: Mutex<HashMap<PrincipalKey, AuthorizedClient>>,
    pending: Mutex<HashMap<String, PendingAuthorization>>,
}

impl UserAuthorizedClientManager {
    pub fn new(store: Arc<dyn ClientRegistrationStore>, client: AuthorizationCodeTokenClient) -> Self {
        Self {
            store,
            client,
            clock_skew: DEFAULT_CLOCK_SKEW,
            pending_ttl: DEFAULT_PENDING_AUTHORIZATION_TTL,
            authorized: Mutex::default(),
            pending: Mutex::default(),
        }
    }

    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    pub fn with_pending_ttl(mut self, pending_ttl: Duration) -> Self {
        self.pending_ttl = pending_ttl;
        self
    }

    fn is_stale(&self, pending: &PendingAuthorization, now: DateTime<Utc>) -> bool {
        now - pending.created_at >= self.pending_ttl
    }

    fn registration(&self, registration_id: &str) -> Result<ClientRegistration> {
        self.store
            .find_by_registration_id(registration_id)
            .ok_or_else(|| Error::UnknownRegistration(registration_id.to_string()))
    }

    fn save(&self, client: AuthorizedClient) {
        let key = (client.registration_id.clone(), client.principal_name.clone());
        self.authorized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, client);
    }

    /// Stored client for `principal`, refreshed when expired.
    pub async fn authorize(
        &self,
        registration_id: &str,
        principal: &str,
        return_to: Option<&str>,
    ) -> Result<AuthorizedClient> {
        let key = (registration_id.to_string(), principal.to_string());
        let existing = self
            .authorized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned();

        if let Some(existing) = existing {
            if !existing.access_token.is_expired(Utc::now(), self.clock_skew) {
                return Ok(existing);
            }
            if let Some(refresh_token) = &existing.refresh_token {
                let registration = self.registration(registration_id)?;
                let resource = self.store.find_resource_id_by_registration_id(registration_id);
                match self
                    .client
                    .refresh(&registration, refresh_token, resource.as_deref())
                    .await
                {
                    Ok((access_token, refresh_token)) => {
                        debug!(registration_id, principal, "refreshed user token");
                        let refreshed = AuthorizedClient {
                            access_token,
                            refresh_token,
                            ..existing
                        };
                        self.save(refreshed.clone());
                        return Ok(refreshed);
                    }
                    Err(Error::Token(reason)) => {
                        warn!(registration_id, principal, %reason, "refresh rejected, reauthorizing");
                    }
                    Err(err) => return Err(err),
                }
            }
            self.remove(registration_id, principal);
        }

        let registration = self.registration(registration_id)?;
        let resource = self.store.find_resource_id_by_registration_id(registration_id);
        let mut pending =
            self.client
                .authorization_request(&registration, principal, resource.as_deref())?;
        pending.return_to = return_to.map(String::from);
        let url = pending.authorization_url.clone();
        {
            let now = Utc::now();
            let mut requests = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            requests.retain(|_, existing| {
                !self.is_stale(existing, now)
                    && (existing.registration_id != registration_id
                        || existing.principal_name != principal)
            });
            requests.insert(pending.state.clone(), pending);
        }
        debug!(registration_id, principal, "user authorization required");
        Err(Error::AuthorizationRequired { url })
    }

    /// Handle the authorization callback carrying `state` and `code`.
    pub async fn complete_authorization(
        &self,
        state: &str,
        code: &str,
    ) -> Result<CompletedAuthorization> {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(state)
            .filter(|pending| !self.is_stale(pending, Utc::now()))
            .ok_or_else(|| {
                Error::Token("authorization response state does not match any pending request".into())
            })?;
        let registration = self.registration(&pending.registration_id)?;
        let (access_token, refresh_token) =
            self.client.exchange_code(&registration, &pending, code).await?;

        let authorized_client = AuthorizedClient {
            registration_id: pending.registration_id,
            principal_name: pending.principal_name,
            access_token,
            refresh_token,
        };
        info!(
            registration_id = %authorized_client.registration_id,
            principal = %authorized_client.principal_name,
            "authorization code flow completed"
        );
        self.save(authorized_client.clone());
        Ok(CompletedAuthorization {
            authorized_client,
            return_to: pending.return_to,
        })
    }

    pub fn remove(&self, registration_id: &str, principal: &str) {
        self.authorized
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(registration_id.to_string(), principal.to_string()));
    }
}

fn random_token() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 32]>())
}

fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}
