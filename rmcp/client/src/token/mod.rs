//! Access token acquisition.
//!
//! Every token request carries the `resource` parameter of the registration's
//! MCP server, so the issued token's audience is bound to that server.

mod authorization_code;
mod client_credentials;

pub use authorization_code::{
    AuthorizationCodeTokenClient, CompletedAuthorization, DEFAULT_PENDING_AUTHORIZATION_TTL,
    PendingAuthorization, UserAuthorizedClientManager,
};
pub use client_credentials::{ClientCredentialsTokenClient, ServiceAuthorizedClientManager};

use crate::{
    Error, Result,
    registration::{ClientAuthenticationMethod, ClientRegistration},
};
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use tracing::{debug, warn};

/// Tokens this close to expiry are treated as expired.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::seconds(60);

/// An access token and what is known about its lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuth2AccessToken {
    pub token_value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl fmt::Debug for OAuth2AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2AccessToken")
            .field("token_value", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl OAuth2AccessToken {
    /// Whether the token expires within `skew` of `now`. Tokens without a
    /// known lifetime never expire.
    pub fn is_expired(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expires_at.is_some_and(|expires_at| now + skew >= expires_at)
    }
}

/// A token obtained for a registration on behalf of a principal.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizedClient {
    pub registration_id: String,
    pub principal_name: String,
    pub access_token: OAuth2AccessToken,
    pub refresh_token: Option<String>,
}

impl fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedClient")
            .field("registration_id", &self.registration_id)
            .field("principal_name", &self.principal_name)
            .field("access_token", &self.access_token)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Successful token endpoint response (RFC 6749 section 5.1).
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Scopes default to the requested ones when the response omits them.
    /// A negative or unrepresentable `expires_in` is rejected.
    pub(crate) fn into_token(
        self,
        now: DateTime<Utc>,
        requested_scopes: &[String],
    ) -> Result<(OAuth2AccessToken, Option<String>)> {
        let expires_at = match self.expires_in {
            Some(seconds) => Some(
                Some(seconds)
                    .filter(|seconds| *seconds >= 0)
                    .and_then(Duration::try_seconds)
                    .and_then(|lifetime| now.checked_add_signed(lifetime))
                    .ok_or_else(|| Error::Token(format!("invalid expires_in: {seconds}")))?,
            ),
            None => None,
        };
        let scopes = match self.scope.as_deref() {
            Some(scope) => scope.split_whitespace().map(String::from).collect(),
            None => requested_scopes.to_vec(),
        };
        let token = OAuth2AccessToken {
            token_value: self.access_token,
            issued_at: now,
            expires_at,
            scopes,
        };
        Ok((token, self.refresh_token))
    }
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Sends form-encoded requests to a registration's token endpoint,
/// authenticating the client per its registered method.
#[derive(Clone, Debug, Default)]
pub(crate) struct TokenEndpoint {
    client: Client,
}

impl TokenEndpoint {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    pub(crate) async fn request(
        &self,
        registration: &ClientRegistration,
        mut params: Vec<(&'static str, String)>,
    ) -> Result<TokenResponse> {
        let token_uri = registration.provider.token_uri.as_deref().ok_or_else(|| {
            Error::config(format!(
                "no token endpoint for client registration [{}]",
                registration.registration_id
            ))
        })?;

        let mut request = self
            .client
            .post(token_uri)
            .header(http::header::ACCEPT, "application/json");
        match &registration.client_authentication_method {
            ClientAuthenticationMethod::ClientSecretBasic => {
                request = request.basic_auth(
                    &registration.client_id,
                    registration.client_secret.as_deref(),
                );
            }
            ClientAuthenticationMethod::ClientSecretPost => {
                params.push(("client_id", registration.client_id.clone()));
                if let Some(secret) = &registration.client_secret {
                    params.push(("client_secret", secret.clone()));
                }
            }
            ClientAuthenticationMethod::None | ClientAuthenticationMethod::Other(_) => {
                params.push(("client_id", registration.client_id.clone()));
            }
        }

        debug!(
            registration_id = %registration.registration_id,
            url = %token_uri,
            grant_type = params.iter().find(|(k, _)| *k == "grant_type").map(|(_, v)| v.as_str()),
            "requesting access token"
        );
        let response = request.form(&params).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(TokenErrorResponse {
                    error,
                    error_description: Some(description),
                }) => format!("{error}: {description}"),
                Ok(TokenErrorResponse { error, .. }) => error,
                Err(_) => body,
            };
            warn!(registration_id = %registration.registration_id, %status, "token request rejected");
            return Err(Error::Token(format!(
                "token endpoint returned HTTP {status}: {reason}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        if let Some(token_type) = token
            .token_type
            .as_deref()
            .filter(|t| !t.eq_ignore_ascii_case("bearer"))
        {
            return Err(Error::Token(format!("unsupported token type [{token_type}]")));
        }
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_honours_clock_skew() {
        let now = Utc::now();
        let token = OAuth2AccessToken {
            token_value: "t".into(),
            issued_at: now,
            expires_at: Some(now + Duration::seconds(30)),
            scopes: vec![],
        };
        assert!(token.is_expired(now, DEFAULT_CLOCK_SKEW));
        assert!(!token.is_expired(now, Duration::zero()));

        let forever = OAuth2AccessToken {
            expires_at: None,
            ..token
        };
        assert!(!forever.is_expired(now + Duration::days(365), DEFAULT_CLOCK_SKEW));
    }

    #[test]
    fn response_scopes_fall_back_to_requested() {
        let now = Utc::now();
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"abc","token_type":"Bearer","expires_in":60}"#)
                .unwrap();
        let (token, refresh) = response.into_token(now, &["mcp".to_string()]).unwrap();
        assert_eq!(token.scopes, vec!["mcp"]);
        assert_eq!(token.expires_at, Some(now + Duration::seconds(60)));
        assert_eq!(refresh, None);
    }

    #[test]
    fn out_of_range_expires_in_is_an_error() {
        for expires_in in [i64::MAX, -1] {
            let response: TokenResponse = serde_json::from_str(&format!(
                r#"{{"access_token":"t","expires_in":{expires_in}}}"#
            ))
            .unwrap();
            let err = response.into_token(Utc::now(), &[]).unwrap_err();
            assert!(
                matches!(&err, Error::Token(message) if message.contains("expires_in")),
                "{err}"
            );
        }
    }

    #[test]
    fn debug_redacts_token_values() {
        let token = OAuth2AccessToken {
            token_value: "sekrit-token".into(),
            issued_at: Utc::now(),
            expires_at: None,
            scopes: vec![],
        };
        assert!(!format!("{token:?}").contains("sekrit-token"));
    }
}
