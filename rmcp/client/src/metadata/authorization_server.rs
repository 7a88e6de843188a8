use crate::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

const OPENID_CONFIGURATION: &str = "/.well-known/openid-configuration";
const OAUTH_AUTHORIZATION_SERVER: &str = "/.well-known/oauth-authorization-server";

/// Authorization server metadata (RFC 8414 / OpenID Connect Discovery).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationServerMetadata {
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types_supported: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_methods_supported: Option<Vec<String>>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Metadata document locations for an issuer, in the order they are tried:
/// OIDC appended to the issuer, then the RFC 8414 path-inserted forms.
fn candidate_urls(issuer: &Url) -> Vec<String> {
    let path = issuer.path().trim_end_matches('/');
    let origin = issuer.origin().ascii_serialization();
    vec![
        format!("{}{OPENID_CONFIGURATION}", issuer.as_str().trim_end_matches('/')),
        format!("{origin}{OPENID_CONFIGURATION}{path}"),
        format!("{origin}{OAUTH_AUTHORIZATION_SERVER}{path}"),
    ]
}

/// Fetch the metadata of `issuer`.
///
/// A 4xx on one location moves on to the next; the first document found
/// must name `issuer` as its issuer.
pub async fn fetch_authorization_server_metadata(
    client: &Client,
    issuer: &str,
) -> Result<AuthorizationServerMetadata> {
    let issuer_url = Url::parse(issuer)?;
    for url in candidate_urls(&issuer_url) {
        debug!(url = %url, "fetching authorization server metadata");
        let response = client
            .get(&url)
            .header(http::header::ACCEPT, "application/json")
            .send()
            .await?;
        let status = response.status();
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            debug!(url = %url, %status, "no authorization server metadata at location");
            continue;
        }
        if !status.is_success() {
            return Err(Error::Discovery(format!(
                "authorization server metadata at {url} returned HTTP {status}"
            )));
        }
        let metadata: AuthorizationServerMetadata = response.json().await?;
        if metadata.issuer.trim_end_matches('/') != issuer.trim_end_matches('/') {
            return Err(Error::Discovery(format!(
                "the issuer [{}] in the metadata does not match the requested issuer [{issuer}]",
                metadata.issuer
            )));
        }
        return Ok(metadata);
    }
    Err(Error::Discovery(format!(
        "unable to resolve the authorization server metadata for issuer [{issuer}]"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidates_for_root_issuer() {
        let issuer = Url::parse("https://auth.example.com").unwrap();
        assert_eq!(
            candidate_urls(&issuer),
            vec![
                "https://auth.example.com/.well-known/openid-configuration",
                "https://auth.example.com/.well-known/openid-configuration",
                "https://auth.example.com/.well-known/oauth-authorization-server",
            ]
        );
    }

    #[test]
    fn candidates_for_issuer_with_path() {
        let issuer = Url::parse("https://auth.example.com/realms/mcp").unwrap();
        assert_eq!(
            candidate_urls(&issuer),
            vec![
                "https://auth.example.com/realms/mcp/.well-known/openid-configuration",
                "https://auth.example.com/.well-known/openid-configuration/realms/mcp",
                "https://auth.example.com/.well-known/oauth-authorization-server/realms/mcp",
            ]
        );
    }

    #[tokio::test]
    async fn falls_back_to_oauth_authorization_server() {
        let mut server = mockito::Server::new_async().await;
        let issuer = server.url();
        server
            .mock("GET", "/.well-known/openid-configuration")
            .with_status(404)
            .expect(2)
            .create_async()
            .await;
        server
            .mock("GET", "/.well-known/oauth-authorization-server")
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "issuer": issuer,
                    "token_endpoint": format!("{issuer}/oauth2/token"),
                    "registration_endpoint": format!("{issuer}/oauth2/register"),
                })
                .to_string(),
            )
            .create_async()
            .await;

        let metadata = fetch_authorization_server_metadata(&Client::new(), &issuer)
            .await
            .unwrap();
        assert_eq!(metadata.token_endpoint, Some(format!("{issuer}/oauth2/token")));
        assert_eq!(
            metadata.registration_endpoint,
            Some(format!("{issuer}/oauth2/register"))
        );
    }

    #[tokio::test]
    async fn issuer_mismatch_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/.well-known/openid-configuration")
            .with_header("content-type", "application/json")
            .with_body(json!({ "issuer": "https://evil.example.com" }).to_string())
            .create_async()
            .await;

        let err = fetch_authorization_server_metadata(&Client::new(), &server.url())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Discovery(_)), "{err:?}");
    }
}
