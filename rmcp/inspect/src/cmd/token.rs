//! Audience-bound access tokens for the service identity.

use crate::error::Error;
use chrono::{DateTime, Utc};
use clap::Args;
use rmcp_oauth_client::{
    hybrid::SERVICE_PRINCIPAL,
    registration::{ClientRegistrationStore, DynamicClientRegistrationRequest, InMemoryClientRegistrationStore},
    token::{ClientCredentialsTokenClient, ServiceAuthorizedClientManager},
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct TokenArgs {
    /// URL of the MCP endpoint.
    pub url: String,

    /// Local registration id.
    #[arg(long, default_value = "default")]
    pub id: String,

    /// Space-separated scope. Discovered from the server when omitted.
    #[arg(long)]
    pub scope: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenOutput {
    pub access_token: String,
    pub resource: Option<String>,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Register a `client_credentials` client and request a token for it.
pub async fn token(args: &TokenArgs) -> Result<TokenOutput, Error> {
    let mut builder = DynamicClientRegistrationRequest::builder();
    if let Some(scope) = &args.scope {
        builder = builder.scope(scope);
    }
    let request = builder.build()?;

    let store = Arc::new(InMemoryClientRegistrationStore::default());
    store.register_mcp_client(&args.id, &args.url, &request).await?;
    let resource = store.find_resource_id_by_registration_id(&args.id);

    let manager =
        ServiceAuthorizedClientManager::new(store, ClientCredentialsTokenClient::default());
    let authorized = manager.authorize(&args.id, SERVICE_PRINCIPAL).await?;
    Ok(TokenOutput {
        access_token: authorized.access_token.token_value,
        resource,
        scopes: authorized.access_token.scopes,
        expires_at: authorized.access_token.expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    #[tokio::test]
    async fn discovers_registers_and_requests_bound_token() {
        let mut server = Server::new_async().await;
        let url = server.url();
        let mcp_url = format!("{url}/mcp");
        server
            .mock("POST", "/mcp")
            .with_status(401)
            .with_header(
                "www-authenticate",
                &format!("Bearer resource_metadata={url}/.well-known/oauth-protected-resource/mcp, scope=mcp"),
            )
            .create_async()
            .await;
        server
            .mock("GET", "/.well-known/oauth-protected-resource/mcp")
            .with_body(json!({ "resource": mcp_url, "authorization_servers": [url] }).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/.well-known/openid-configuration")
            .with_body(
                json!({
                    "issuer": url,
                    "token_endpoint": format!("{url}/oauth2/token"),
                    "registration_endpoint": format!("{url}/oauth2/register"),
                })
                .to_string(),
            )
            .create_async()
            .await;
        server
            .mock("POST", "/oauth2/register")
            .with_status(201)
            .with_body(json!({ "client_id": "cli", "client_secret": "s" }).to_string())
            .create_async()
            .await;
        let token_mock = server
            .mock("POST", "/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("scope".into(), "mcp".into()),
                Matcher::UrlEncoded("resource".into(), mcp_url.clone()),
            ]))
            .with_body(json!({ "access_token": "at", "token_type": "Bearer", "expires_in": 60 }).to_string())
            .create_async()
            .await;

        let output = token(&TokenArgs {
            url: mcp_url.clone(),
            id: "default".into(),
            scope: None,
        })
        .await
        .unwrap();
        token_mock.assert_async().await;
        assert_eq!(output.access_token, "at");
        assert_eq!(output.resource, Some(mcp_url));
        assert_eq!(output.scopes, vec!["mcp"]);
    }
}
