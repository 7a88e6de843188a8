use super::{McpMetadata, ProtectedResourceMetadata, WwwAuthenticateParameters};
use crate::{Error, Result};
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

const WELL_KNOWN_PROTECTED_RESOURCE: &str = "/.well-known/oauth-protected-resource";

/// Discovers the protected resource metadata of an MCP server.
#[derive(Clone, Debug, Default)]
pub struct McpMetadataDiscovery {
    client: Client,
}

impl McpMetadataDiscovery {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Probe `server_url` with an unauthenticated POST and parse the
    /// challenge of a `401` response.
    ///
    /// Any other response means the server offered no challenge.
    pub async fn www_authenticate_parameters(
        &self,
        server_url: &str,
    ) -> Result<Option<WwwAuthenticateParameters>> {
        debug!(url = %server_url, "probing MCP server for a WWW-Authenticate challenge");
        let response = self.client.post(server_url).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            debug!(url = %server_url, status = %response.status(), "no challenge from MCP server");
            return Ok(None);
        }
        let Some(header) = response
            .headers()
            .get(http::header::WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
        else {
            debug!(url = %server_url, "401 without WWW-Authenticate header");
            return Ok(None);
        };
        let parameters = WwwAuthenticateParameters::parse(header);
        debug!(url = %server_url, ?parameters, "parsed WWW-Authenticate challenge");
        Ok(parameters)
    }

    /// Discover and validate the metadata of the MCP server at `server_url`.
    ///
    /// Candidate documents are tried in order: the challenge's
    /// `resource_metadata`, then the path-aware well-known URL, then the
    /// root well-known URL. The document's `resource` must be a prefix of
    /// `server_url`.
    pub async fn mcp_metadata(&self, server_url: &str) -> Result<McpMetadata> {
        let parameters = self.www_authenticate_parameters(server_url).await?;

        let mut candidates = Vec::with_capacity(3);
        if let Some(parameters) = &parameters {
            candidates.push(parameters.resource_metadata.clone());
        }
        for include_path in [true, false] {
            let url = well_known_protected_resource_url(server_url, include_path)?;
            if !candidates.contains(&url) {
                candidates.push(url);
            }
        }

        let metadata = self.protected_resource_metadata(&candidates).await?;
        if !server_url.starts_with(&metadata.resource) {
            return Err(Error::Discovery(format!(
                "Resource identifier [{}] does not match MCP Server url [{server_url}]",
                metadata.resource
            )));
        }
        Ok(McpMetadata {
            www_authenticate_parameters: parameters,
            protected_resource_metadata: metadata,
        })
    }

    /// Fetch the first candidate that resolves. `404` and `401` move on to
    /// the next candidate; any other failure is fatal.
    pub async fn protected_resource_metadata(
        &self,
        candidates: &[String],
    ) -> Result<ProtectedResourceMetadata> {
        for url in candidates {
            debug!(url = %url, "reading protected resource metadata");
            let response = self
                .client
                .get(url)
                .header(http::header::ACCEPT, "application/json")
                .send()
                .await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND || status == StatusCode::UNAUTHORIZED {
                debug!(url = %url, %status, "skipping protected resource metadata candidate");
                continue;
            }
            if !status.is_success() {
                return Err(Error::Discovery(format!(
                    "protected resource metadata at {url} returned HTTP {status}"
                )));
            }
            let metadata: ProtectedResourceMetadata = response.json().await?;
            metadata.validate()?;
            debug!(url = %url, resource = %metadata.resource, "got protected resource metadata");
            return Ok(metadata);
        }
        Err(Error::Discovery(
            "Could not find protected resource metadata".into(),
        ))
    }
}

/// `{origin}/.well-known/oauth-protected-resource[{path}]` for `server_url`.
fn well_known_protected_resource_url(server_url: &str, include_path: bool) -> Result<String> {
    let mut url = Url::parse(server_url)?;
    let path = if include_path {
        url.path().trim_end_matches('/').to_string()
    } else {
        String::new()
    };
    url.set_path(&format!("{WELL_KNOWN_PROTECTED_RESOURCE}{path}"));
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn well_known_urls() {
        assert_eq!(
            well_known_protected_resource_url("https://host/ctx/mcp?x=1", true).unwrap(),
            "https://host/.well-known/oauth-protected-resource/ctx/mcp"
        );
        assert_eq!(
            well_known_protected_resource_url("https://host/ctx/mcp", false).unwrap(),
            "https://host/.well-known/oauth-protected-resource"
        );
        assert_eq!(
            well_known_protected_resource_url("https://host:8443/", true).unwrap(),
            "https://host:8443/.well-known/oauth-protected-resource"
        );
    }

    fn prm(resource: &str) -> String {
        json!({
            "resource": resource,
            "authorization_servers": ["https://auth.example.com"],
            "scopes_supported": ["mcp"],
        })
        .to_string()
    }

    #[tokio::test]
    async fn discovers_from_challenge() {
        let mut server = mockito::Server::new_async().await;
        let mcp_url = format!("{}/mcp", server.url());
        let prm_url = format!("{}/custom/prm", server.url());
        server
            .mock("POST", "/mcp")
            .with_status(401)
            .with_header(
                "www-authenticate",
                &format!(r#"Bearer resource_metadata="{prm_url}", scope="mcp:read""#),
            )
            .create_async()
            .await;
        let prm_mock = server
            .mock("GET", "/custom/prm")
            .with_header("content-type", "application/json")
            .with_body(prm(&mcp_url))
            .expect(1)
            .create_async()
            .await;

        let metadata = McpMetadataDiscovery::default()
            .mcp_metadata(&mcp_url)
            .await
            .unwrap();
        prm_mock.assert_async().await;
        assert_eq!(
            metadata.www_authenticate_parameters,
            Some(WwwAuthenticateParameters {
                resource_metadata: prm_url,
                scope: Some("mcp:read".into()),
            })
        );
        assert_eq!(metadata.protected_resource_metadata.resource, mcp_url);
    }

    #[tokio::test]
    async fn falls_back_to_root_well_known() {
        let mut server = mockito::Server::new_async().await;
        let mcp_url = format!("{}/mcp", server.url());
        server.mock("POST", "/mcp").with_status(200).create_async().await;
        server
            .mock("GET", "/.well-known/oauth-protected-resource/mcp")
            .with_status(404)
            .create_async()
            .await;
        server
            .mock("GET", "/.well-known/oauth-protected-resource")
            .with_header("content-type", "application/json")
            .with_body(prm(&server.url()))
            .create_async()
            .await;

        let metadata = McpMetadataDiscovery::default()
            .mcp_metadata(&mcp_url)
            .await
            .unwrap();
        assert!(metadata.www_authenticate_parameters.is_none());
        assert_eq!(metadata.protected_resource_metadata.resource, server.url());
    }

    #[tokio::test]
    async fn resource_mismatch_fails() {
        let mut server = mockito::Server::new_async().await;
        let mcp_url = format!("{}/ctx/mcp", server.url());
        server.mock("POST", "/ctx/mcp").with_status(401).create_async().await;
        server
            .mock("GET", "/.well-known/oauth-protected-resource/ctx/mcp")
            .with_header("content-type", "application/json")
            .with_body(prm(&format!("{}/other", server.url())))
            .create_async()
            .await;

        let err = McpMetadataDiscovery::default()
            .mcp_metadata(&mcp_url)
            .await
            .unwrap_err();
        assert!(
            err.to_string().starts_with("Resource identifier ["),
            "{err}"
        );
    }

    #[tokio::test]
    async fn no_candidate_resolves() {
        let mut server = mockito::Server::new_async().await;
        let mcp_url = format!("{}/mcp", server.url());
        server.mock("POST", "/mcp").with_status(401).create_async().await;
        server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let err = McpMetadataDiscovery::default()
            .mcp_metadata(&mcp_url)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Could not find protected resource metadata");
    }

    #[tokio::test]
    async fn server_error_stops_discovery() {
        let mut server = mockito::Server::new_async().await;
        let mcp_url = format!("{}/mcp", server.url());
        server.mock("POST", "/mcp").with_status(401).create_async().await;
        server
            .mock("GET", "/.well-known/oauth-protected-resource/mcp")
            .with_status(500)
            .create_async()
            .await;
        let root = server
            .mock("GET", "/.well-known/oauth-protected-resource")
            .with_body(prm(&server.url()))
            .expect(0)
            .create_async()
            .await;

        let err = McpMetadataDiscovery::default()
            .mcp_metadata(&mcp_url)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Discovery(_)), "{err:?}");
        root.assert_async().await;
    }
}
