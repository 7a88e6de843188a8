//! OAuth 2.0 Protected Resource Metadata (RFC 9728).
//!
//! MCP servers MUST implement RFC 9728 to indicate the locations of their
//! authorization servers. This module provides the validated metadata type
//! and a tower layer that serves it at the well-known endpoint.
//!
//! ```rust,ignore
//! use rmcp_oauth_server::auth::oauth::{ProtectedResourceMetadataLayer, ResourceIdentifier};
//!
//! let layer = ProtectedResourceMetadataLayer::new(ResourceIdentifier::new("/mcp")?)
//!     .with_customizer(|metadata| {
//!         metadata
//!             .authorization_server("https://auth.example.com")
//!             .bearer_method("header");
//!     });
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", mcp_service)
//!     .layer(layer);
//! ```
//!
//! The document is served for `GET` on both
//! `/.well-known/oauth-protected-resource{resourcePath}` and
//! `{resourcePath}/.well-known/oauth-protected-resource`. Every other request
//! passes through untouched.

use crate::error::ConfigError;
use axum::{Json, response::IntoResponse};
use futures::future::BoxFuture;
use http::{Method, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::{
    fmt,
    sync::Arc,
    task::{Context, Poll},
};
use url::Url;

use super::resource::{RequestOrigin, ResourceIdentifier};

/// Well-known path of the protected resource metadata document.
pub const WELL_KNOWN_PROTECTED_RESOURCE: &str = "/.well-known/oauth-protected-resource";

const RESOURCE: &str = "resource";
const AUTHORIZATION_SERVERS: &str = "authorization_servers";
const SCOPES_SUPPORTED: &str = "scopes_supported";
const BEARER_METHODS_SUPPORTED: &str = "bearer_methods_supported";
const RESOURCE_NAME: &str = "resource_name";

/// OAuth 2.0 Protected Resource Metadata ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)).
///
/// Only constructed through [`ProtectedResourceMetadataBuilder::build`], so a
/// value of this type always has a valid `resource` URL and no list field
/// that is present but empty.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProtectedResourceMetadata {
    resource: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    authorization_servers: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    scopes_supported: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    bearer_methods_supported: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    resource_name: Option<String>,

    #[serde(flatten)]
    claims: Map<String, Value>,
}

impl ProtectedResourceMetadata {
    pub fn builder() -> ProtectedResourceMetadataBuilder {
        ProtectedResourceMetadataBuilder::default()
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn authorization_servers(&self) -> Option<&[String]> {
        self.authorization_servers.as_deref()
    }

    pub fn scopes_supported(&self) -> Option<&[String]> {
        self.scopes_supported.as_deref()
    }

    pub fn bearer_methods_supported(&self) -> Option<&[String]> {
        self.bearer_methods_supported.as_deref()
    }

    pub fn resource_name(&self) -> Option<&str> {
        self.resource_name.as_deref()
    }

    /// Custom claims, keyed by claim name.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }
}

/// Builder for [`ProtectedResourceMetadata`].
///
/// List setters append; the `*_list` setters replace the whole list, which is
/// how a caller can (invalidly) supply an empty list.
#[derive(Clone, Debug, Default)]
pub struct ProtectedResourceMetadataBuilder {
    resource: Option<String>,
    authorization_servers: Option<Vec<String>>,
    scopes_supported: Option<Vec<String>>,
    bearer_methods_supported: Option<Vec<String>>,
    resource_name: Option<String>,
    claims: Map<String, Value>,
}

impl ProtectedResourceMetadataBuilder {
    pub fn resource(&mut self, resource: impl Into<String>) -> &mut Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn authorization_server(&mut self, issuer: impl Into<String>) -> &mut Self {
        self.authorization_servers
            .get_or_insert_with(Vec::new)
            .push(issuer.into());
        self
    }

    pub fn authorization_servers_list(&mut self, issuers: Vec<String>) -> &mut Self {
        self.authorization_servers = Some(issuers);
        self
    }

    pub fn scope(&mut self, scope: impl Into<String>) -> &mut Self {
        self.scopes_supported
            .get_or_insert_with(Vec::new)
            .push(scope.into());
        self
    }

    pub fn scopes_list(&mut self, scopes: Vec<String>) -> &mut Self {
        self.scopes_supported = Some(scopes);
        self
    }

    pub fn bearer_method(&mut self, method: impl Into<String>) -> &mut Self {
        self.bearer_methods_supported
            .get_or_insert_with(Vec::new)
            .push(method.into());
        self
    }

    pub fn bearer_methods_list(&mut self, methods: Vec<String>) -> &mut Self {
        self.bearer_methods_supported = Some(methods);
        self
    }

    pub fn resource_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.resource_name = Some(name.into());
        self
    }

    /// Add a custom claim. Standard claims are rejected at [`build`](Self::build).
    pub fn claim(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    pub fn build(&self) -> Result<ProtectedResourceMetadata, ConfigError> {
        let resource = self
            .resource
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or(ConfigError::Blank(RESOURCE))?;
        validate_url(RESOURCE, resource)?;

        if let Some(servers) = &self.authorization_servers {
            if servers.is_empty() {
                return Err(ConfigError::EmptyList(AUTHORIZATION_SERVERS));
            }
            for server in servers {
                validate_url("authorization_server", server)?;
            }
        }
        if matches!(&self.scopes_supported, Some(scopes) if scopes.is_empty()) {
            return Err(ConfigError::EmptyList(SCOPES_SUPPORTED));
        }
        if matches!(&self.bearer_methods_supported, Some(methods) if methods.is_empty()) {
            return Err(ConfigError::EmptyList(BEARER_METHODS_SUPPORTED));
        }
        for name in self.claims.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::Blank("claim name"));
            }
            if [
                RESOURCE,
                AUTHORIZATION_SERVERS,
                SCOPES_SUPPORTED,
                BEARER_METHODS_SUPPORTED,
                RESOURCE_NAME,
            ]
            .contains(&name.as_str())
            {
                return Err(ConfigError::ReservedClaim(name.clone()));
            }
        }

        Ok(ProtectedResourceMetadata {
            resource: resource.to_string(),
            authorization_servers: self.authorization_servers.clone(),
            scopes_supported: self.scopes_supported.clone(),
            bearer_methods_supported: self.bearer_methods_supported.clone(),
            resource_name: self.resource_name.clone(),
            claims: self.claims.clone(),
        })
    }
}

fn validate_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        })
}

/// Callback applied to the metadata builder before each document is built.
pub type MetadataCustomizer = Arc<dyn Fn(&mut ProtectedResourceMetadataBuilder) + Send + Sync>;

/// Renders the metadata document for a resource.
#[derive(Clone)]
pub struct MetadataEndpoint {
    resource: ResourceIdentifier,
    customizers: Vec<MetadataCustomizer>,
}

impl fmt::Debug for MetadataEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataEndpoint")
            .field("resource", &self.resource)
            .field("customizers", &self.customizers.len())
            .finish()
    }
}

impl MetadataEndpoint {
    pub fn new(resource: ResourceIdentifier) -> Self {
        Self {
            resource,
            customizers: Vec::new(),
        }
    }

    pub fn with_customizer(mut self, customizer: MetadataCustomizer) -> Self {
        self.customizers.push(customizer);
        self
    }

    pub fn resource_identifier(&self) -> &ResourceIdentifier {
        &self.resource
    }

    /// Whether the request targets one of this resource's metadata paths.
    pub fn matches(&self, method: &Method, path: &str, origin: &RequestOrigin) -> bool {
        if method != Method::GET {
            return false;
        }
        let context_path = origin.context_path().as_str();
        let relative = if context_path.is_empty() {
            path
        } else {
            path.strip_prefix(context_path)
                .filter(|rest| rest.starts_with('/'))
                .unwrap_or(path)
        };
        let resource_path = self.resource.path();
        relative
            .strip_prefix(WELL_KNOWN_PROTECTED_RESOURCE)
            .is_some_and(|rest| rest == resource_path)
            || relative
                .strip_prefix(resource_path)
                .is_some_and(|rest| rest == WELL_KNOWN_PROTECTED_RESOURCE)
    }

    /// Build the document for the given origin, running customizers in order.
    pub fn metadata(&self, origin: &RequestOrigin) -> Result<ProtectedResourceMetadata, ConfigError> {
        let mut builder = ProtectedResourceMetadata::builder();
        builder.resource(self.resource.resource(origin));
        for customizer in &self.customizers {
            customizer(&mut builder);
        }
        builder.build()
    }
}

/// Tower [`Layer`](tower::Layer) that serves protected resource metadata.
#[derive(Clone, Debug)]
pub struct ProtectedResourceMetadataLayer {
    endpoint: Arc<MetadataEndpoint>,
}

impl ProtectedResourceMetadataLayer {
    pub fn new(resource: ResourceIdentifier) -> Self {
        Self::from_endpoint(MetadataEndpoint::new(resource))
    }

    pub fn from_endpoint(endpoint: MetadataEndpoint) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
        }
    }

    /// Append a metadata customizer. Customizers run in insertion order.
    pub fn with_customizer<F>(self, customizer: F) -> Self
    where
        F: Fn(&mut ProtectedResourceMetadataBuilder) + Send + Sync + 'static,
    {
        let endpoint = Arc::unwrap_or_clone(self.endpoint).with_customizer(Arc::new(customizer));
        Self::from_endpoint(endpoint)
    }
}

impl<S> tower::Layer<S> for ProtectedResourceMetadataLayer {
    type Service = ProtectedResourceMetadataService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ProtectedResourceMetadataService {
            endpoint: self.endpoint.clone(),
            inner,
        }
    }
}

/// Tower service answering metadata requests and forwarding everything else.
#[derive(Clone, Debug)]
pub struct ProtectedResourceMetadataService<S> {
    endpoint: Arc<MetadataEndpoint>,
    inner: S,
}

impl<S, B> tower::Service<Request<B>> for ProtectedResourceMetadataService<S>
where
    S: tower::Service<Request<B>, Response = Response<axum::body::Body>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let endpoint = self.endpoint.clone();
        let mut inner = self.inner.clone();
        // swap to ensure poll_ready state is preserved
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let origin = RequestOrigin::from_parts(&parts);

            if !endpoint.matches(&parts.method, parts.uri.path(), &origin) {
                return inner.call(Request::from_parts(parts, body)).await;
            }

            match endpoint.metadata(&origin) {
                Ok(metadata) => {
                    tracing::debug!(resource = %metadata.resource(), "serving protected resource metadata");
                    Ok(Json(metadata).into_response())
                }
                Err(err) => {
                    tracing::error!(error = %err, "invalid protected resource metadata");
                    Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
                }
            }
        })
    }
}
