//! Resource server configuration.
//!
//! Configuration values are built and validated up front; an invalid
//! configuration fails at [`build`](McpServerOAuth2ConfigBuilder::build) and
//! never at request time.

use crate::{
    auth::oauth::{
        MetadataCustomizer, MetadataEndpoint, ProtectedResourceMetadataBuilder,
        ProtectedResourceMetadataLayer, RequestOrigin, ResourceIdentifier,
    },
    error::ConfigError,
};
use http::HeaderName;
use std::{fmt, sync::Arc};
use url::Url;

#[cfg(feature = "jwt")]
use crate::auth::{
    AuthLayer, BearerAuth,
    jwt::{JwtBearerValidator, JwtDecoder},
};

pub const DEFAULT_RESOURCE_PATH: &str = "/mcp";
pub const DEFAULT_RESOURCE_NAME: &str = "MCP Resource Server";
pub const DEFAULT_BEARER_METHOD: &str = "header";
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Configuration of an MCP server protected by OAuth 2.0 bearer tokens.
#[derive(Clone)]
pub struct McpServerOAuth2Config {
    issuer_uri: String,
    resource: ResourceIdentifier,
    scopes: Vec<String>,
    bearer_methods: Vec<String>,
    resource_name: String,
    customizers: Vec<MetadataCustomizer>,
    validate_audience: bool,
}

impl fmt::Debug for McpServerOAuth2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpServerOAuth2Config")
            .field("issuer_uri", &self.issuer_uri)
            .field("resource", &self.resource)
            .field("scopes", &self.scopes)
            .field("bearer_methods", &self.bearer_methods)
            .field("resource_name", &self.resource_name)
            .field("customizers", &self.customizers.len())
            .field("validate_audience", &self.validate_audience)
            .finish()
    }
}

impl McpServerOAuth2Config {
    pub fn builder() -> McpServerOAuth2ConfigBuilder {
        McpServerOAuth2ConfigBuilder::default()
    }

    pub fn issuer_uri(&self) -> &str {
        &self.issuer_uri
    }

    pub fn resource_identifier(&self) -> &ResourceIdentifier {
        &self.resource
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn validate_audience(&self) -> bool {
        self.validate_audience
    }

    /// The metadata endpoint, with the configured values applied before any
    /// custom mutators.
    pub fn metadata_endpoint(&self) -> MetadataEndpoint {
        let issuer = self.issuer_uri.clone();
        let scopes = self.scopes.clone();
        let bearer_methods = self.bearer_methods.clone();
        let resource_name = self.resource_name.clone();
        let defaults: MetadataCustomizer =
            Arc::new(move |metadata: &mut ProtectedResourceMetadataBuilder| {
                metadata
                    .authorization_server(issuer.clone())
                    .bearer_methods_list(bearer_methods.clone())
                    .resource_name(resource_name.clone());
                if !scopes.is_empty() {
                    metadata.scopes_list(scopes.clone());
                }
            });

        self.customizers.iter().cloned().fold(
            MetadataEndpoint::new(self.resource.clone()).with_customizer(defaults),
            MetadataEndpoint::with_customizer,
        )
    }

    pub fn metadata_layer(&self) -> ProtectedResourceMetadataLayer {
        ProtectedResourceMetadataLayer::from_endpoint(self.metadata_endpoint())
    }

    /// Bearer validator for tokens from `decoder`, audience-bound to this
    /// resource unless audience validation is disabled.
    #[cfg(feature = "jwt")]
    pub fn bearer_validator<D: JwtDecoder>(&self, decoder: D) -> JwtBearerValidator<D> {
        let validator = JwtBearerValidator::new(decoder);
        if self.validate_audience {
            validator.with_audience(self.resource.clone())
        } else {
            validator
        }
    }

    /// Authentication layer whose challenges point at this resource's
    /// metadata.
    #[cfg(feature = "jwt")]
    pub fn auth_layer<D: JwtDecoder>(&self, decoder: D) -> AuthLayer<BearerAuth<JwtBearerValidator<D>>> {
        AuthLayer::new(BearerAuth::new(self.bearer_validator(decoder)))
            .with_resource_identifier(self.resource.clone())
    }
}

/// Builder for [`McpServerOAuth2Config`].
#[derive(Default)]
pub struct McpServerOAuth2ConfigBuilder {
    issuer_uri: Option<String>,
    resource_path: Option<String>,
    scopes: Vec<String>,
    bearer_methods: Vec<String>,
    resource_name: Option<String>,
    customizers: Vec<MetadataCustomizer>,
    validate_audience: Option<bool>,
}

impl McpServerOAuth2ConfigBuilder {
    /// Issuer of the authorization server protecting this resource.
    pub fn issuer_uri(mut self, issuer: impl Into<String>) -> Self {
        self.issuer_uri = Some(issuer.into());
        self
    }

    /// Path of the MCP endpoint. Defaults to `/mcp`.
    pub fn resource_path(mut self, path: impl Into<String>) -> Self {
        self.resource_path = Some(path.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn bearer_method(mut self, method: impl Into<String>) -> Self {
        self.bearer_methods.push(method.into());
        self
    }

    pub fn resource_name(mut self, name: impl Into<String>) -> Self {
        self.resource_name = Some(name.into());
        self
    }

    /// Append a metadata mutator. Mutators run in insertion order.
    pub fn metadata_customizer<F>(mut self, customizer: F) -> Self
    where
        F: Fn(&mut ProtectedResourceMetadataBuilder) + Send + Sync + 'static,
    {
        self.customizers.push(Arc::new(customizer));
        self
    }

    /// Whether bearer tokens must carry this resource in `aud`. Defaults to
    /// `true`.
    pub fn validate_audience(mut self, validate: bool) -> Self {
        self.validate_audience = Some(validate);
        self
    }

    pub fn build(self) -> Result<McpServerOAuth2Config, ConfigError> {
        let issuer_uri = self
            .issuer_uri
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .ok_or(ConfigError::Blank("issuer_uri"))?;
        Url::parse(&issuer_uri).map_err(|_| ConfigError::InvalidUrl {
            field: "issuer_uri",
            value: issuer_uri.clone(),
        })?;

        let resource = ResourceIdentifier::new(
            self.resource_path.as_deref().unwrap_or(DEFAULT_RESOURCE_PATH),
        )?;
        let bearer_methods = if self.bearer_methods.is_empty() {
            vec![DEFAULT_BEARER_METHOD.to_string()]
        } else {
            self.bearer_methods
        };

        let config = McpServerOAuth2Config {
            issuer_uri,
            resource,
            scopes: self.scopes,
            bearer_methods,
            resource_name: self
                .resource_name
                .unwrap_or_else(|| DEFAULT_RESOURCE_NAME.to_string()),
            customizers: self.customizers,
            validate_audience: self.validate_audience.unwrap_or(true),
        };

        // Surface invalid mutators now rather than on the first request.
        config
            .metadata_endpoint()
            .metadata(&RequestOrigin::new("http", "localhost", None))?;
        Ok(config)
    }
}

/// Configuration of API key authentication.
#[derive(Clone, Debug)]
pub struct ApiKeyConfig {
    header_name: HeaderName,
}

impl Default for ApiKeyConfig {
    fn default() -> Self {
        Self {
            header_name: HeaderName::from_static("x-api-key"),
        }
    }
}

impl ApiKeyConfig {
    pub fn new(header_name: &str) -> Result<Self, ConfigError> {
        let header_name = header_name.trim();
        if header_name.is_empty() {
            return Err(ConfigError::Blank("header name"));
        }
        let header_name = HeaderName::try_from(header_name)
            .map_err(|_| ConfigError::InvalidHeaderName(header_name.to_string()))?;
        Ok(Self { header_name })
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn issuer_is_required() {
        assert_eq!(
            McpServerOAuth2Config::builder().build().unwrap_err(),
            ConfigError::Blank("issuer_uri")
        );
        assert!(matches!(
            McpServerOAuth2Config::builder().issuer_uri("not a url").build(),
            Err(ConfigError::InvalidUrl { field: "issuer_uri", .. })
        ));
    }

    #[test]
    fn defaults_are_applied() {
        let config = McpServerOAuth2Config::builder()
            .issuer_uri("https://auth.example.com")
            .build()
            .unwrap();
        assert_eq!(config.resource_identifier().path(), DEFAULT_RESOURCE_PATH);
        assert!(config.validate_audience());

        let origin = RequestOrigin::new("https", "example.com", None);
        let metadata = config.metadata_endpoint().metadata(&origin).unwrap();
        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            json!({
                "resource": "https://example.com/mcp",
                "authorization_servers": ["https://auth.example.com"],
                "bearer_methods_supported": ["header"],
                "resource_name": "MCP Resource Server",
            })
        );
    }

    #[test]
    fn customizers_run_after_configured_values() {
        let config = McpServerOAuth2Config::builder()
            .issuer_uri("https://auth.example.com")
            .resource_path("/weather")
            .scope("weather:read")
            .metadata_customizer(|m| {
                m.resource_name("Weather").claim("tos_uri", "https://example.com/tos");
            })
            .build()
            .unwrap();
        let origin = RequestOrigin::new("http", "localhost", Some(8080));
        let metadata = config.metadata_endpoint().metadata(&origin).unwrap();
        assert_eq!(metadata.resource(), "http://localhost:8080/weather");
        assert_eq!(metadata.resource_name(), Some("Weather"));
        assert_eq!(metadata.scopes_supported(), Some(&["weather:read".to_string()][..]));
        assert_eq!(metadata.claims()["tos_uri"], json!("https://example.com/tos"));
    }

    #[test]
    fn invalid_customizer_fails_at_build() {
        let err = McpServerOAuth2Config::builder()
            .issuer_uri("https://auth.example.com")
            .metadata_customizer(|m| {
                m.bearer_methods_list(vec![]);
            })
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::EmptyList("bearer_methods_supported"));
    }

    #[test]
    fn blank_resource_path_fails_at_build() {
        let err = McpServerOAuth2Config::builder()
            .issuer_uri("https://auth.example.com")
            .resource_path(" ")
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "path cannot be empty");
    }

    #[test]
    fn api_key_header_name() {
        assert_eq!(ApiKeyConfig::default().header_name(), "x-api-key");
        assert_eq!(ApiKeyConfig::new("X-Custom-Key").unwrap().header_name(), "x-custom-key");
        assert_eq!(ApiKeyConfig::new("").unwrap_err(), ConfigError::Blank("header name"));
        assert!(matches!(
            ApiKeyConfig::new("bad header"),
            Err(ConfigError::InvalidHeaderName(_))
        ));
    }
}
