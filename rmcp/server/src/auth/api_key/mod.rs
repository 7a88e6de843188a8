//! API key authentication plugin.
//!
//! Reads a composite `<id>.<secret>` credential from a single configurable
//! header (default `X-API-Key`), looks the entity up by id and verifies the
//! secret against its salted hash.
//!
//! ```rust,ignore
//! use rmcp_oauth_server::auth::AuthLayer;
//! use rmcp_oauth_server::auth::api_key::{
//!     ApiKeyAuth, ApiKeyEntity, InMemoryApiKeyEntityRepository, Sha256SecretHasher,
//! };
//! use rmcp_oauth_server::config::ApiKeyConfig;
//!
//! let repository = InMemoryApiKeyEntityRepository::new([ApiKeyEntity::builder()
//!     .id("api01")
//!     .secret("mycustomapikey")
//!     .name("test api key")
//!     .build(&Sha256SecretHasher)?]);
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", service)
//!     .layer(AuthLayer::new(ApiKeyAuth::new(&ApiKeyConfig::default(), repository)));
//! ```

mod hash;
mod repository;

pub use hash::{SecretHasher, Sha256SecretHasher};
pub use repository::{
    ApiKeyEntity, ApiKeyEntityBuilder, ApiKeyEntityRepository, InMemoryApiKeyEntityRepository,
};

use crate::{
    auth::{AuthError, Authenticator},
    config::ApiKeyConfig,
};
use http::{HeaderName, request::Parts};
use std::{fmt, sync::Arc};
use thiserror::Error;

const SEPARATOR: char = '.';
const INVALID_API_KEY: &str = "Invalid API key";
const API_KEY_MISMATCH: &str = "API key does not match";

/// API key parsing and authentication failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiKeyError {
    /// The header value was not of the form `<id>.<secret>`.
    #[error("API key must be in the format <id>.<secret>")]
    Malformed,

    /// The header was sent more than once.
    #[error("{header} must have a single value, found {count}")]
    MultipleValues { header: String, count: usize },

    /// Unknown id or wrong secret. Both produce this variant.
    #[error("{0}")]
    BadCredentials(&'static str),
}

impl From<ApiKeyError> for AuthError {
    fn from(err: ApiKeyError) -> Self {
        match err {
            ApiKeyError::BadCredentials(_) => AuthError::BadCredentials(err.to_string()),
            _ => AuthError::Malformed(err.to_string()),
        }
    }
}

/// A parsed `<id>.<secret>` credential.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    id: String,
    secret: String,
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl ApiKey {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
        }
    }

    /// Parse `<id>.<secret>`. Exactly one separator is allowed.
    pub fn parse(value: &str) -> Result<Self, ApiKeyError> {
        let mut parts = value.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(id), Some(secret), None) => Ok(Self::new(id, secret)),
            _ => Err(ApiKeyError::Malformed),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Render back to the `<id>.<secret>` header form.
    pub fn to_header_value(&self) -> String {
        format!("{}{SEPARATOR}{}", self.id, self.secret)
    }
}

/// Principal produced by a successful API key authentication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiKeyPrincipal {
    /// The key id.
    pub name: String,
    pub authorities: Vec<String>,
}

/// API key authenticator.
pub struct ApiKeyAuth<R, H = Sha256SecretHasher> {
    header: HeaderName,
    repository: Arc<R>,
    hasher: Arc<H>,
    // Verified against for unknown ids so both failures cost one hash.
    dummy_hash: Arc<str>,
}

impl<R, H> Clone for ApiKeyAuth<R, H> {
    fn clone(&self) -> Self {
        Self {
            header: self.header.clone(),
            repository: self.repository.clone(),
            hasher: self.hasher.clone(),
            dummy_hash: self.dummy_hash.clone(),
        }
    }
}

impl<R: ApiKeyEntityRepository> ApiKeyAuth<R> {
    pub fn new(config: &ApiKeyConfig, repository: R) -> Self {
        Self {
            header: config.header_name().clone(),
            repository: Arc::new(repository),
            hasher: Arc::new(Sha256SecretHasher),
            dummy_hash: Sha256SecretHasher.hash("").into(),
        }
    }
}

impl<R: ApiKeyEntityRepository, H: SecretHasher> ApiKeyAuth<R, H> {
    /// Verify secrets with another hasher.
    pub fn with_hasher<H2: SecretHasher>(self, hasher: H2) -> ApiKeyAuth<R, H2> {
        ApiKeyAuth {
            header: self.header,
            repository: self.repository,
            dummy_hash: hasher.hash("").into(),
            hasher: Arc::new(hasher),
        }
    }

    /// Extract the credential from the configured header.
    ///
    /// `Ok(None)` when the header is absent or blank, so other schemes can
    /// take over.
    pub fn extract(&self, parts: &Parts) -> Result<Option<ApiKey>, ApiKeyError> {
        let mut values = parts.headers.get_all(&self.header).iter();
        let Some(value) = values.next() else {
            return Ok(None);
        };
        let extra = values.count();
        if extra > 0 {
            return Err(ApiKeyError::MultipleValues {
                header: self.header.to_string(),
                count: extra + 1,
            });
        }
        let value = value.to_str().map_err(|_| ApiKeyError::Malformed)?.trim();
        if value.is_empty() {
            return Ok(None);
        }
        ApiKey::parse(value).map(Some)
    }

    /// Verify the key against the repository.
    pub fn authenticate_key(&self, key: &ApiKey) -> Result<ApiKeyPrincipal, ApiKeyError> {
        let Some(mut entity) = self.repository.find_by_key_id(key.id()) else {
            self.hasher.matches(key.secret(), &self.dummy_hash);
            tracing::debug!(key_id = %key.id(), "unknown API key id");
            return Err(ApiKeyError::BadCredentials(INVALID_API_KEY));
        };
        if !self.hasher.matches(key.secret(), entity.hashed_secret()) {
            tracing::debug!(key_id = %key.id(), "API key secret mismatch");
            return Err(ApiKeyError::BadCredentials(API_KEY_MISMATCH));
        }
        entity.erase_credentials();
        Ok(ApiKeyPrincipal {
            name: entity.id().to_string(),
            authorities: entity.authorities().to_vec(),
        })
    }
}

impl<R, H> Authenticator for ApiKeyAuth<R, H>
where
    R: ApiKeyEntityRepository,
    H: SecretHasher,
{
    type Claims = ApiKeyPrincipal;

    async fn authenticate(&self, parts: &Parts) -> Result<Self::Claims, AuthError> {
        let key = self.extract(parts)?.ok_or(AuthError::MissingCredentials)?;
        Ok(self.authenticate_key(&key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthLayer;
    use http::{Request, StatusCode};
    use std::convert::Infallible;
    use tower::{Layer, ServiceExt, service_fn};

    fn auth() -> ApiKeyAuth<InMemoryApiKeyEntityRepository> {
        let repository = InMemoryApiKeyEntityRepository::new([ApiKeyEntity::builder()
            .id("api01")
            .secret("mycustomapikey")
            .name("test api key")
            .authority("ROLE_MCP")
            .build(&Sha256SecretHasher)
            .unwrap()]);
        ApiKeyAuth::new(&ApiKeyConfig::default(), repository)
    }

    fn parts(values: &[&str]) -> Parts {
        let mut builder = Request::post("/mcp");
        for value in values {
            builder = builder.header("x-api-key", *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn parse_requires_exactly_one_separator() {
        let key = ApiKey::parse("api01.secret").unwrap();
        assert_eq!((key.id(), key.secret()), ("api01", "secret"));
        assert_eq!(key.to_header_value(), "api01.secret");
        assert_eq!(ApiKey::parse("api01").unwrap_err(), ApiKeyError::Malformed);
        assert_eq!(ApiKey::parse("a.b.c").unwrap_err(), ApiKeyError::Malformed);
        assert_eq!(
            ApiKeyError::Malformed.to_string(),
            "API key must be in the format <id>.<secret>"
        );
    }

    #[test]
    fn debug_redacts_secret() {
        assert!(!format!("{:?}", ApiKey::new("id", "hunter2")).contains("hunter2"));
    }

    #[test]
    fn extract_absent_or_blank_defers() {
        let auth = auth();
        assert_eq!(auth.extract(&parts(&[])).unwrap(), None);
        assert_eq!(auth.extract(&parts(&["  "])).unwrap(), None);
    }

    #[test]
    fn extract_rejects_multiple_values() {
        let err = auth().extract(&parts(&["a.b", "c.d"])).unwrap_err();
        assert_eq!(err.to_string(), "x-api-key must have a single value, found 2");
    }

    #[test]
    fn extract_parses_single_value() {
        assert_eq!(
            auth().extract(&parts(&["api01.mycustomapikey"])).unwrap(),
            Some(ApiKey::new("api01", "mycustomapikey"))
        );
        assert_eq!(
            auth().extract(&parts(&["no-separator"])).unwrap_err(),
            ApiKeyError::Malformed
        );
    }

    #[tokio::test]
    async fn valid_key_produces_principal() {
        let principal = auth()
            .authenticate(&parts(&["api01.mycustomapikey"]))
            .await
            .unwrap();
        assert_eq!(principal.name, "api01");
        assert_eq!(principal.authorities, vec!["ROLE_MCP"]);
    }

    #[tokio::test]
    async fn unknown_id_and_wrong_secret_fail_alike() {
        let auth = auth();
        let unknown = auth.authenticate(&parts(&["nope.mycustomapikey"])).await.unwrap_err();
        let mismatch = auth.authenticate(&parts(&["api01.wrong"])).await.unwrap_err();
        assert!(matches!(unknown, AuthError::BadCredentials(_)));
        assert!(matches!(mismatch, AuthError::BadCredentials(_)));
        assert_eq!(unknown.to_string(), "Invalid API key");
        assert_eq!(mismatch.to_string(), "API key does not match");
    }

    #[tokio::test]
    async fn missing_key_defers_and_malformed_key_is_rejected() {
        let auth = auth();
        assert_eq!(
            auth.authenticate(&parts(&[])).await.unwrap_err(),
            AuthError::MissingCredentials
        );
        assert!(matches!(
            auth.authenticate(&parts(&["a.b", "c.d"])).await.unwrap_err(),
            AuthError::Malformed(_)
        ));
    }

    #[tokio::test]
    async fn unknown_id_and_wrong_secret_get_identical_responses() {
        let service = AuthLayer::new(auth()).layer(service_fn(|_req: Request<axum::body::Body>| async {
            Ok::<_, Infallible>(http::Response::new(axum::body::Body::empty()))
        }));

        let mut responses = Vec::new();
        for key in ["nope.mycustomapikey", "api01.wrong"] {
            let response = service
                .clone()
                .oneshot(
                    Request::post("/mcp")
                        .header("x-api-key", key)
                        .body(axum::body::Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let status = response.status();
            let challenge = response.headers()[http::header::WWW_AUTHENTICATE].clone();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            responses.push((status, challenge, body));
        }

        assert_eq!(responses[0].0, StatusCode::UNAUTHORIZED);
        assert_eq!(responses[0], responses[1]);
        assert_eq!(&responses[0].2[..], b"Bad credentials");
    }
}
