//! Authentication middleware for MCP servers.
//!
//! Provides a tower middleware that validates incoming requests using a
//! pluggable [`Authenticator`]. On success, the authenticated principal is
//! inserted into HTTP extensions and becomes accessible in MCP tool handlers
//! via `Extension(parts): Extension<Parts>`.
//!
//! When configured with a [`ResourceIdentifier`](oauth::ResourceIdentifier),
//! every 401 carries `WWW-Authenticate: Bearer resource_metadata=<url>`
//! pointing at the resource's metadata document, rendered from the inbound
//! request.
//!
//! # Example
//!
//! ```rust,ignore
//! use rmcp_oauth_server::auth::{AuthLayer, BearerAuth, Validator};
//! use rmcp_oauth_server::auth::oauth::ResourceIdentifier;
//!
//! #[derive(Clone)]
//! struct MyValidator;
//!
//! impl Validator for MyValidator {
//!     type Claims = String;
//!     type Error = String;
//!
//!     async fn validate(&self, token: &str, _parts: &Parts) -> Result<String, String> {
//!         Ok("user1".into())
//!     }
//! }
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", service)
//!     .layer(
//!         AuthLayer::new(BearerAuth::new(MyValidator))
//!             .with_resource_identifier(ResourceIdentifier::new("/mcp")?),
//!     );
//! ```

mod bearer;

pub mod api_key;
pub mod oauth;

#[cfg(feature = "jwt")]
pub mod jwt;

pub use bearer::BearerAuth;

use futures::future::BoxFuture;
use http::{Request, Response, StatusCode, request::Parts};
use oauth::{BearerChallenge, RequestOrigin, ResourceIdentifier, merge_resource_metadata};
use std::task::{Context, Poll};
use thiserror::Error;

const BAD_CREDENTIALS: &str = "Bad credentials";

/// Why a request was not authenticated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The request carried no credential this authenticator understands.
    #[error("Full authentication is required to access this resource")]
    MissingCredentials,

    /// A bearer token was presented and rejected.
    #[error("{0}")]
    InvalidToken(String),

    /// A non-token credential was presented and rejected.
    #[error("{0}")]
    BadCredentials(String),

    /// The credential was ambiguous or could not be parsed.
    #[error("{0}")]
    Malformed(String),
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::Malformed(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Response body. Rejected non-token credentials share one fixed body
    /// so the detail never reaches the client.
    fn body(&self) -> String {
        match self {
            AuthError::BadCredentials(_) => BAD_CREDENTIALS.to_string(),
            _ => self.to_string(),
        }
    }

    fn challenge(&self) -> BearerChallenge {
        match self {
            AuthError::MissingCredentials | AuthError::BadCredentials(_) => {
                BearerChallenge::Missing
            }
            AuthError::InvalidToken(description) => {
                BearerChallenge::InvalidToken(description.clone())
            }
            AuthError::Malformed(description) => {
                BearerChallenge::InvalidRequest(description.clone())
            }
        }
    }
}

/// Trait for validating incoming MCP requests.
///
/// On success, `Claims` is inserted into `http::Extensions`.
pub trait Authenticator: Clone + Send + Sync + 'static {
    /// The claims type produced on successful authentication.
    type Claims: Clone + Send + Sync + 'static;

    /// Validate the request and return claims, or an error.
    fn authenticate(
        &self,
        parts: &Parts,
    ) -> impl Future<Output = Result<Self::Claims, AuthError>> + Send;
}

/// Trait for validating a credential string (e.g., a Bearer token).
///
/// Implement this with your validation logic, then wrap it in
/// [`BearerAuth`] which handles extraction from the `Authorization` header.
/// The request parts are passed along so validators can derive
/// request-relative values such as the resource identifier.
pub trait Validator: Clone + Send + Sync + 'static {
    /// The claims type produced on successful validation.
    type Claims: Clone + Send + Sync + 'static;

    /// The error type returned on validation failure.
    type Error: std::fmt::Display + Send;

    /// Validate the credential string and return claims, or an error.
    fn validate(
        &self,
        credential: &str,
        parts: &Parts,
    ) -> impl Future<Output = Result<Self::Claims, Self::Error>> + Send;
}

/// Tower [`Layer`](tower::Layer) that applies [`AuthService`].
#[derive(Clone)]
pub struct AuthLayer<A> {
    authenticator: A,
    resource: Option<ResourceIdentifier>,
}

impl<A> AuthLayer<A> {
    pub fn new(authenticator: A) -> Self {
        Self {
            authenticator,
            resource: None,
        }
    }

    /// Point 401 challenges at this resource's metadata document.
    pub fn with_resource_identifier(mut self, resource: ResourceIdentifier) -> Self {
        self.resource = Some(resource);
        self
    }
}

impl<A, S> tower::Layer<S> for AuthLayer<A>
where
    A: Clone,
{
    type Service = AuthService<A, S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            authenticator: self.authenticator.clone(),
            resource: self.resource.clone(),
            inner,
        }
    }
}

/// Tower service that authenticates requests before forwarding them.
#[derive(Clone)]
pub struct AuthService<A, S> {
    authenticator: A,
    resource: Option<ResourceIdentifier>,
    inner: S,
}

impl<A, S, B> tower::Service<Request<B>> for AuthService<A, S>
where
    A: Authenticator,
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
        let authenticator = self.authenticator.clone();
        let resource = self.resource.clone();
        let mut inner = self.inner.clone();
        // swap to ensure poll_ready state is preserved
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            let (parts, body) = req.into_parts();

            match authenticator.authenticate(&parts).await {
                Ok(claims) => {
                    let mut req = Request::from_parts(parts, body);
                    req.extensions_mut().insert(claims);
                    inner.call(req).await
                }
                Err(err) => {
                    tracing::debug!(path = %parts.uri.path(), error = %err, "authentication failed");
                    Ok(unauthenticated(&parts, resource.as_ref(), &err))
                }
            }
        })
    }
}

fn unauthenticated(
    parts: &Parts,
    resource: Option<&ResourceIdentifier>,
    err: &AuthError,
) -> Response<axum::body::Body> {
    let baseline = err.challenge().render();
    let challenge = match resource {
        Some(resource) => {
            let origin = RequestOrigin::from_parts(parts);
            merge_resource_metadata(Some(&baseline), &resource.metadata_url(&origin))
        }
        None => baseline,
    };

    let mut response = Response::new(axum::body::Body::from(err.body()));
    *response.status_mut() = err.status();
    response
        .headers_mut()
        .insert(http::header::WWW_AUTHENTICATE, oauth::header_value(&challenge));
    response
}
