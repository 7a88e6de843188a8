//! Open dynamic client registration.

use http::{Method, request::Parts};
use rmcp_oauth_server::auth::{AuthError, Authenticator};

pub const DEFAULT_REGISTRATION_PATH: &str = "/oauth2/register";

/// Principal produced by [`OpenRegistration`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationPrincipal<C> {
    /// An unauthenticated registration request.
    Anonymous,
    Authenticated(C),
}

/// Lets `POST` to the registration endpoint through without credentials and
/// delegates every other request.
#[derive(Debug, Clone)]
pub struct OpenRegistration<A> {
    inner: A,
    path: String,
}

impl<A> OpenRegistration<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            path: DEFAULT_REGISTRATION_PATH.to_string(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    fn is_registration(&self, parts: &Parts) -> bool {
        parts.method == Method::POST && parts.uri.path() == self.path
    }
}

impl<A: Authenticator> Authenticator for OpenRegistration<A> {
    type Claims = RegistrationPrincipal<A::Claims>;

    async fn authenticate(&self, parts: &Parts) -> Result<Self::Claims, AuthError> {
        if self.is_registration(parts) {
            tracing::debug!(path = %self.path, "open client registration request");
            return Ok(RegistrationPrincipal::Anonymous);
        }
        self.inner
            .authenticate(parts)
            .await
            .map(RegistrationPrincipal::Authenticated)
    }
}
