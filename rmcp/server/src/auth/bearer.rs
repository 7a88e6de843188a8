//! Bearer token authentication plugin.
//!
//! Extracts a Bearer token from the `Authorization` header and delegates
//! validation to a [`Validator`](super::Validator).
//!
//! ```rust,ignore
//! use rmcp_oauth_server::auth::{AuthLayer, BearerAuth, jwt::JwtBearerValidator};
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", service)
//!     .layer(AuthLayer::new(BearerAuth::new(JwtBearerValidator::new(decoder))));
//! ```

use crate::auth::{AuthError, Authenticator, Validator};

/// Bearer token authenticator.
///
/// Extracts the token from `Authorization: Bearer <token>` and passes it
/// to the inner [`Validator`]. A missing header, or one using another
/// scheme, defers with [`AuthError::MissingCredentials`].
#[derive(Clone)]
pub struct BearerAuth<V> {
    validator: V,
}

impl<V> BearerAuth<V> {
    pub fn new(validator: V) -> Self {
        Self { validator }
    }
}

impl<V> Authenticator for BearerAuth<V>
where
    V: Validator,
{
    type Claims = V::Claims;

    async fn authenticate(&self, parts: &http::request::Parts) -> Result<Self::Claims, AuthError> {
        let token = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(AuthError::MissingCredentials)?;

        self.validator
            .validate(token, parts)
            .await
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}
