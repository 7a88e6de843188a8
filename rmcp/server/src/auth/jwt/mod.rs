//! JWT bearer token validation.
//!
//! A [`JwtDecoder`] verifies a compact JWT (signature, `exp`, `nbf`, `iss`)
//! and exposes its claim set as a [`Jwt`]. Audience binding is layered on
//! top: [`AudienceValidatingDecoder`] checks a fixed resource identifier,
//! while [`JwtBearerValidator`] renders the identifier from each inbound
//! request.
//!
//! Requires the `jwt` feature.
//!
//! ```rust,ignore
//! use rmcp_oauth_server::auth::{AuthLayer, BearerAuth};
//! use rmcp_oauth_server::auth::jwt::{JwksDecoder, JwtBearerValidator};
//! use rmcp_oauth_server::auth::oauth::ResourceIdentifier;
//!
//! let resource = ResourceIdentifier::new("/mcp")?;
//! let decoder = JwksDecoder::from_issuer("https://auth.example.com").build().await?;
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", service)
//!     .layer(
//!         AuthLayer::new(BearerAuth::new(
//!             JwtBearerValidator::new(decoder).with_audience(resource.clone()),
//!         ))
//!         .with_resource_identifier(resource),
//!     );
//! ```

mod audience;
mod hmac;
mod jwks;

pub use audience::{AudienceValidatingDecoder, AudienceValidator, JwtBearerValidator};
pub use hmac::HmacDecoder;
pub use jwks::{JwksDecoder, JwksDecoderBuilder};

use serde_json::{Map, Value};
use thiserror::Error;

/// JWT decoding and validation failures.
///
/// Decode failures and claim validation failures stay distinct so that a
/// decorator never relabels one as the other.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtError {
    /// The token could not be parsed or its signature did not verify.
    #[error("An error occurred while attempting to decode the Jwt: {0}")]
    Decode(String),

    /// The token decoded but one of its claims was rejected.
    #[error("An error occurred while attempting to decode the Jwt: {0}")]
    Validation(String),

    /// Signing keys could not be retrieved.
    #[error("failed to retrieve signing keys: {0}")]
    Keys(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject
            | ErrorKind::MissingRequiredClaim(_) => JwtError::Validation(err.to_string()),
            _ => JwtError::Decode(err.to_string()),
        }
    }
}

/// A verified JWT and its claim set.
#[derive(Clone, Debug, PartialEq)]
pub struct Jwt {
    token_value: String,
    claims: Map<String, Value>,
}

impl Jwt {
    pub fn new(token_value: impl Into<String>, claims: Map<String, Value>) -> Self {
        Self {
            token_value: token_value.into(),
            claims,
        }
    }

    pub fn token_value(&self) -> &str {
        &self.token_value
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    pub fn subject(&self) -> Option<&str> {
        self.claim("sub").and_then(Value::as_str)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claim("iss").and_then(Value::as_str)
    }

    /// The `aud` claim as a list. A single string audience becomes a
    /// one-element list; an absent or non-string claim is empty.
    pub fn audience(&self) -> Vec<String> {
        match self.claim("aud") {
            Some(Value::String(aud)) => vec![aud.clone()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Granted scopes from a space-separated `scope` or an `scp` array.
    pub fn scopes(&self) -> Vec<String> {
        match (self.claim("scope"), self.claim("scp")) {
            (Some(Value::String(scope)), _) => {
                scope.split_whitespace().map(String::from).collect()
            }
            (_, Some(Value::Array(values))) => values
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Decodes and verifies a compact JWT.
pub trait JwtDecoder: Clone + Send + Sync + 'static {
    fn decode(&self, token: &str) -> impl Future<Output = Result<Jwt, JwtError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jwt(claims: Value) -> Jwt {
        Jwt::new("token", claims.as_object().cloned().unwrap())
    }

    #[test]
    fn audience_accepts_string_or_array() {
        assert_eq!(jwt(json!({ "aud": "a" })).audience(), vec!["a"]);
        assert_eq!(jwt(json!({ "aud": ["a", "b"] })).audience(), vec!["a", "b"]);
        assert!(jwt(json!({})).audience().is_empty());
    }

    #[test]
    fn scopes_from_scope_or_scp() {
        assert_eq!(jwt(json!({ "scope": "read write" })).scopes(), vec!["read", "write"]);
        assert_eq!(jwt(json!({ "scp": ["read"] })).scopes(), vec!["read"]);
    }

    #[test]
    fn standard_claims() {
        let token = jwt(json!({ "sub": "alice", "iss": "https://issuer" }));
        assert_eq!(token.subject(), Some("alice"));
        assert_eq!(token.issuer(), Some("https://issuer"));
        assert_eq!(token.token_value(), "token");
    }
}
