//! Audience binding for JWT access tokens.
//!
//! A token is accepted only when its `aud` claim contains this resource's
//! exact identifier, so a token minted for one MCP server cannot be replayed
//! against another.

use super::{Jwt, JwtDecoder, JwtError};
use crate::auth::{Validator, oauth::{RequestOrigin, ResourceIdentifier}};
use http::request::Parts;

const INVALID_AUDIENCE: &str = "The aud claim is not valid";

/// Checks that a token's `aud` claim contains an expected identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudienceValidator {
    audience: String,
}

impl AudienceValidator {
    pub fn new(audience: impl Into<String>) -> Self {
        Self {
            audience: audience.into(),
        }
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn validate(&self, jwt: &Jwt) -> Result<(), JwtError> {
        if jwt.audience().iter().any(|aud| *aud == self.audience) {
            Ok(())
        } else {
            Err(JwtError::Validation(INVALID_AUDIENCE.into()))
        }
    }
}

/// Decorates a [`JwtDecoder`] with an audience check for a fixed resource.
///
/// Decoding runs first; its failures are returned unchanged.
#[derive(Clone)]
pub struct AudienceValidatingDecoder<D> {
    decoder: D,
    validator: AudienceValidator,
}

impl<D> AudienceValidatingDecoder<D> {
    pub fn new(decoder: D, audience: impl Into<String>) -> Self {
        Self {
            decoder,
            validator: AudienceValidator::new(audience),
        }
    }
}

impl<D: JwtDecoder> JwtDecoder for AudienceValidatingDecoder<D> {
    async fn decode(&self, token: &str) -> Result<Jwt, JwtError> {
        let jwt = self.decoder.decode(token).await?;
        self.validator.validate(&jwt)?;
        Ok(jwt)
    }
}

/// [`Validator`] for bearer JWTs.
///
/// With [`with_audience`](Self::with_audience), the expected audience is the
/// resource identifier rendered from the inbound request.
#[derive(Clone)]
pub struct JwtBearerValidator<D> {
    decoder: D,
    resource: Option<ResourceIdentifier>,
}

impl<D> JwtBearerValidator<D> {
    pub fn new(decoder: D) -> Self {
        Self {
            decoder,
            resource: None,
        }
    }

    pub fn with_audience(mut self, resource: ResourceIdentifier) -> Self {
        self.resource = Some(resource);
        self
    }
}

impl<D: JwtDecoder> Validator for JwtBearerValidator<D> {
    type Claims = Jwt;
    type Error = JwtError;

    async fn validate(&self, token: &str, parts: &Parts) -> Result<Jwt, JwtError> {
        let jwt = self.decoder.decode(token).await?;
        if let Some(resource) = &self.resource {
            let expected = resource.resource(&RequestOrigin::from_parts(parts));
            AudienceValidator::new(expected).validate(&jwt).inspect_err(|_| {
                tracing::debug!(aud = ?jwt.audience(), "token audience does not match resource");
            })?;
        }
        Ok(jwt)
    }
}
