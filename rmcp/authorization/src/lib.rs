//! Authorization server building blocks for MCP.
//!
//! Access tokens issued by [`JwtTokenGenerator`] carry the requested
//! `resource` in their `aud` claim, so a token minted for one MCP server is
//! rejected by every other one. [`consent`] decides when the user must be
//! asked, and [`OpenRegistration`] lets unauthenticated clients reach the
//! dynamic registration endpoint.

pub mod consent;
pub mod error;
pub mod generator;
pub mod registration;
pub mod token;

pub use error::{Error, Result};
pub use generator::{IssuedToken, JwtTokenGenerator, TokenRequest};
pub use registration::{OpenRegistration, RegistrationPrincipal};
pub use token::{
    AudienceFallback, AuthorizationGrant, ResourceAudienceCustomizer, TokenContext,
    TokenCustomizer, TokenType,
};
