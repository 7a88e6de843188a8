//! OAuth 2.0 resource server support for MCP servers.
//!
//! Implements the server-side requirements of the
//! [MCP Authorization specification](https://modelcontextprotocol.io/specification/draft/basic/authorization):
//!
//! - **Protected Resource Metadata** ([RFC 9728](https://datatracker.ietf.org/doc/html/rfc9728)):
//!   serve `/.well-known/oauth-protected-resource{resourcePath}` so MCP
//!   clients can discover authorization servers.
//!
//! - **Resource-aware challenges**: 401 responses carry
//!   `WWW-Authenticate: Bearer resource_metadata=<url>` rendered from the
//!   inbound request, so they stay correct behind proxies and below a
//!   context path.
//!
//! # Example
//!
//! ```rust,ignore
//! use rmcp_oauth_server::auth::{AuthLayer, BearerAuth};
//! use rmcp_oauth_server::auth::oauth::{ProtectedResourceMetadataLayer, ResourceIdentifier};
//!
//! let resource = ResourceIdentifier::new("/mcp")?;
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", mcp_service)
//!     .layer(AuthLayer::new(BearerAuth::new(validator)).with_resource_identifier(resource.clone()))
//!     .layer(ProtectedResourceMetadataLayer::new(resource).with_customizer(|m| {
//!         m.authorization_server("https://auth.example.com");
//!     }));
//! ```

mod challenge;
mod metadata;
mod resource;

pub use challenge::{BearerChallenge, merge_resource_metadata};
pub(crate) use challenge::header_value;
pub use metadata::{
    MetadataCustomizer, MetadataEndpoint, ProtectedResourceMetadata,
    ProtectedResourceMetadataBuilder, ProtectedResourceMetadataLayer,
    ProtectedResourceMetadataService, WELL_KNOWN_PROTECTED_RESOURCE,
};
pub use resource::{ContextPath, RequestOrigin, ResourceIdentifier};
