//! # rmcp-oauth-server
//!
//! OAuth 2.0 and API key security for MCP servers built on
//! [axum](https://docs.rs/axum).
//!
//! - [`auth::oauth`]: RFC 9728 protected resource metadata and
//!   resource-aware `WWW-Authenticate` challenges.
//! - [`auth::jwt`]: JWT bearer validation with audience binding (feature
//!   `jwt`, on by default).
//! - [`auth::api_key`]: `<id>.<secret>` API key authentication.
//! - [`config`]: validated configuration producing the layers above.
//!
//! ```rust,ignore
//! use rmcp_oauth_server::auth::jwt::JwksDecoder;
//! use rmcp_oauth_server::config::McpServerOAuth2Config;
//!
//! let config = McpServerOAuth2Config::builder()
//!     .issuer_uri("https://auth.example.com")
//!     .scope("mcp:tools")
//!     .build()?;
//! let decoder = JwksDecoder::from_issuer(config.issuer_uri()).build().await?;
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", service)
//!     .layer(config.auth_layer(decoder))
//!     .layer(config.metadata_layer());
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub use axum;

pub mod auth;
pub mod config;
pub mod error;

pub use error::ConfigError;
