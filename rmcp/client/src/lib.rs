//! OAuth 2.0 client support for MCP.
//!
//! Discovers the authorization server protecting an MCP server
//! ([`metadata`]), registers a client with it ([`registration`]) and obtains
//! access tokens bound to the MCP server's resource identifier ([`token`]).
//! [`hybrid`] picks between user and service tokens per request.
//!
//! ```rust,ignore
//! use rmcp_oauth_client::registration::{
//!     DynamicClientRegistrationRequest, InMemoryClientRegistrationStore,
//! };
//!
//! let store = InMemoryClientRegistrationStore::default();
//! let registration = store
//!     .register_mcp_client(
//!         "weather",
//!         "https://weather.example.com/mcp",
//!         &DynamicClientRegistrationRequest::builder().build()?,
//!     )
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod hybrid;
pub mod metadata;
pub mod registration;
pub mod token;

pub use error::{Error, Result};
