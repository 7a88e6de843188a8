//! Command line inspection of OAuth-protected MCP servers.

pub mod cmd;
pub mod error;
