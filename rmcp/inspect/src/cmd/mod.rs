//! Command-line interface for OAuth-protected MCP servers.

use crate::error::Error;
use clap::{Parser, Subcommand};
use rmcp_oauth_client::metadata::McpMetadataDiscovery;

pub mod register;
pub mod token;

/// Discover, register with and obtain tokens for OAuth-protected MCP servers.
#[derive(Parser, Debug)]
#[command(name = "rmcp-oauth-inspect", version, about)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the protected resource metadata of an MCP server.
    Discover {
        /// URL of the MCP endpoint.
        url: String,
    },
    /// Register a client with the server's authorization server.
    Register(register::RegisterArgs),
    /// Obtain an access token bound to the server.
    Token(token::TokenArgs),
}

impl App {
    /// Parse CLI arguments and execute the corresponding command.
    pub async fn run() -> Result<(), Error> {
        let app = App::parse();
        match app.command {
            Command::Discover { url } => {
                let metadata = McpMetadataDiscovery::default().mcp_metadata(&url).await?;
                println!("{}", serde_json::to_string_pretty(&metadata)?);
            }
            Command::Register(args) => {
                let registration = register::register(&args).await?;
                println!("{}", serde_json::to_string_pretty(&registration)?);
            }
            Command::Token(args) => {
                let token = token::token(&args).await?;
                println!("{}", serde_json::to_string_pretty(&token)?);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let app = App::try_parse_from(["rmcp-oauth-inspect", "discover", "http://localhost/mcp"]).unwrap();
        assert!(matches!(app.command, Command::Discover { url } if url == "http://localhost/mcp"));

        let app = App::try_parse_from([
            "rmcp-oauth-inspect",
            "token",
            "http://localhost/mcp",
            "--scope",
            "mcp:read",
        ])
        .unwrap();
        let Command::Token(args) = app.command else {
            panic!("expected token command");
        };
        assert_eq!(args.scope.as_deref(), Some("mcp:read"));
        assert_eq!(args.id, "default");
    }

    #[test]
    fn url_is_required() {
        assert!(App::try_parse_from(["rmcp-oauth-inspect", "discover"]).is_err());
    }
}
