//! Dynamic client registration against a discovered authorization server.

use crate::error::Error;
use clap::Args;
use rmcp_oauth_client::registration::{
    ClientRegistration, DynamicClientRegistrationRequest, GrantType,
    InMemoryClientRegistrationStore,
};

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// URL of the MCP endpoint.
    pub url: String,

    /// Local registration id.
    #[arg(long, default_value = "default")]
    pub id: String,

    /// Grant types to register for. Defaults to client_credentials.
    #[arg(long = "grant-type", value_name = "GRANT")]
    pub grant_types: Vec<String>,

    /// Redirect URIs, required with authorization_code.
    #[arg(long = "redirect-uri", value_name = "URI")]
    pub redirect_uris: Vec<String>,

    /// Space-separated scope. Discovered from the server when omitted.
    #[arg(long)]
    pub scope: Option<String>,

    #[arg(long)]
    pub client_name: Option<String>,

    /// Print the client secret instead of redacting it.
    #[arg(long)]
    pub show_secret: bool,
}

impl RegisterArgs {
    /// The registration template described by these arguments.
    pub fn request(&self) -> Result<DynamicClientRegistrationRequest, Error> {
        let mut builder = DynamicClientRegistrationRequest::builder();
        if !self.grant_types.is_empty() {
            builder = builder.grant_types(
                self.grant_types
                    .iter()
                    .map(|g| GrantType::from(g.as_str()))
                    .collect(),
            );
        }
        if !self.redirect_uris.is_empty() {
            builder = builder.redirect_uris(self.redirect_uris.clone());
        }
        if let Some(scope) = &self.scope {
            builder = builder.scope(scope);
        }
        if let Some(client_name) = &self.client_name {
            builder = builder.client_name(client_name);
        }
        Ok(builder.build()?)
    }
}

/// Discover the server and register a client with its authorization server.
pub async fn register(args: &RegisterArgs) -> Result<ClientRegistration, Error> {
    let request = args.request()?;
    let store = InMemoryClientRegistrationStore::default();
    let registration = store.register_mcp_client(&args.id, &args.url, &request).await?;
    tracing::info!(registration_id = %args.id, client_id = %registration.client_id, "client registered");
    Ok(if args.show_secret {
        registration
    } else {
        registration.redacted()
    })
}
