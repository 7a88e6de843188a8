use super::{
    client::ClientRegistration, request::DynamicClientRegistrationRequest,
    service::DynamicClientRegistrar,
};
use crate::{Error, Result, metadata::McpMetadataDiscovery};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Read access to realized client registrations.
pub trait ClientRegistrationStore: Send + Sync + 'static {
    fn find_by_registration_id(&self, registration_id: &str) -> Option<ClientRegistration>;

    /// The resource identifier the registration was obtained for.
    fn find_resource_id_by_registration_id(&self, registration_id: &str) -> Option<String>;
}

#[derive(Debug)]
struct StoredRegistration {
    registration: ClientRegistration,
    resource_id: String,
}

type Entry = Arc<OnceCell<StoredRegistration>>;

/// In-memory registration store with at-most-once registration per id.
///
/// Concurrent first calls for the same id share one in-flight
/// discovery and registration. A failed attempt leaves no entry behind, so
/// the next call tries again.
#[derive(Debug, Default)]
pub struct InMemoryClientRegistrationStore {
    entries: Mutex<HashMap<String, Entry>>,
    discovery: McpMetadataDiscovery,
    registrar: DynamicClientRegistrar,
}

impl InMemoryClientRegistrationStore {
    pub fn new(discovery: McpMetadataDiscovery, registrar: DynamicClientRegistrar) -> Self {
        Self {
            entries: Mutex::default(),
            discovery,
            registrar,
        }
    }

    fn entry(&self, registration_id: &str) -> Entry {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(registration_id.to_string())
            .or_default()
            .clone()
    }

    fn stored<T>(&self, registration_id: &str, f: impl FnOnce(&StoredRegistration) -> T) -> Option<T> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(registration_id).and_then(|cell| cell.get()).map(f)
    }

    /// Discover the MCP server at `server_url`, register a client with its
    /// first authorization server and store the result under
    /// `registration_id`. Does nothing when the id is already registered.
    ///
    /// A blank `template` scope is filled from the challenge's `scope`, then
    /// from the metadata's `scopes_supported`.
    pub async fn register_mcp_client(
        &self,
        registration_id: &str,
        server_url: &str,
        template: &DynamicClientRegistrationRequest,
    ) -> Result<ClientRegistration> {
        let cell = self.entry(registration_id);
        let stored = cell
            .get_or_try_init(|| self.discover_and_register(registration_id, server_url, template))
            .await?;
        Ok(stored.registration.clone())
    }

    async fn discover_and_register(
        &self,
        registration_id: &str,
        server_url: &str,
        template: &DynamicClientRegistrationRequest,
    ) -> Result<StoredRegistration> {
        debug!(registration_id, url = %server_url, "registering client for MCP server");
        let metadata = self.discovery.mcp_metadata(server_url).await?;
        let prm = &metadata.protected_resource_metadata;
        let issuer = prm
            .authorization_servers
            .as_ref()
            .and_then(|servers| servers.first())
            .ok_or_else(|| {
                Error::Discovery(
                    "cannot find authorization_servers from MCP Server's protected resource metadata"
                        .into(),
                )
            })?;

        let challenge_scope = metadata
            .www_authenticate_parameters
            .as_ref()
            .and_then(|p| p.scope.as_deref())
            .filter(|s| !s.trim().is_empty());
        let request = match (template.has_scope(), challenge_scope, &prm.scopes_supported) {
            (true, _, _) => template.clone(),
            (false, Some(scope), _) => template.to_builder().scope(scope).build()?,
            (false, None, Some(scopes)) if !scopes.is_empty() => {
                template.to_builder().scopes(scopes).build()?
            }
            _ => template.clone(),
        };

        let (response, as_metadata) = self.registrar.register(&request, issuer).await?;
        let registration =
            ClientRegistration::from_registration(registration_id, &request, &response, &as_metadata);
        info!(
            registration_id,
            client_id = %registration.client_id,
            resource = %prm.resource,
            "stored MCP client registration"
        );
        Ok(StoredRegistration {
            registration,
            resource_id: prm.resource.clone(),
        })
    }

    /// Store a statically known registration. An existing entry for the
    /// same id is kept.
    pub fn add_pre_registered_client(
        &self,
        registration: ClientRegistration,
        resource_id: impl Into<String>,
    ) {
        let registration_id = registration.registration_id.clone();
        let stored = StoredRegistration {
            registration,
            resource_id: resource_id.into(),
        };
        if self.entry(&registration_id).set(stored).is_err() {
            debug!(registration_id = %registration_id, "registration already present, keeping it");
        }
    }
}

impl ClientRegistrationStore for InMemoryClientRegistrationStore {
    fn find_by_registration_id(&self, registration_id: &str) -> Option<ClientRegistration> {
        self.stored(registration_id, |stored| stored.registration.clone())
    }

    fn find_resource_id_by_registration_id(&self, registration_id: &str) -> Option<String> {
        self.stored(registration_id, |stored| stored.resource_id.clone())
    }
}
