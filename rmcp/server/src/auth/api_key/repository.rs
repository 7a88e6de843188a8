//! API key entities and their storage.

use super::hash::SecretHasher;
use crate::error::ConfigError;
use std::{
    collections::HashMap,
    fmt,
    sync::{PoisonError, RwLock},
};

/// Stored form of an API key. The secret is only ever kept hashed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeyEntity {
    id: String,
    hashed_secret: String,
    name: String,
    authorities: Vec<String>,
}

impl fmt::Debug for ApiKeyEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyEntity")
            .field("id", &self.id)
            .field("hashed_secret", &"[REDACTED]")
            .field("name", &self.name)
            .field("authorities", &self.authorities)
            .finish()
    }
}

impl ApiKeyEntity {
    pub fn builder() -> ApiKeyEntityBuilder {
        ApiKeyEntityBuilder::default()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn hashed_secret(&self) -> &str {
        &self.hashed_secret
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn authorities(&self) -> &[String] {
        &self.authorities
    }

    /// Drop the hashed secret once it is no longer needed.
    pub fn erase_credentials(&mut self) {
        self.hashed_secret.clear();
    }
}

#[derive(Clone, Default)]
pub struct ApiKeyEntityBuilder {
    id: Option<String>,
    secret: Option<String>,
    name: Option<String>,
    authorities: Vec<String>,
}

impl ApiKeyEntityBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Plaintext secret. Hashed during [`build`](Self::build).
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.push(authority.into());
        self
    }

    pub fn build(self, hasher: &dyn SecretHasher) -> Result<ApiKeyEntity, ConfigError> {
        let id = required(self.id, "id")?;
        if id.contains('.') {
            return Err(ConfigError::Invalid("id must not contain '.'".into()));
        }
        let secret = required(self.secret, "secret")?;
        if secret.contains('.') {
            return Err(ConfigError::Invalid("secret must not contain '.'".into()));
        }
        let name = required(self.name, "name")?;
        Ok(ApiKeyEntity {
            id,
            hashed_secret: hasher.hash(&secret),
            name,
            authorities: self.authorities,
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::Blank(field))
}

/// Lookup of API key entities by key id.
pub trait ApiKeyEntityRepository: Send + Sync + 'static {
    /// Find an entity by id. Returns an owned copy.
    fn find_by_key_id(&self, id: &str) -> Option<ApiKeyEntity>;
}

/// In-memory [`ApiKeyEntityRepository`].
#[derive(Debug, Default)]
pub struct InMemoryApiKeyEntityRepository {
    entities: RwLock<HashMap<String, ApiKeyEntity>>,
}

impl InMemoryApiKeyEntityRepository {
    pub fn new(entities: impl IntoIterator<Item = ApiKeyEntity>) -> Self {
        let repository = Self::default();
        for entity in entities {
            repository.add(entity);
        }
        repository
    }

    /// Insert an entity, replacing any existing entity with the same id.
    pub fn add(&self, entity: ApiKeyEntity) {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity.id.clone(), entity);
    }

    pub fn remove(&self, id: &str) -> Option<ApiKeyEntity> {
        self.entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}

impl ApiKeyEntityRepository for InMemoryApiKeyEntityRepository {
    fn find_by_key_id(&self, id: &str) -> Option<ApiKeyEntity> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}
