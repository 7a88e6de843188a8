//! Signed JWT access tokens.

use crate::{
    Error, Result,
    token::{
        AuthorizationGrant, ResourceAudienceCustomizer, TokenContext, TokenCustomizer, TokenType,
    },
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Map, Value, json};
use std::{collections::BTreeSet, fmt, sync::Arc};
use tracing::debug;

pub const DEFAULT_TIME_TO_LIVE: Duration = Duration::minutes(5);

/// An access token request that passed authorization.
#[derive(Debug, Clone)]
pub struct TokenRequest {
    /// The resource owner, or the client itself for `client_credentials`.
    pub subject: String,
    pub client_id: String,
    pub grant: AuthorizationGrant,
    pub authorized_scopes: BTreeSet<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token_value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub scopes: BTreeSet<String>,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token_value", &"[REDACTED]")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Issues signed JWT access tokens.
///
/// Claims are `iss`, `sub`, `client_id`, `scope`, `iat`, `nbf` and `exp`.
/// Customizers run afterwards in order, starting with the
/// [`ResourceAudienceCustomizer`].
#[derive(Clone)]
pub struct JwtTokenGenerator {
    issuer: String,
    key: Arc<EncodingKey>,
    header: Header,
    time_to_live: Duration,
    customizers: Vec<Arc<dyn TokenCustomizer>>,
}

impl fmt::Debug for JwtTokenGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtTokenGenerator")
            .field("issuer", &self.issuer)
            .field("algorithm", &self.header.alg)
            .field("kid", &self.header.kid)
            .field("time_to_live", &self.time_to_live)
            .field("customizers", &self.customizers.len())
            .finish()
    }
}

impl JwtTokenGenerator {
    pub fn new(issuer: impl Into<String>, key: EncodingKey, algorithm: Algorithm) -> Result<Self> {
        let issuer = issuer.into();
        if issuer.trim().is_empty() {
            return Err(Error::Config("issuer cannot be empty".into()));
        }
        Ok(Self {
            issuer,
            key: Arc::new(key),
            header: Header::new(algorithm),
            time_to_live: DEFAULT_TIME_TO_LIVE,
            customizers: vec![Arc::new(ResourceAudienceCustomizer::default())],
        })
    }

    /// HS256 tokens signed with a shared secret.
    pub fn hmac(issuer: impl Into<String>, secret: &[u8]) -> Result<Self> {
        Self::new(issuer, EncodingKey::from_secret(secret), Algorithm::HS256)
    }

    pub fn with_key_id(mut self, kid: impl Into<String>) -> Self {
        self.header.kid = Some(kid.into());
        self
    }

    pub fn with_time_to_live(mut self, time_to_live: Duration) -> Self {
        self.time_to_live = time_to_live;
        self
    }

    /// Replace the audience customizer, keeping any others.
    pub fn with_audience_customizer(mut self, customizer: ResourceAudienceCustomizer) -> Self {
        self.customizers[0] = Arc::new(customizer);
        self
    }

    pub fn with_customizer(mut self, customizer: impl TokenCustomizer) -> Self {
        self.customizers.push(Arc::new(customizer));
        self
    }

    pub fn generate(&self, request: &TokenRequest) -> Result<IssuedToken> {
        let issued_at = Utc::now();
        let expires_at = issued_at + self.time_to_live;

        let mut claims = Map::new();
        claims.insert("iss".into(), json!(self.issuer));
        claims.insert("sub".into(), json!(request.subject));
        claims.insert("client_id".into(), json!(request.client_id));
        if !request.authorized_scopes.is_empty() {
            let scope = request
                .authorized_scopes
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ");
            claims.insert("scope".into(), json!(scope));
        }
        claims.insert("iat".into(), json!(issued_at.timestamp()));
        claims.insert("nbf".into(), json!(issued_at.timestamp()));
        claims.insert("exp".into(), json!(expires_at.timestamp()));

        let context = TokenContext {
            token_type: TokenType::AccessToken,
            grant: request.grant.clone(),
            authorized_scopes: request.authorized_scopes.clone(),
            client_id: request.client_id.clone(),
        };
        for customizer in &self.customizers {
            customizer.customize(&context, &mut claims);
        }

        let token_value = encode(&self.header, &Value::Object(claims), &self.key)?;
        debug!(
            client_id = %request.client_id,
            grant_type = request.grant.grant_type(),
            "issued access token"
        );
        Ok(IssuedToken {
            token_value,
            issued_at,
            expires_at,
            scopes: request.authorized_scopes.clone(),
        })
    }
}
