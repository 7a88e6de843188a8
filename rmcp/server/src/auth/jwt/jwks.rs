//! JWKS-backed JWT decoding.
//!
//! Keys are fetched from the issuer's `jwks_uri`, either configured directly
//! or discovered from the issuer's metadata document. An unknown `kid`
//! triggers a single key set refresh to follow key rotation.

use super::{Jwt, JwtDecoder, JwtError};
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::RwLock;

const OPENID_CONFIGURATION: &str = "/.well-known/openid-configuration";
const OAUTH_AUTHORIZATION_SERVER: &str = "/.well-known/oauth-authorization-server";

enum KeySource {
    JwksUri(String),
    Issuer(String),
}

/// Builder for [`JwksDecoder`].
pub struct JwksDecoderBuilder {
    source: KeySource,
    issuer: Option<String>,
    client: Option<reqwest::Client>,
}

impl JwksDecoderBuilder {
    /// Require the `iss` claim to match this value.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Resolve the key set location, fetch the keys and build the decoder.
    pub async fn build(self) -> Result<JwksDecoder, JwtError> {
        let client = self.client.unwrap_or_default();
        let (jwks_uri, issuer) = match self.source {
            KeySource::JwksUri(uri) => (uri, self.issuer),
            KeySource::Issuer(issuer) => {
                let uri = discover_jwks_uri(&client, &issuer).await?;
                (uri, Some(self.issuer.unwrap_or(issuer)))
            }
        };
        let jwks = fetch_jwks(&client, &jwks_uri).await?;

        let mut validation = Validation::default();
        validation.validate_aud = false;
        validation.validate_nbf = true;
        if let Some(ref iss) = issuer {
            validation.set_issuer(&[iss]);
        }

        Ok(JwksDecoder {
            inner: Arc::new(JwksDecoderInner {
                jwks: RwLock::new(jwks),
                jwks_uri,
                validation,
                client,
            }),
        })
    }
}

struct JwksDecoderInner {
    jwks: RwLock<JwkSet>,
    jwks_uri: String,
    validation: Validation,
    client: reqwest::Client,
}

/// JWT decoder that verifies tokens against a JWKS endpoint.
#[derive(Clone)]
pub struct JwksDecoder {
    inner: Arc<JwksDecoderInner>,
}

enum KeyLookup {
    Found(Jwt),
    UnknownKid(String),
}

impl JwksDecoder {
    /// Start building a decoder from a JWKS URL.
    pub fn from_jwks_uri(uri: impl Into<String>) -> JwksDecoderBuilder {
        JwksDecoderBuilder {
            source: KeySource::JwksUri(uri.into()),
            issuer: None,
            client: None,
        }
    }

    /// Start building a decoder whose `jwks_uri` is read from the issuer's
    /// metadata. The issuer is also enforced on the `iss` claim.
    pub fn from_issuer(issuer: impl Into<String>) -> JwksDecoderBuilder {
        JwksDecoderBuilder {
            source: KeySource::Issuer(issuer.into()),
            issuer: None,
            client: None,
        }
    }

    pub fn jwks_uri(&self) -> &str {
        &self.inner.jwks_uri
    }

    /// Refresh the JWKS from the configured endpoint.
    pub async fn refresh_jwks(&self) -> Result<(), JwtError> {
        let jwks = fetch_jwks(&self.inner.client, &self.inner.jwks_uri).await?;
        *self.inner.jwks.write().await = jwks;
        Ok(())
    }

    fn decode_with(&self, token: &str, jwks: &JwkSet) -> Result<KeyLookup, JwtError> {
        let header = decode_header(token)?;
        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| JwtError::Decode("JWT missing kid header".into()))?;
        let Some(jwk) = jwks.find(kid) else {
            return Ok(KeyLookup::UnknownKid(kid.to_string()));
        };
        let key = DecodingKey::from_jwk(jwk)?;
        let mut validation = self.inner.validation.clone();
        validation.algorithms = vec![header.alg];
        let data = decode::<Map<String, Value>>(token, &key, &validation)?;
        Ok(KeyLookup::Found(Jwt::new(token, data.claims)))
    }
}

impl JwtDecoder for JwksDecoder {
    async fn decode(&self, token: &str) -> Result<Jwt, JwtError> {
        {
            let jwks = self.inner.jwks.read().await;
            if let KeyLookup::Found(jwt) = self.decode_with(token, &jwks)? {
                return Ok(jwt);
            }
        }

        tracing::debug!(jwks_uri = %self.inner.jwks_uri, "unknown kid, refreshing JWKS");
        self.refresh_jwks().await?;

        let jwks = self.inner.jwks.read().await;
        match self.decode_with(token, &jwks)? {
            KeyLookup::Found(jwt) => Ok(jwt),
            KeyLookup::UnknownKid(kid) => {
                Err(JwtError::Decode(format!("no matching key for kid: {kid}")))
            }
        }
    }
}

#[derive(Deserialize)]
struct IssuerMetadata {
    issuer: Option<String>,
    jwks_uri: Option<String>,
}

async fn discover_jwks_uri(client: &reqwest::Client, issuer: &str) -> Result<String, JwtError> {
    let base = issuer.trim_end_matches('/');
    for well_known in [OPENID_CONFIGURATION, OAUTH_AUTHORIZATION_SERVER] {
        let url = format!("{base}{well_known}");
        tracing::debug!(url = %url, "fetching issuer metadata");
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| JwtError::Keys(e.to_string()))?;
        if !response.status().is_success() {
            continue;
        }
        let metadata: IssuerMetadata = response
            .json()
            .await
            .map_err(|e| JwtError::Keys(e.to_string()))?;
        if metadata
            .issuer
            .as_deref()
            .is_some_and(|iss| iss.trim_end_matches('/') != base)
        {
            return Err(JwtError::Keys(format!(
                "issuer in metadata does not match {issuer}"
            )));
        }
        if let Some(jwks_uri) = metadata.jwks_uri {
            return Ok(jwks_uri);
        }
    }
    Err(JwtError::Keys(format!("no jwks_uri published by {issuer}")))
}

async fn fetch_jwks(client: &reqwest::Client, url: &str) -> Result<JwkSet, JwtError> {
    let resp = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| JwtError::Keys(format!("failed to fetch JWKS: {e}")))?;
    resp.json::<JwkSet>()
        .await
        .map_err(|e| JwtError::Keys(format!("failed to parse JWKS: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn sign(kid: &str, claims: Value) -> String {
        let mut header = Header::default();
        header.kid = Some(kid.into());
        encode(&header, &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn jwks(kid: &str) -> String {
        json!({
            "keys": [{ "kty": "oct", "kid": kid, "k": URL_SAFE_NO_PAD.encode(SECRET) }]
        })
        .to_string()
    }

    fn claims(issuer: &str) -> Value {
        json!({
            "sub": "alice",
            "iss": issuer,
            "exp": jsonwebtoken::get_current_timestamp() + 60,
        })
    }

    #[tokio::test]
    async fn discovers_jwks_uri_from_issuer() {
        let mut server = mockito::Server::new_async().await;
        let issuer = server.url();
        server
            .mock("GET", "/.well-known/openid-configuration")
            .with_header("content-type", "application/json")
            .with_body(json!({ "issuer": issuer, "jwks_uri": format!("{issuer}/jwks") }).to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/jwks")
            .with_header("content-type", "application/json")
            .with_body(jwks("k1"))
            .create_async()
            .await;

        let decoder = JwksDecoder::from_issuer(&issuer).build().await.unwrap();
        assert_eq!(decoder.jwks_uri(), format!("{issuer}/jwks"));

        let jwt = decoder.decode(&sign("k1", claims(&issuer))).await.unwrap();
        assert_eq!(jwt.subject(), Some("alice"));

        let err = decoder
            .decode(&sign("k1", claims("https://evil.example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, JwtError::Validation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn unknown_kid_refreshes_once() {
        let mut server = mockito::Server::new_async().await;
        let jwks_mock = server
            .mock("GET", "/jwks")
            .with_header("content-type", "application/json")
            .with_body(jwks("k1"))
            .expect(2)
            .create_async()
            .await;

        let decoder = JwksDecoder::from_jwks_uri(format!("{}/jwks", server.url()))
            .build()
            .await
            .unwrap();
        let err = decoder
            .decode(&sign("rotated", claims("https://issuer")))
            .await
            .unwrap_err();
        assert_eq!(err, JwtError::Decode("no matching key for kid: rotated".into()));
        jwks_mock.assert_async().await;
    }
}
