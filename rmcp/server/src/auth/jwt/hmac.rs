//! Shared-secret (HS256) JWT decoding.

use super::{Jwt, JwtDecoder, JwtError};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Decoder for tokens signed with a shared HMAC secret.
#[derive(Clone)]
pub struct HmacDecoder {
    key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl HmacDecoder {
    pub fn new(secret: &[u8]) -> Self {
        Self::with_algorithm(secret, Algorithm::HS256)
    }

    /// `algorithm` must be one of the HMAC family.
    pub fn with_algorithm(secret: &[u8], algorithm: Algorithm) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        validation.validate_nbf = true;
        Self {
            key: Arc::new(DecodingKey::from_secret(secret)),
            validation: Arc::new(validation),
        }
    }

    /// Require the `iss` claim to match this value.
    pub fn issuer(mut self, issuer: impl AsRef<str>) -> Self {
        let mut validation = Validation::clone(&self.validation);
        validation.set_issuer(&[issuer.as_ref()]);
        self.validation = Arc::new(validation);
        self
    }
}

impl JwtDecoder for HmacDecoder {
    async fn decode(&self, token: &str) -> Result<Jwt, JwtError> {
        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)?;
        Ok(Jwt::new(token, data.claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn now() -> u64 {
        jsonwebtoken::get_current_timestamp()
    }

    fn sign(claims: Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[tokio::test]
    async fn decodes_valid_token() {
        let token = sign(json!({ "sub": "alice", "iss": "https://issuer", "exp": now() + 60 }));
        let jwt = HmacDecoder::new(SECRET)
            .issuer("https://issuer")
            .decode(&token)
            .await
            .unwrap();
        assert_eq!(jwt.subject(), Some("alice"));
    }

    #[tokio::test]
    async fn expired_token_is_a_validation_failure() {
        let token = sign(json!({ "sub": "alice", "exp": now() - 3600 }));
        let err = HmacDecoder::new(SECRET).decode(&token).await.unwrap_err();
        assert!(matches!(err, JwtError::Validation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let token = sign(json!({ "iss": "https://other", "exp": now() + 60 }));
        let err = HmacDecoder::new(SECRET)
            .issuer("https://issuer")
            .decode(&token)
            .await
            .unwrap_err();
        assert!(matches!(err, JwtError::Validation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn bad_signature_is_a_decode_failure() {
        let token = sign(json!({ "exp": now() + 60 }));
        let err = HmacDecoder::new(b"another-secret-another-secret-00")
            .decode(&token)
            .await
            .unwrap_err();
        assert!(matches!(err, JwtError::Decode(_)), "{err:?}");
    }
}
