//! Token customization by grant.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const RESOURCE_PARAMETER: &str = "resource";
pub const OPENID_SCOPE: &str = "openid";

/// Kind of token being issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    AccessToken,
    RefreshToken,
    IdToken,
}

/// The grant a token is issued for, with the parameters of the request that
/// drives audience binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationGrant {
    /// Parameters of the original authorization request.
    AuthorizationCode {
        authorization_request_parameters: BTreeMap<String, String>,
    },
    /// Parameters of the token request.
    ClientCredentials {
        additional_parameters: BTreeMap<String, String>,
    },
    /// Parameters of the refresh request, not of the original authorization.
    RefreshToken {
        additional_parameters: BTreeMap<String, String>,
    },
}

impl AuthorizationGrant {
    pub fn grant_type(&self) -> &'static str {
        match self {
            AuthorizationGrant::AuthorizationCode { .. } => "authorization_code",
            AuthorizationGrant::ClientCredentials { .. } => "client_credentials",
            AuthorizationGrant::RefreshToken { .. } => "refresh_token",
        }
    }

    pub fn additional_parameters(&self) -> &BTreeMap<String, String> {
        match self {
            AuthorizationGrant::AuthorizationCode {
                authorization_request_parameters,
            } => authorization_request_parameters,
            AuthorizationGrant::ClientCredentials {
                additional_parameters,
            }
            | AuthorizationGrant::RefreshToken {
                additional_parameters,
            } => additional_parameters,
        }
    }

    /// The `resource` request parameter, if any.
    pub fn resource(&self) -> Option<&str> {
        self.additional_parameters()
            .get(RESOURCE_PARAMETER)
            .map(String::as_str)
    }
}

/// What a customizer sees of the token being issued.
#[derive(Debug, Clone)]
pub struct TokenContext {
    pub token_type: TokenType,
    pub grant: AuthorizationGrant,
    pub authorized_scopes: BTreeSet<String>,
    pub client_id: String,
}

/// Mutates the claim set of a token before it is signed.
pub trait TokenCustomizer: Send + Sync + 'static {
    fn customize(&self, context: &TokenContext, claims: &mut Map<String, Value>);
}

impl<F> TokenCustomizer for F
where
    F: Fn(&TokenContext, &mut Map<String, Value>) + Send + Sync + 'static,
{
    fn customize(&self, context: &TokenContext, claims: &mut Map<String, Value>) {
        self(context, claims)
    }
}

/// `aud` when the grant carries no `resource` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AudienceFallback {
    /// Leave `aud` unset.
    #[default]
    Omit,
    /// Use the client id, for refresh token grants only.
    ClientId,
}

/// Sets `aud` to the `resource` parameter of the grant.
///
/// Authorization code and client credentials grants only bind access
/// tokens, so ID tokens keep the client id as audience. Refresh grants bind
/// every token they issue. Access tokens of OpenID Connect flows (`openid`
/// among the authorized scopes) are left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceAudienceCustomizer {
    fallback: AudienceFallback,
}

impl ResourceAudienceCustomizer {
    pub fn new(fallback: AudienceFallback) -> Self {
        Self { fallback }
    }

    /// The audience to stamp, if any.
    pub fn audience(&self, context: &TokenContext) -> Option<String> {
        if context.token_type == TokenType::AccessToken
            && context.authorized_scopes.contains(OPENID_SCOPE)
        {
            return None;
        }
        if context.token_type != TokenType::AccessToken
            && !matches!(context.grant, AuthorizationGrant::RefreshToken { .. })
        {
            return None;
        }
        match (context.grant.resource(), self.fallback, &context.grant) {
            (Some(resource), _, _) => Some(resource.to_string()),
            (None, AudienceFallback::ClientId, AuthorizationGrant::RefreshToken { .. }) => {
                Some(context.client_id.clone())
            }
            _ => None,
        }
    }
}

impl TokenCustomizer for ResourceAudienceCustomizer {
    fn customize(&self, context: &TokenContext, claims: &mut Map<String, Value>) {
        if let Some(audience) = self.audience(context) {
            debug!(
                grant_type = context.grant.grant_type(),
                client_id = %context.client_id,
                audience = %audience,
                "binding token audience"
            );
            claims.insert("aud".into(), Value::Array(vec![Value::String(audience)]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(resource: Option<&str>) -> BTreeMap<String, String> {
        resource
            .map(|r| BTreeMap::from([(RESOURCE_PARAMETER.to_string(), r.to_string())]))
            .unwrap_or_default()
    }

    fn context(grant: AuthorizationGrant, scopes: &[&str]) -> TokenContext {
        TokenContext {
            token_type: TokenType::AccessToken,
            grant,
            authorized_scopes: scopes.iter().map(|s| s.to_string()).collect(),
            client_id: "client-1".into(),
        }
    }

    fn customized(customizer: ResourceAudienceCustomizer, context: &TokenContext) -> Map<String, Value> {
        let mut claims = Map::new();
        customizer.customize(context, &mut claims);
        claims
    }

    #[test]
    fn every_grant_binds_its_resource() {
        let grants = [
            AuthorizationGrant::AuthorizationCode {
                authorization_request_parameters: params(Some("https://host/mcp")),
            },
            AuthorizationGrant::ClientCredentials {
                additional_parameters: params(Some("https://host/mcp")),
            },
            AuthorizationGrant::RefreshToken {
                additional_parameters: params(Some("https://host/mcp")),
            },
        ];
        for grant in grants {
            let claims = customized(ResourceAudienceCustomizer::default(), &context(grant, &["mcp"]));
            assert_eq!(claims["aud"], json!(["https://host/mcp"]));
        }
    }

    #[test]
    fn openid_access_tokens_are_untouched() {
        let context = context(
            AuthorizationGrant::AuthorizationCode {
                authorization_request_parameters: params(Some("https://host/mcp")),
            },
            &["openid", "mcp"],
        );
        assert!(customized(ResourceAudienceCustomizer::default(), &context).is_empty());
    }

    #[test]
    fn id_tokens_keep_their_audience_outside_refresh() {
        let grants = [
            AuthorizationGrant::AuthorizationCode {
                authorization_request_parameters: params(Some("https://host/mcp")),
            },
            AuthorizationGrant::ClientCredentials {
                additional_parameters: params(Some("https://host/mcp")),
            },
        ];
        for grant in grants {
            let context = TokenContext {
                token_type: TokenType::IdToken,
                ..context(grant, &["mcp"])
            };
            assert!(customized(ResourceAudienceCustomizer::default(), &context).is_empty());
        }

        let refresh = TokenContext {
            token_type: TokenType::IdToken,
            ..context(
                AuthorizationGrant::RefreshToken {
                    additional_parameters: params(Some("https://host/mcp")),
                },
                &["mcp"],
            )
        };
        assert_eq!(
            customized(ResourceAudienceCustomizer::default(), &refresh)["aud"],
            json!(["https://host/mcp"])
        );
    }

    #[test]
    fn missing_resource_omits_audience_by_default() {
        let context = context(
            AuthorizationGrant::RefreshToken {
                additional_parameters: params(None),
            },
            &[],
        );
        assert!(customized(ResourceAudienceCustomizer::default(), &context).is_empty());
    }

    #[test]
    fn client_id_fallback_applies_to_refresh_only() {
        let customizer = ResourceAudienceCustomizer::new(AudienceFallback::ClientId);
        let refresh = context(
            AuthorizationGrant::RefreshToken {
                additional_parameters: params(None),
            },
            &[],
        );
        assert_eq!(customizer.audience(&refresh).as_deref(), Some("client-1"));

        let client_credentials = context(
            AuthorizationGrant::ClientCredentials {
                additional_parameters: params(None),
            },
            &[],
        );
        assert_eq!(customizer.audience(&client_credentials), None);
    }

    #[test]
    fn closures_are_customizers() {
        let customizer = |_: &TokenContext, claims: &mut Map<String, Value>| {
            claims.insert("tenant".into(), json!("acme"));
        };
        let mut claims = Map::new();
        customizer.customize(
            &context(
                AuthorizationGrant::ClientCredentials {
                    additional_parameters: params(None),
                },
                &[],
            ),
            &mut claims,
        );
        assert_eq!(claims["tenant"], json!("acme"));
    }
}
