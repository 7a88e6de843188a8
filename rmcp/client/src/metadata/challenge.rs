use regress::Regex;
use serde::{Deserialize, Serialize};

const RESOURCE_METADATA: &str = "resource_metadata";
const SCOPE: &str = "scope";

/// Parameters of a `WWW-Authenticate: Bearer ...` challenge relevant to
/// discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WwwAuthenticateParameters {
    pub resource_metadata: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl WwwAuthenticateParameters {
    /// Extract `resource_metadata` and `scope` from a challenge header.
    ///
    /// Returns `None` when the header carries no `resource_metadata`.
    pub fn parse(header: &str) -> Option<Self> {
        let resource_metadata = extract_parameter(RESOURCE_METADATA, header)?;
        Some(Self {
            resource_metadata,
            scope: extract_parameter(SCOPE, header),
        })
    }
}

/// Value of `name=...` in quoted or bare token form.
fn extract_parameter(name: &str, header: &str) -> Option<String> {
    let regex = Regex::new(&format!(r#"\b{name}=(?:"([^"]+)"|([^\s,]+))"#)).ok()?;
    let found = regex.find(header)?;
    found
        .group(1)
        .or_else(|| found.group(2))
        .map(|range| header[range].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_parameters() {
        let params = WwwAuthenticateParameters::parse(
            r#"Bearer error="invalid_token", resource_metadata="https://host/.well-known/oauth-protected-resource/mcp", scope="mcp:read mcp:write""#,
        )
        .unwrap();
        assert_eq!(
            params.resource_metadata,
            "https://host/.well-known/oauth-protected-resource/mcp"
        );
        assert_eq!(params.scope.as_deref(), Some("mcp:read mcp:write"));
    }

    #[test]
    fn bare_parameters() {
        let params = WwwAuthenticateParameters::parse(
            "Bearer resource_metadata=https://host/ctx/.well-known/oauth-protected-resource/mcp, scope=mcp",
        )
        .unwrap();
        assert_eq!(
            params.resource_metadata,
            "https://host/ctx/.well-known/oauth-protected-resource/mcp"
        );
        assert_eq!(params.scope.as_deref(), Some("mcp"));
    }

    #[test]
    fn missing_resource_metadata() {
        assert!(WwwAuthenticateParameters::parse(r#"Bearer realm="example""#).is_none());
        assert!(WwwAuthenticateParameters::parse("").is_none());
    }

    #[test]
    fn scope_does_not_match_inside_other_names() {
        let params = WwwAuthenticateParameters::parse(
            r#"Bearer resource_metadata="https://host/prm", insufficient_scope="x""#,
        )
        .unwrap();
        assert_eq!(params.scope, None);
    }
}
