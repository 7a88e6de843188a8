//! `WWW-Authenticate` challenges for MCP resource servers.
//!
//! Every 401 emitted for a protected MCP endpoint carries the metadata URL of
//! the resource ([RFC 9728 §5.1](https://datatracker.ietf.org/doc/html/rfc9728#name-www-authenticate-response))
//! so that clients can start discovery from the challenge alone.

use http::HeaderValue;

const RESOURCE_METADATA: &str = "resource_metadata=";
const INVALID_TOKEN_URI: &str = "https://tools.ietf.org/html/rfc6750#section-3.1";

/// Baseline challenge produced by the authentication layer before the
/// resource metadata parameter is merged in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BearerChallenge {
    /// No credentials were presented.
    Missing,
    /// A credential was presented and rejected.
    InvalidToken(String),
    /// The request carried an ambiguous or malformed credential.
    InvalidRequest(String),
}

impl BearerChallenge {
    pub fn render(&self) -> String {
        match self {
            Self::Missing => "Bearer".to_string(),
            Self::InvalidToken(description) => format!(
                "Bearer error=\"invalid_token\", error_description=\"{}\", error_uri=\"{INVALID_TOKEN_URI}\"",
                description.replace('"', "'")
            ),
            Self::InvalidRequest(description) => format!(
                "Bearer error=\"invalid_request\", error_description=\"{}\"",
                description.replace('"', "'")
            ),
        }
    }
}

/// Merge `resource_metadata=<url>` into an existing challenge.
///
/// - no challenge: `Bearer resource_metadata=<url>`
/// - bare `Bearer`: the parameter is appended after a space
/// - an existing `resource_metadata` parameter is replaced in place
/// - any other challenge gets `, resource_metadata=<url>` appended
pub fn merge_resource_metadata(existing: Option<&str>, metadata_url: &str) -> String {
    let existing = existing.map(str::trim).unwrap_or_default();
    if existing.is_empty() {
        return format!("Bearer {RESOURCE_METADATA}{metadata_url}");
    }
    if existing.eq_ignore_ascii_case("bearer") {
        return format!("{existing} {RESOURCE_METADATA}{metadata_url}");
    }
    if let Some(start) = existing.find(RESOURCE_METADATA) {
        let value_start = start + RESOURCE_METADATA.len();
        let rest = &existing[value_start..];
        let value_len = if let Some(quoted) = rest.strip_prefix('"') {
            quoted.find('"').map(|end| end + 2).unwrap_or(rest.len())
        } else {
            rest.find([',', ' ']).unwrap_or(rest.len())
        };
        return format!(
            "{}{RESOURCE_METADATA}{metadata_url}{}",
            &existing[..start],
            &rest[value_len..]
        );
    }
    format!("{existing}, {RESOURCE_METADATA}{metadata_url}")
}

pub(crate) fn header_value(challenge: &str) -> HeaderValue {
    HeaderValue::from_str(challenge).unwrap_or_else(|_| HeaderValue::from_static("Bearer"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://host/ctx/.well-known/oauth-protected-resource/mcp";

    #[test]
    fn no_challenge() {
        assert_eq!(
            merge_resource_metadata(None, URL),
            format!("Bearer resource_metadata={URL}")
        );
        assert_eq!(
            merge_resource_metadata(Some(""), URL),
            format!("Bearer resource_metadata={URL}")
        );
    }

    #[test]
    fn bare_bearer() {
        assert_eq!(
            merge_resource_metadata(Some("Bearer"), URL),
            format!("Bearer resource_metadata={URL}")
        );
    }

    #[test]
    fn existing_parameter_is_replaced() {
        assert_eq!(
            merge_resource_metadata(
                Some("Bearer resource_metadata=\"https://old/x\", scope=\"a\""),
                URL
            ),
            format!("Bearer resource_metadata={URL}, scope=\"a\"")
        );
        assert_eq!(
            merge_resource_metadata(Some("Bearer realm=\"x\", resource_metadata=https://old"), URL),
            format!("Bearer realm=\"x\", resource_metadata={URL}")
        );
    }

    #[test]
    fn parameters_are_appended() {
        let invalid = BearerChallenge::InvalidToken("expired".into()).render();
        assert_eq!(
            merge_resource_metadata(Some(&invalid), URL),
            format!(
                "Bearer error=\"invalid_token\", error_description=\"expired\", error_uri=\"{INVALID_TOKEN_URI}\", resource_metadata={URL}"
            )
        );
    }
}
