//! Resource identifiers rendered from the inbound request.
//!
//! The canonical identifier of a protected MCP endpoint is an absolute URL
//! built from the scheme, host and port the client used to reach the server,
//! the deployment context path, and the configured resource path:
//!
//! ```text
//! {scheme}://{host}[:{port}]{contextPath}{resourcePath}
//! ```
//!
//! The same rendering is stamped into the `aud` claim by the authorization
//! server, published in the metadata document, and compared by the audience
//! validator, so it never carries a query string, fragment or trailing slash.

use crate::error::ConfigError;
use http::{request::Parts, uri::Authority};

use super::metadata::WELL_KNOWN_PROTECTED_RESOURCE;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PORT: &str = "x-forwarded-port";
const X_FORWARDED_PREFIX: &str = "x-forwarded-prefix";

/// Path prefix under which the application is deployed.
///
/// Insert it as a request extension (for example with
/// `axum::Extension(ContextPath::new("/ctx"))`) when the MCP server is mounted
/// below the root and no proxy sends `X-Forwarded-Prefix`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextPath(String);

impl ContextPath {
    pub fn new(path: impl AsRef<str>) -> Self {
        let trimmed = path.as_ref().trim().trim_end_matches('/');
        if trimmed.is_empty() {
            Self(String::new())
        } else if trimmed.starts_with('/') {
            Self(trimmed.to_string())
        } else {
            Self(format!("/{trimmed}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

/// Scheme, host, port and context path of the current inbound request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestOrigin {
    scheme: String,
    host: String,
    port: Option<u16>,
    context_path: ContextPath,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
            host: host.into(),
            port,
            context_path: ContextPath::default(),
        }
    }

    pub fn with_context_path(mut self, context_path: ContextPath) -> Self {
        self.context_path = context_path;
        self
    }

    /// Derive the origin from request parts.
    ///
    /// Forwarded headers win over the `Host` header, which wins over the
    /// request URI's authority. The context path comes from a [`ContextPath`]
    /// extension, then `X-Forwarded-Prefix`.
    pub fn from_parts(parts: &Parts) -> Self {
        let scheme = first_header_value(parts, X_FORWARDED_PROTO)
            .or_else(|| parts.uri.scheme_str())
            .unwrap_or("http")
            .to_string();

        let authority = first_header_value(parts, X_FORWARDED_HOST)
            .or_else(|| first_header_value(parts, http::header::HOST.as_str()))
            .and_then(|value| value.parse::<Authority>().ok())
            .or_else(|| parts.uri.authority().cloned());

        let (host, mut port) = match authority {
            Some(authority) => (authority.host().to_string(), authority.port_u16()),
            None => ("localhost".to_string(), None),
        };
        if let Some(forwarded) =
            first_header_value(parts, X_FORWARDED_PORT).and_then(|p| p.parse::<u16>().ok())
        {
            port = Some(forwarded);
        }

        let context_path = parts
            .extensions
            .get::<ContextPath>()
            .cloned()
            .or_else(|| first_header_value(parts, X_FORWARDED_PREFIX).map(ContextPath::new))
            .unwrap_or_default();

        Self::new(scheme, host, port).with_context_path(context_path)
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn context_path(&self) -> &ContextPath {
        &self.context_path
    }

    /// `{scheme}://{host}[:{port}]`, omitting the scheme's default port.
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) if !is_default_port(&self.scheme, port) => {
                format!("{}://{}:{}", self.scheme, self.host, port)
            }
            _ => format!("{}://{}", self.scheme, self.host),
        }
    }

    /// Absolute URL for `path` below the context path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url(), self.context_path.as_str(), path)
    }
}

fn is_default_port(scheme: &str, port: u16) -> bool {
    matches!((scheme, port), ("http", 80) | ("https", 443))
}

fn first_header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Identifies a protected resource by its path below the context path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceIdentifier {
    path: String,
}

impl ResourceIdentifier {
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        let path = path.as_ref().trim();
        if path.is_empty() {
            return Err(ConfigError::Blank("path"));
        }
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let path = match path.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };
        Ok(Self { path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// The canonical resource identifier for the given request origin.
    pub fn resource(&self, origin: &RequestOrigin) -> String {
        origin.url_for(&self.path)
    }

    /// URL of this resource's metadata document, in the RFC 9728
    /// resource-aware form `/.well-known/oauth-protected-resource{path}`.
    pub fn metadata_url(&self, origin: &RequestOrigin) -> String {
        origin.url_for(&format!("{WELL_KNOWN_PROTECTED_RESOURCE}{}", self.path))
    }
}
