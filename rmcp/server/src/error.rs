use thiserror::Error;

/// Invalid server configuration.
///
/// Raised while building configuration values, metadata documents or
/// resource identifiers. These are programmer errors and never depend on the
/// inbound request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value was blank.
    #[error("{0} cannot be empty")]
    Blank(&'static str),

    /// A value that must be a URL could not be parsed.
    #[error("{field} must be a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    /// A list-valued metadata field was present but empty.
    #[error("{0} cannot be empty")]
    EmptyList(&'static str),

    /// A custom claim collides with a standard metadata field.
    #[error("claim {0} is reserved, use the dedicated setter")]
    ReservedClaim(String),

    /// A value failed a domain rule.
    #[error("{0}")]
    Invalid(String),

    /// The configured header name is not a valid HTTP header name.
    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),
}
