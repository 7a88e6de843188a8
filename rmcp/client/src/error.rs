use thiserror::Error;

/// Errors raised by MCP client security operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Protected resource metadata could not be discovered or was rejected.
    #[error("{0}")]
    Discovery(String),

    /// Dynamic client registration failed.
    #[error("{0}")]
    Registration(String),

    /// Invalid client configuration or registration request.
    #[error("{0}")]
    Config(String),

    /// The user must complete an authorization code flow first.
    #[error("authorization required, redirect the user agent to {url}")]
    AuthorizationRequired { url: String },

    /// No client registration exists for the given id.
    #[error("no client registration found for id [{0}]")]
    UnknownRegistration(String),

    /// The token endpoint refused the request or returned an unusable token.
    #[error("{0}")]
    Token(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
