use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The token could not be signed.
    #[error("failed to encode token: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
