use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] rmcp_oauth_client::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
