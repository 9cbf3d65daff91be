use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("remote error: {0}")]
    Remote(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ClientError>;
