use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Network request failed: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid upstream request: {0}")]
    InvalidRequest(String),
}
