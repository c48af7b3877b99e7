use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("api request failed: {0}")]
    Api(String),
    #[error("expected exactly one review request for branch {0}")]
    AmbiguousReviewRequest(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("core error: {0}")]
    Core(#[from] accord_core::CoreError),
    #[error("malformed response: {0}")]
    Decode(String),
}
