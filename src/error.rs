use thiserror::Error;

/// Transport-level failure on any fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encode failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("storage task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("malformed response body: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PipelineError {
    pub fn is_parse(&self) -> bool {
        matches!(self, PipelineError::Parse(_))
    }
}
