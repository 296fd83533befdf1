use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("gateway returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid upstream request body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}
