use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("release not found: {0}")]
    ReleaseNotFound(String),

    #[error("rate limit exhausted, resets at {reset}")]
    RateLimitExhausted { reset: String },

    #[error("release request failed after {attempts} attempts: {message}")]
    RequestFailed { attempts: u32, message: String },

    #[error("asset upload failed: {0}")]
    UploadFailed(String),

    #[error("invalid upload url: {0}")]
    InvalidUploadUrl(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
