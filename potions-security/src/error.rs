use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no signing keys available")]
    SigNoKeys,

    #[error("signature verification failed: {0}")]
    SigFailed(String),

    #[error("build blocked by security scan: {0}")]
    ScanBlocked(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary parse error: {0}")]
    BinaryParse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
