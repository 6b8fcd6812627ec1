use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("platform unsupported: {0}")]
    PlatformUnsupported(String),

    #[error("http request failed: {0}")]
    HttpFailed(String),

    #[error("archive extraction invalid: {0}")]
    ExtractInvalid(String),

    #[error("archive extraction io error: {0}")]
    ExtractIo(String),

    #[error("git url invalid: {0}")]
    GitInvalidUrl(String),

    #[error("git tag invalid: {0}")]
    GitInvalidTag(String),

    #[error("git clone failed: {0}")]
    GitFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Core(#[from] potions_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
