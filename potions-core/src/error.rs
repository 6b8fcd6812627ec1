use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("recipe invalid: {0}")]
    RecipeInvalid(String),

    #[error("recipe not found: {0}")]
    RecipeNotFound(String),

    #[error("version source missing")]
    VersionSourceMissing,

    #[error("version source unsupported: {0}")]
    VersionSourceUnsupported(String),

    #[error("failed to fetch version: {0}")]
    VersionFetchFailed(String),

    #[error("version pattern did not match")]
    VersionNoMatch,

    #[error("all version candidates were filtered out")]
    VersionFilteredOut,

    #[error("invalid cleanup expression: {0}")]
    VersionInvalidCleanup(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("glob error: {0}")]
    Glob(#[from] glob::PatternError),
}

pub type Result<T> = std::result::Result<T, Error>;
