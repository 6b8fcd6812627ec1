use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("build script invalid: {0}")]
    ScriptInvalid(String),

    #[error("build script failed (exit code {code:?}): {message}")]
    ScriptFailed { code: Option<i32>, message: String },

    #[error("build script timed out after {0:?}")]
    ScriptTimeout(std::time::Duration),

    #[error("package io error: {0}")]
    PackageIo(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
