use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to {step}: {source}")]
    Step { step: &'static str, source: String },

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Core(#[from] potions_core::Error),

    #[error(transparent)]
    Fetch(#[from] potions_fetch::Error),

    #[error(transparent)]
    Build(#[from] potions_build::Error),

    #[error(transparent)]
    Security(#[from] potions_security::Error),

    #[error(transparent)]
    Release(#[from] potions_release::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Wraps any displayable error with a short step-naming prefix, per the
/// pipeline's "failed to X: <inner>" propagation convention.
pub trait StepContext<T> {
    fn step(self, step: &'static str) -> Result<T>;
}

impl<T, E: std::fmt::Display> StepContext<T> for std::result::Result<T, E> {
    fn step(self, step: &'static str) -> Result<T> {
        self.map_err(|e| Error::Step {
            step,
            source: e.to_string(),
        })
    }
}
