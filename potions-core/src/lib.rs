//! Recipe model, parser, and version resolver.

pub mod error;
pub mod recipe;
pub mod version;

pub use error::{Error, Result};
pub use recipe::{
    BuildStep, BuildType, DownloadMethod, DownloadSpec, PlatformConfig, Recipe, RecipeStore,
    SecuritySpec, VersionSource, VersionSpec, canonical_platform,
};
pub use version::resolve as resolve_version;
