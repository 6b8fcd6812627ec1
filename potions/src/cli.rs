//! Command-line surface: `build` for a single `(recipe, platform)`, `batch`
//! for the quota-aware multi-package run (§4.J, §4.K).

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum LogLevel {
    #[default]
    Info,
    Debug,
    Trace,
}

/// potions - package-binary build and release pipeline
#[derive(Parser)]
#[command(name = "potions")]
#[command(about = "Build, package, and release prebuilt binaries from recipes", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build one package for one platform
    Build(BuildArgs),
    /// Build and publish a batch of packages under rate-limit constraints
    Batch(BatchArgs),
}

#[derive(Parser)]
pub struct BuildArgs {
    /// Directory containing recipe YAML files
    #[arg(long, default_value = "recipes")]
    pub recipes_dir: PathBuf,

    /// Recipe name to build
    #[arg(required = true)]
    pub name: String,

    /// Version to build; empty or "latest" resolves via the recipe's version source
    #[arg(long, default_value = "")]
    pub version: String,

    /// Target platform id (linux-amd64, linux-arm64, darwin-x86_64, darwin-arm64)
    #[arg(long)]
    pub platform: String,

    /// Output directory for build artifacts
    #[arg(short, long, default_value = "dist")]
    pub outdir: PathBuf,

    /// Run-level toggle for OSV vulnerability scanning; ANDed with the recipe's own flag
    #[arg(long, default_value = "true")]
    pub scan: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Parser)]
pub struct BatchArgs {
    /// Directory containing recipe YAML files
    #[arg(long, default_value = "recipes")]
    pub recipes_dir: PathBuf,

    /// Recipe names to consider for this run; empty builds every recipe found
    pub names: Vec<String>,

    /// Output directory for build artifacts
    #[arg(short, long, default_value = "dist")]
    pub outdir: PathBuf,

    /// Directory for report files and the JSON summary
    #[arg(long, default_value = "reports")]
    pub report_dir: PathBuf,

    /// Maximum number of packages to process this run, before quota-based shrinking
    #[arg(long, default_value = "100")]
    pub max_packages: usize,

    /// Per-package deadline in seconds before it's classified as a timeout
    #[arg(long, default_value = "1200")]
    pub package_deadline_secs: u64,

    /// Code-hosting owner/org to publish releases under
    #[arg(long, env = "POTIONS_RELEASE_OWNER")]
    pub release_owner: Option<String>,

    /// Code-hosting repository to publish releases into
    #[arg(long, env = "POTIONS_RELEASE_REPO")]
    pub release_repo: Option<String>,

    /// Bearer token for the release-host API
    #[arg(long, env = "POTIONS_RELEASE_TOKEN")]
    pub release_token: Option<String>,

    /// Run-level toggle for OSV vulnerability scanning; ANDed with each recipe's own flag
    #[arg(long, default_value = "true")]
    pub scan: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,
}
