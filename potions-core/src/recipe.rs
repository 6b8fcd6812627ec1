use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// `linux-x86_64` and `linux-amd64` name the same platform; lookups must
/// accept either spelling.
pub fn canonical_platform(platform: &str) -> &str {
    match platform {
        "linux-x86_64" => "linux-amd64",
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildType {
    Binary,
    Source,
}

impl Default for BuildType {
    fn default() -> Self {
        BuildType::Binary
    }
}

/// The `version.source` tagged union, modeled as a sum type rather than
/// sniffed by prefix at every call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    Url(String),
    GithubRelease { owner: String, repo: String },
    GithubTag { owner: String, repo: String },
    Static(String),
}

impl VersionSource {
    fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::VersionSourceMissing);
        }
        if let Some(rest) = raw.strip_prefix("url:") {
            return Ok(VersionSource::Url(rest.to_string()));
        }
        if let Some(rest) = raw.strip_prefix("github-release:") {
            let (owner, repo) = split_owner_repo(rest)?;
            return Ok(VersionSource::GithubRelease { owner, repo });
        }
        if let Some(rest) = raw.strip_prefix("github-tag:") {
            let (owner, repo) = split_owner_repo(rest)?;
            return Ok(VersionSource::GithubTag { owner, repo });
        }
        if let Some(rest) = raw.strip_prefix("static:") {
            return Ok(VersionSource::Static(rest.to_string()));
        }
        Err(Error::VersionSourceUnsupported(raw.to_string()))
    }
}

fn split_owner_repo(rest: &str) -> Result<(String, String)> {
    rest.split_once('/')
        .map(|(o, r)| (o.to_string(), r.to_string()))
        .ok_or_else(|| Error::VersionSourceUnsupported(rest.to_string()))
}

impl<'de> Deserialize<'de> for VersionSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        VersionSource::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VersionSpec {
    pub source: VersionSource,
    #[serde(rename = "extractPattern", default)]
    pub extract_pattern: Option<String>,
    #[serde(rename = "excludePatterns", default)]
    pub exclude_patterns: Option<String>,
    #[serde(default)]
    pub cleanup: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMethod {
    Http,
    Git,
}

impl Default for DownloadMethod {
    fn default() -> Self {
        DownloadMethod::Http
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
    /// Unknown keys inside a platform block, preserved for URL templating.
    #[serde(flatten)]
    pub custom: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadSpec {
    #[serde(default)]
    pub method: DownloadMethod,
    #[serde(rename = "downloadURL", default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub platforms: HashMap<String, PlatformConfig>,
    #[serde(rename = "gitURL", default)]
    pub git_url: Option<String>,
    #[serde(rename = "gitTagPrefix", default)]
    pub git_tag_prefix: String,
}

impl DownloadSpec {
    /// A recipe is buildable on `platform` iff `platforms[platform]` exists,
    /// accounting for the `linux-x86_64 <-> linux-amd64` alias.
    pub fn platform(&self, platform: &str) -> Option<&PlatformConfig> {
        self.platforms.get(canonical_platform(platform))
    }

    pub fn supports_platform(&self, platform: &str) -> bool {
        self.platform(platform).is_some()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecuritySpec {
    #[serde(rename = "verifySignature", default)]
    pub verify_signature: bool,
    #[serde(rename = "scanVulnerabilities", default)]
    pub scan_vulnerabilities: bool,
    #[serde(rename = "gpgKeyIDs", default)]
    pub gpg_key_ids: Vec<String>,
    #[serde(rename = "gpgKeysURL", default)]
    pub gpg_keys_url: Option<String>,
    #[serde(rename = "signatureURL", default)]
    pub signature_url: Option<String>,
}

fn default_timeout_minutes() -> u64 {
    30
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildStep {
    #[serde(default)]
    pub script: Option<String>,
    #[serde(rename = "customBuild", default)]
    pub custom_build: Option<String>,
    #[serde(rename = "customInstall", default)]
    pub custom_install: Option<String>,
    #[serde(rename = "timeoutMinutes", default = "default_timeout_minutes")]
    pub timeout_minutes: u64,
    #[serde(rename = "outOfTree", default)]
    pub out_of_tree: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "buildType", default)]
    pub build_type: BuildType,
    pub version: VersionSpec,
    #[serde(default)]
    pub download: DownloadSpec,
    #[serde(default)]
    pub security: SecuritySpec,
    #[serde(default)]
    pub configure: BuildStep,
    #[serde(default)]
    pub build: BuildStep,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Recipe {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let recipe: Recipe = serde_yml::from_str(contents)?;
        if recipe.name.trim().is_empty() {
            return Err(Error::RecipeInvalid("name is empty".into()));
        }
        Ok(recipe)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Recipe::from_yaml(&contents).map_err(|e| match e {
            Error::RecipeInvalid(msg) => {
                Error::RecipeInvalid(format!("{}: {}", path.display(), msg))
            }
            Error::Yaml(inner) => {
                Error::RecipeInvalid(format!("{}: {}", path.display(), inner))
            }
            other => other,
        })
    }
}

/// Read-only, keyed collection of recipes discovered from a directory of
/// YAML documents.
#[derive(Debug, Default)]
pub struct RecipeStore {
    recipes: HashMap<String, Recipe>,
}

impl RecipeStore {
    /// Recursively globs `dir` for `*.yaml`/`*.yml` documents. A recipe that
    /// fails to parse is logged and skipped rather than aborting the scan.
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut recipes = HashMap::new();
        for pattern in ["**/*.yaml", "**/*.yml"] {
            let full_pattern = dir.join(pattern);
            let full_pattern = full_pattern.to_string_lossy().to_string();
            for entry in glob::glob(&full_pattern)? {
                let path = match entry {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!("failed to read directory entry: {e}");
                        continue;
                    }
                };
                match Recipe::from_file(&path) {
                    Ok(recipe) => {
                        recipes.insert(recipe.name.clone(), recipe);
                    }
                    Err(e) => {
                        tracing::warn!("skipping unparsable recipe {}: {e}", path.display());
                    }
                }
            }
        }
        Ok(RecipeStore { recipes })
    }

    pub fn get(&self, name: &str) -> Result<&Recipe> {
        self.recipes
            .get(name)
            .ok_or_else(|| Error::RecipeNotFound(name.to_string()))
    }

    pub fn list(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    pub fn by_platform<'a>(&'a self, platform: &'a str) -> impl Iterator<Item = &'a Recipe> {
        self.recipes
            .values()
            .filter(move |r| r.download.supports_platform(platform))
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
name: kubectl
description: Kubernetes CLI
version:
  source: "static:v1.28.0"
download:
  downloadURL: "https://example.test/{version}/{os}/{arch}/kubectl"
  platforms:
    linux-amd64:
      os: linux
      arch: amd64
"#
    }

    #[test]
    fn parses_minimal_recipe() {
        let recipe = Recipe::from_yaml(minimal_yaml()).unwrap();
        assert_eq!(recipe.name, "kubectl");
        assert_eq!(recipe.version.source, VersionSource::Static("v1.28.0".into()));
        assert!(recipe.download.supports_platform("linux-amd64"));
        assert!(recipe.download.supports_platform("linux-x86_64"));
        assert!(!recipe.download.supports_platform("darwin-arm64"));
    }

    #[test]
    fn rejects_empty_name() {
        let yaml = r#"
name: ""
version:
  source: "static:v1.0.0"
"#;
        assert!(matches!(
            Recipe::from_yaml(yaml),
            Err(Error::RecipeInvalid(_))
        ));
    }

    #[test]
    fn preserves_custom_platform_keys() {
        let yaml = r#"
name: tool
version:
  source: "static:v1.0.0"
download:
  downloadURL: "https://example.test/{version}/{flavor}"
  platforms:
    linux-amd64:
      os: linux
      arch: amd64
      flavor: musl
"#;
        let recipe = Recipe::from_yaml(yaml).unwrap();
        let platform = recipe.download.platform("linux-amd64").unwrap();
        assert_eq!(platform.custom.get("flavor"), Some(&"musl".to_string()));
    }

    #[test]
    fn store_scan_skips_invalid_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.yaml"), minimal_yaml()).unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "not: [valid yaml structure for recipe").unwrap();

        let store = RecipeStore::scan(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("kubectl").unwrap().name, "kubectl");
        assert!(store.get("missing").is_err());
    }
}
