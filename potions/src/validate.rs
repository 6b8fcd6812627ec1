//! Platform-coverage validator (§4.I, §3 `PlatformValidation`).

use std::collections::BTreeSet;
use std::path::Path;

use potions_core::{canonical_platform, Recipe};
use serde::Serialize;

const SUPPORTED_PLATFORMS: [&str; 4] = ["linux-amd64", "linux-arm64", "darwin-x86_64", "darwin-arm64"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationStatus {
    Ready,
    NoArtifacts,
    PlatformMismatch,
    UnexpectedPlatforms,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlatformValidation {
    pub status: ValidationStatus,
    pub expected: BTreeSet<String>,
    pub available: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    pub unexpected: BTreeSet<String>,
}

impl PlatformValidation {
    pub fn is_ready(&self) -> bool {
        self.status == ValidationStatus::Ready
    }
}

fn expected_platforms(recipe: &Recipe) -> BTreeSet<String> {
    recipe
        .download
        .platforms
        .keys()
        .map(|p| canonical_platform(p).to_string())
        .filter(|p| SUPPORTED_PLATFORMS.contains(&p.as_str()))
        .collect()
}

/// Parses a platform id out of a packaged-archive basename matching
/// `<name>-<versionNoV>-<platform>.tar.gz`, discarding sidecar suffixes.
fn parse_available_platform(basename: &str, name: &str, version_no_v: &str) -> Option<String> {
    let stem = basename.strip_suffix(".tar.gz")?;
    let prefix = format!("{name}-{version_no_v}-");
    let platform = stem.strip_prefix(&prefix)?;
    if platform.is_empty() {
        return None;
    }
    Some(platform.to_string())
}

pub fn validate(recipe: &Recipe, name: &str, version: &str, artifact_paths: &[impl AsRef<Path>]) -> PlatformValidation {
    let version_no_v = version.strip_prefix('v').unwrap_or(version);
    let expected = expected_platforms(recipe);

    let available: BTreeSet<String> = artifact_paths
        .iter()
        .filter_map(|p| {
            let basename = p.as_ref().file_name()?.to_str()?;
            if basename.ends_with(".sha256")
                || basename.ends_with(".sha512")
                || basename.ends_with(".sbom.json")
                || basename.ends_with(".provenance.json")
            {
                return None;
            }
            parse_available_platform(basename, name, version_no_v)
        })
        .collect();

    let missing: BTreeSet<String> = expected.difference(&available).cloned().collect();
    let unexpected: BTreeSet<String> = available.difference(&expected).cloned().collect();

    let status = if available.is_empty() {
        ValidationStatus::NoArtifacts
    } else if !unexpected.is_empty() {
        ValidationStatus::UnexpectedPlatforms
    } else if !missing.is_empty() {
        ValidationStatus::PlatformMismatch
    } else {
        ValidationStatus::Ready
    };

    PlatformValidation {
        status,
        expected,
        available,
        missing,
        unexpected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use potions_core::{DownloadMethod, DownloadSpec, PlatformConfig};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn recipe_with_platforms(ids: &[&str]) -> Recipe {
        let mut platforms = HashMap::new();
        for id in ids {
            platforms.insert(
                id.to_string(),
                PlatformConfig {
                    os: Some("linux".to_string()),
                    arch: Some("amd64".to_string()),
                    suffix: None,
                    custom: HashMap::new(),
                },
            );
        }
        Recipe {
            name: "kubectl".to_string(),
            description: String::new(),
            build_type: Default::default(),
            version: potions_core::VersionSpec {
                source: potions_core::VersionSource::Static("1.0.0".to_string()),
                extract_pattern: None,
                exclude_patterns: None,
                cleanup: None,
            },
            download: DownloadSpec {
                method: DownloadMethod::Http,
                download_url: Some("https://example.test/{version}".to_string()),
                platforms,
                git_url: None,
                git_tag_prefix: String::new(),
            },
            security: Default::default(),
            configure: Default::default(),
            build: Default::default(),
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn s5_platform_mismatch_scenario() {
        let recipe = recipe_with_platforms(&["linux-amd64", "linux-arm64", "darwin-x86_64", "darwin-arm64"]);
        let artifacts = vec![PathBuf::from("dist/kubectl-1.0.0-linux-amd64.tar.gz")];
        let validation = validate(&recipe, "kubectl", "1.0.0", &artifacts);
        assert_eq!(validation.status, ValidationStatus::PlatformMismatch);
        assert_eq!(validation.missing.len(), 3);
        assert!(!validation.is_ready());
    }

    #[test]
    fn ready_iff_expected_equals_available() {
        let recipe = recipe_with_platforms(&["linux-amd64"]);
        let artifacts = vec![PathBuf::from("dist/kubectl-1.0.0-linux-amd64.tar.gz")];
        let validation = validate(&recipe, "kubectl", "1.0.0", &artifacts);
        assert_eq!(validation.status, ValidationStatus::Ready);
        assert!(validation.is_ready());
    }

    #[test]
    fn no_artifacts_when_available_is_empty() {
        let recipe = recipe_with_platforms(&["linux-amd64"]);
        let artifacts: Vec<PathBuf> = Vec::new();
        let validation = validate(&recipe, "kubectl", "1.0.0", &artifacts);
        assert_eq!(validation.status, ValidationStatus::NoArtifacts);
    }

    #[test]
    fn sidecars_are_discarded_from_available_set() {
        let recipe = recipe_with_platforms(&["linux-amd64"]);
        let artifacts = vec![
            PathBuf::from("dist/kubectl-1.0.0-linux-amd64.tar.gz"),
            PathBuf::from("dist/kubectl-1.0.0-linux-amd64.tar.gz.sha256"),
            PathBuf::from("dist/kubectl-1.0.0-linux-amd64.tar.gz.sbom.json"),
        ];
        let validation = validate(&recipe, "kubectl", "1.0.0", &artifacts);
        assert_eq!(validation.available.len(), 1);
        assert!(validation.is_ready());
    }
}
