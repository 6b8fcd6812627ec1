//! Batch orchestrator (§4.K): quota-aware multi-package, multi-platform runs.
//!
//! Dataflow per §2: for each candidate package this builds every expected
//! platform (§4.J), validates coverage (§4.I), and — when coverage is
//! `ready` — publishes a release (§4.H).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use potions_core::RecipeStore;
use potions_release::{format_tag, generate_release_body, CreateReleaseParams, ReleaseClient};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::adapters::SystemClock;
use crate::orchestrator;
use crate::report::{write_json_summary, write_reports, JsonSummary};
use crate::validate::{self, ValidationStatus};

const SAFETY_MARGIN: u64 = 200;
const PER_RELEASE_COST: u64 = 8;
const MIN_BATCH_SIZE: usize = 25;
const DEFAULT_PACKAGE_DEADLINE: Duration = Duration::from_secs(20 * 60);
const SUPPORTED_PLATFORMS: [&str; 4] = ["linux-amd64", "linux-arm64", "darwin-x86_64", "darwin-arm64"];

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome")]
pub enum PackageOutcome {
    Success {
        name: String,
        version: String,
        platform: String,
    },
    Timeout {
        name: String,
        version: String,
        platform: String,
    },
    Error {
        name: String,
        version: String,
        platform: String,
        message: Option<String>,
    },
}

/// `min(configuredMax, max(25, floor((remainingQuota - safetyMargin) / perReleaseCost)))`.
pub fn batch_size(configured_max: usize, remaining_quota: u64) -> usize {
    let budget = remaining_quota.saturating_sub(SAFETY_MARGIN);
    let quota_based = (budget / PER_RELEASE_COST) as usize;
    configured_max.min(quota_based.max(MIN_BATCH_SIZE))
}

pub struct PublishTarget<'a> {
    pub client: &'a ReleaseClient,
    pub owner: String,
    pub repo: String,
}

pub struct BatchRequest<'a> {
    pub store: &'a RecipeStore,
    pub names: Vec<String>,
    pub out_dir: &'a Path,
    pub report_dir: &'a Path,
    pub configured_max: usize,
    pub package_deadline: Option<Duration>,
    pub publish: Option<PublishTarget<'a>>,
    pub scan_enabled: bool,
}

pub struct BatchSummary {
    pub outcomes: Vec<PackageOutcome>,
    pub successful_builds: usize,
    pub failed_builds: usize,
    pub timeout_builds: usize,
}

impl BatchSummary {
    /// §4.K: `successfulBuilds == 0 && failedBuilds > 0` is fatal overall.
    pub fn is_fatal(&self) -> bool {
        self.successful_builds == 0 && self.failed_builds > 0
    }
}

/// Publishes a release once coverage is `ready`, uploading the packaged
/// tarball and its sidecars for every built platform. Asset upload failures
/// are logged individually; the publish step as a whole succeeds if at
/// least one asset made it up (§4.H).
async fn publish_release(
    target: &PublishTarget<'_>,
    name: &str,
    version: &str,
    artifact_paths: &[std::path::PathBuf],
) -> potions_release::Result<()> {
    let tag = format_tag(name, version);

    let existing = target.client.get_release(&target.owner, &target.repo, &tag).await;
    let release = match existing {
        Ok(release) => release,
        Err(potions_release::Error::ReleaseNotFound(_)) => {
            let basenames: Vec<String> = artifact_paths
                .iter()
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect();
            let params = CreateReleaseParams {
                tag: tag.clone(),
                name: tag.clone(),
                body: generate_release_body(&basenames),
                draft: false,
                prerelease: false,
            };
            target.client.create_release(&target.owner, &target.repo, &params).await?
        }
        Err(e) => return Err(e),
    };

    let mut uploaded = 0;
    for path in artifact_paths {
        let Some(filename) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let content = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("skipping asset {filename}: could not read file: {e}");
                continue;
            }
        };
        match target.client.upload_asset(&release.upload_url, &filename, content).await {
            Ok(_) => uploaded += 1,
            Err(e) => tracing::warn!("failed to upload asset {filename}: {e}"),
        }
    }

    if uploaded == 0 {
        return Err(potions_release::Error::UploadFailed(format!("no assets uploaded for {tag}")));
    }
    Ok(())
}

/// All platform ids this recipe declares, intersected with the four ids
/// the system supports (§4.I).
fn recipe_platforms(recipe: &potions_core::Recipe) -> Vec<String> {
    recipe
        .download
        .platforms
        .keys()
        .map(|p| potions_core::canonical_platform(p).to_string())
        .filter(|p| SUPPORTED_PLATFORMS.contains(&p.as_str()))
        .collect()
}

pub async fn run_batch(req: BatchRequest<'_>, cancel: &CancellationToken) -> std::io::Result<BatchSummary> {
    let start = Instant::now();
    let deadline = req.package_deadline.unwrap_or(DEFAULT_PACKAGE_DEADLINE);

    let mut existing_tags: std::collections::HashSet<String> = std::collections::HashSet::new();
    if let Some(target) = &req.publish {
        match target.client.list_releases(&target.owner, &target.repo).await {
            Ok(releases) => existing_tags.extend(releases.into_iter().map(|r| r.tag_name)),
            Err(e) => tracing::warn!("could not fetch existing releases, proceeding without dedup: {e}"),
        }
    }

    let remaining_quota = req
        .publish
        .as_ref()
        .and_then(|t| t.client.last_rate_limit())
        .map(|rl| rl.remaining)
        .unwrap_or(u64::MAX);
    let effective_count = batch_size(req.configured_max, remaining_quota).min(req.names.len());

    let mut outcomes = Vec::new();
    let mut platform_breakdown: BTreeMap<String, usize> = BTreeMap::new();
    let clock = SystemClock;

    for name in req.names.iter().take(effective_count) {
        if cancel.is_cancelled() {
            break;
        }

        let recipe = match req.store.get(name) {
            Ok(r) => r.clone(),
            Err(e) => {
                tracing::warn!("skipping {name}: {e}");
                continue;
            }
        };
        let recipe_for_resolve = recipe.clone();
        let resolved = tokio::task::spawn_blocking(move || potions_core::resolve_version(&recipe_for_resolve))
            .await
            .expect("version resolution task panicked");
        let version = match resolved {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("skipping {name}: could not resolve version: {e}");
                continue;
            }
        };
        let tag = format_tag(name, &version);
        if existing_tags.contains(&tag) {
            tracing::info!("skipping {name} v{version}: release {tag} already exists");
            continue;
        }

        let mut artifact_paths = Vec::new();
        let mut package_failed = false;
        for platform in recipe_platforms(&recipe) {
            if cancel.is_cancelled() {
                break;
            }

            let run = orchestrator::run_build(
                req.store,
                name,
                &version,
                &platform,
                req.out_dir,
                cancel,
                &clock,
                req.scan_enabled,
            );
            let outcome = match tokio::time::timeout(deadline, run).await {
                Ok(Ok(result)) => {
                    *platform_breakdown.entry(platform.clone()).or_insert(0) += 1;
                    if let Some(path) = &result.artifact_path {
                        artifact_paths.push(path.clone());
                    }
                    PackageOutcome::Success {
                        name: name.clone(),
                        version: version.clone(),
                        platform,
                    }
                }
                Ok(Err(e)) => {
                    package_failed = true;
                    PackageOutcome::Error {
                        name: name.clone(),
                        version: version.clone(),
                        platform,
                        message: Some(e.to_string()),
                    }
                }
                Err(_) => {
                    package_failed = true;
                    PackageOutcome::Timeout {
                        name: name.clone(),
                        version: version.clone(),
                        platform,
                    }
                }
            };
            outcomes.push(outcome);
        }

        if package_failed || artifact_paths.is_empty() {
            continue;
        }

        let validation = validate::validate(&recipe, name, &version, &artifact_paths);
        if validation.status != ValidationStatus::Ready {
            tracing::warn!("{name} v{version}: platform coverage not ready ({:?}), skipping publish", validation.status);
            continue;
        }

        if let Some(target) = &req.publish {
            if let Err(e) = publish_release(target, name, &version, &artifact_paths).await {
                tracing::warn!("failed to publish release for {name} v{version}: {e}");
            }
        }
    }

    let successful_builds = outcomes.iter().filter(|o| matches!(o, PackageOutcome::Success { .. })).count();
    let failed_builds = outcomes.iter().filter(|o| matches!(o, PackageOutcome::Error { .. })).count();
    let timeout_builds = outcomes.iter().filter(|o| matches!(o, PackageOutcome::Timeout { .. })).count();

    write_reports(req.report_dir, &outcomes)?;

    let summary = JsonSummary {
        total_packages: outcomes.len(),
        successful_builds,
        failed_builds,
        timeout_builds,
        success_details: outcomes
            .iter()
            .filter_map(|o| match o {
                PackageOutcome::Success { name, version, .. } => Some(format!("{name}:{version}")),
                _ => None,
            })
            .collect(),
        failure_details: outcomes
            .iter()
            .filter_map(|o| match o {
                PackageOutcome::Error { name, version, platform, message } => Some(format!(
                    "{name} v{version} ({platform}){}",
                    message.as_deref().map(|m| format!(" - {m}")).unwrap_or_default()
                )),
                _ => None,
            })
            .collect(),
        timeout_details: outcomes
            .iter()
            .filter_map(|o| match o {
                PackageOutcome::Timeout { name, version, platform } => Some(format!("{name} v{version} ({platform})")),
                _ => None,
            })
            .collect(),
        platform_breakdown,
        duration_seconds: start.elapsed().as_secs_f64(),
    };
    write_json_summary(req.report_dir, &summary)?;

    Ok(BatchSummary {
        outcomes,
        successful_builds,
        failed_builds,
        timeout_builds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_floors_at_25_even_under_tight_quota() {
        assert_eq!(batch_size(100, 210), 25);
    }

    #[test]
    fn batch_size_respects_configured_max_when_quota_is_plentiful() {
        assert_eq!(batch_size(10, 100_000), 10);
    }

    #[test]
    fn batch_size_scales_with_quota_between_the_floor_and_the_max() {
        assert_eq!(batch_size(1000, 1000), (1000u64 - SAFETY_MARGIN) as usize / PER_RELEASE_COST as usize);
    }

    #[test]
    fn fatal_overall_iff_zero_success_and_some_failure() {
        let summary = BatchSummary {
            outcomes: Vec::new(),
            successful_builds: 0,
            failed_builds: 2,
            timeout_builds: 0,
        };
        assert!(summary.is_fatal());

        let summary = BatchSummary {
            outcomes: Vec::new(),
            successful_builds: 1,
            failed_builds: 2,
            timeout_builds: 0,
        };
        assert!(!summary.is_fatal());
    }
}
