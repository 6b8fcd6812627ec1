//! Build orchestrator (§4.J): sequences recipe load through package for
//! one `(name, version?, platform)`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use potions_core::{Recipe, RecipeStore};
use potions_security::{
    generate_attestation, generate_sbom, import_keys, query_vulnerabilities, sha256sum, sha512sum, should_block_build,
    verify_detached, write_sidecars, BinaryAnalysis, SecurityReport,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::adapters::Clock;
use crate::error::{Error, Result, StepContext};

/// Elapsed wall-clock time between two `Clock` readings, via the `Clock`
/// seam rather than `std::time::Instant` (§4.L).
fn elapsed_since(clock: &dyn Clock, start: DateTime<Utc>) -> Duration {
    (clock.now() - start).to_std().unwrap_or(Duration::ZERO)
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub recipe_name: String,
    pub version: String,
    pub platform: String,
    pub artifact_path: Option<PathBuf>,
    pub security: Option<SecurityReport>,
    pub download_duration: Duration,
    pub build_duration: Duration,
    pub total_duration: Duration,
    pub success: bool,
    pub error: Option<String>,
}

const SUPPORTED_PLATFORMS: [&str; 4] = ["linux-amd64", "linux-arm64", "darwin-x86_64", "darwin-arm64"];

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("potions/0.1")
        .timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build http client")
}

async fn fetch_signature_url(recipe: &Recipe, version: &str) -> Option<String> {
    if let Some(template) = &recipe.security.signature_url {
        return Some(template.replace("{version}", version));
    }
    recipe.download.download_url.as_ref().map(|u| format!("{u}.sig"))
}

/// Returns whether cryptographic verification actually ran. `false` means
/// no key material was configured, so nothing was checked — the caller
/// must not report this as a verified signature.
async fn verify_signature(recipe: &Recipe, version: &str, download_path: &Path) -> Result<bool> {
    let keys_configured = !recipe.security.gpg_key_ids.is_empty() || recipe.security.gpg_keys_url.is_some();
    if !keys_configured {
        return Ok(false);
    }

    let sig_url = fetch_signature_url(recipe, version).await.ok_or_else(|| Error::Step {
        step: "verify signature",
        source: "no signature URL available".to_string(),
    })?;

    let http = client();
    let sig_bytes = http
        .get(&sig_url)
        .send()
        .await
        .step("verify signature")?
        .bytes()
        .await
        .step("verify signature")?;

    let payload = tokio::fs::read(download_path).await.step("verify signature")?;

    let gpg_key_ids = recipe.security.gpg_key_ids.clone();
    let gpg_keys_url = recipe.security.gpg_keys_url.clone();
    let keyring = tokio::task::spawn_blocking(move || import_keys(gpg_keys_url.as_deref(), &gpg_key_ids))
        .await
        .expect("key import task panicked")
        .step("verify signature")?;

    tokio::task::spawn_blocking(move || verify_detached(&keyring, &payload, &sig_bytes))
        .await
        .expect("signature verification task panicked")
        .step("verify signature")?;
    Ok(true)
}

async fn scan_vulnerabilities(name: String, version: String) -> Result<SecurityReport> {
    let vulns = tokio::task::spawn_blocking(move || query_vulnerabilities(&name, &version))
        .await
        .expect("OSV query task panicked")
        .step("scan vulnerabilities")?;
    Ok(SecurityReport::new(vulns, None, false))
}

/// Best-effort binary location for hardening analysis: the artifact's own
/// path if it's a single file, else the recipe-named file inside it, else
/// the first regular file found.
fn locate_binary_for_analysis(recipe: &Recipe, artifact_path: &Path) -> Option<PathBuf> {
    if artifact_path.is_file() {
        return Some(artifact_path.to_path_buf());
    }
    let named = artifact_path.join(&recipe.name);
    if named.is_file() {
        return Some(named);
    }
    std::fs::read_dir(artifact_path)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| p.is_file())
}

async fn analyze_binary(recipe: &Recipe, artifact_path: &Path, platform: &str) -> Option<BinaryAnalysis> {
    let binary_path = locate_binary_for_analysis(recipe, artifact_path)?;
    let platform = platform.to_string();
    match tokio::task::spawn_blocking(move || potions_security::analyze(&binary_path, &platform)).await {
        Ok(Ok(analysis)) => Some(analysis),
        Ok(Err(e)) => {
            tracing::warn!("binary hardening analysis failed: {e}");
            None
        }
        Err(e) => {
            tracing::warn!("binary hardening analysis task panicked: {e}");
            None
        }
    }
}

/// Runs the pipeline for one `(name, version?, platform)`. Fatal errors
/// short-circuit and propagate with a stepped context.
pub async fn run_build(
    store: &RecipeStore,
    name: &str,
    version: &str,
    platform: &str,
    out_dir: &Path,
    cancel: &CancellationToken,
    clock: &dyn Clock,
    scan_enabled: bool,
) -> Result<BuildResult> {
    let total_start = clock.now();

    let recipe = store.get(name).step("load recipe")?.clone();

    let version = if version.is_empty() || version == "latest" {
        let recipe_for_resolve = recipe.clone();
        tokio::task::spawn_blocking(move || potions_core::resolve_version(&recipe_for_resolve))
            .await
            .expect("version resolution task panicked")
            .step("resolve version")?
    } else {
        version.to_string()
    };

    if !SUPPORTED_PLATFORMS.contains(&platform) || !recipe.download.supports_platform(platform) {
        return Err(Error::Step {
            step: "validate platform",
            source: format!("{platform} is not supported by recipe {name}"),
        });
    }

    if cancel.is_cancelled() {
        return Err(Error::Step {
            step: "download artifact",
            source: "build canceled".to_string(),
        });
    }

    let build_dir = out_dir.join(format!("{name}-{version}-{platform}"));
    let download_start = clock.now();
    let artifact = potions_fetch::download(&recipe, &version, platform, &build_dir)
        .await
        .step("download artifact")?;
    let download_duration = elapsed_since(clock, download_start);

    let is_git = matches!(recipe.download.method, potions_core::DownloadMethod::Git);
    let mut signature_verified = false;
    if recipe.security.verify_signature && !is_git {
        if let Some(download_path) = &artifact.download_path {
            signature_verified = verify_signature(&recipe, &version, download_path).await?;
        } else {
            tracing::warn!("signature verification requested but no downloadPath is available");
        }
    } else if recipe.security.verify_signature && is_git {
        tracing::info!("signature verification skipped for git method");
    }

    let mut security: Option<SecurityReport> = None;
    if recipe.security.scan_vulnerabilities && scan_enabled {
        let report = scan_vulnerabilities(name.to_string(), version.clone()).await?;
        if should_block_build(&report) {
            return Err(Error::Step {
                step: "scan vulnerabilities",
                source: format!("build blocked: security score {:.1}", report.score),
            });
        }
        security = Some(report);
    }

    if cancel.is_cancelled() {
        return Err(Error::Step {
            step: "run build scripts",
            source: "build canceled".to_string(),
        });
    }

    let build_start = clock.now();
    potions_build::run(&recipe, &artifact, &build_dir).await.step("run build scripts")?;
    let build_duration = elapsed_since(clock, build_start);

    let analysis = analyze_binary(&recipe, &artifact.path, platform).await;
    if let Some(analysis) = &analysis {
        security = Some(match security.take() {
            Some(mut report) => {
                report.hardening = Some(analysis.clone());
                report
            }
            None => SecurityReport::new(Vec::new(), Some(analysis.clone()), false),
        });
    }

    let packaged = potions_build::package(&recipe, &artifact, &version, platform, &build_dir)
        .step("package artifact")?;

    let sha256 = sha256sum(&packaged.path).step("generate sidecars")?;
    let sha512 = sha512sum(&packaged.path).step("generate sidecars")?;
    let artifact_name = packaged
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let sbom = generate_sbom(&artifact_name, &sha256, analysis.as_ref());
    let attestation = generate_attestation(
        &artifact_name,
        &sha256,
        &sha512,
        analysis.as_ref(),
        signature_verified,
        recipe.security.scan_vulnerabilities && scan_enabled,
    );
    // Checksum sidecar failures are fatal; SBOM/provenance failures are
    // already downgraded to warnings inside `write_sidecars` itself.
    write_sidecars(&packaged.path, &sbom, &attestation).step("generate sidecars")?;

    Ok(BuildResult {
        recipe_name: name.to_string(),
        version,
        platform: platform.to_string(),
        artifact_path: Some(packaged.path),
        security,
        download_duration,
        build_duration,
        total_duration: elapsed_since(clock, total_start),
        success: true,
        error: None,
    })
}
