use std::path::Path;

use potions_core::recipe::{DownloadMethod, Recipe};

use crate::artifact::{Artifact, ArtifactKind};
use crate::error::{Error, Result};
use crate::{git, http, template};

/// `download(recipe, version, platform, out_dir) -> Artifact`.
pub async fn download(recipe: &Recipe, version: &str, platform: &str, out_dir: &Path) -> Result<Artifact> {
    match recipe.download.method {
        DownloadMethod::Http => download_http(recipe, version, platform, out_dir).await,
        DownloadMethod::Git => download_git(recipe, version, platform, out_dir).await,
    }
}

async fn download_http(recipe: &Recipe, version: &str, platform: &str, out_dir: &Path) -> Result<Artifact> {
    let platform_config = recipe
        .download
        .platform(platform)
        .ok_or_else(|| Error::PlatformUnsupported(platform.to_string()))?;

    let download_url = recipe
        .download
        .download_url
        .as_deref()
        .ok_or_else(|| Error::PlatformUnsupported(format!("{platform}: no downloadURL configured")))?;

    let url = template::expand(download_url, version, platform_config);
    let filename = template::sanitize_filename(&url);

    tokio::fs::create_dir_all(out_dir).await?;
    let download_path = out_dir.join(&filename);
    http::download(&url, &download_path).await?;

    let is_archive = filename.ends_with(".tar.gz") || filename.ends_with(".tgz");
    let (path, kind) = if is_archive {
        let extract_root = out_dir.join(format!("{filename}-extracted"));
        let download_path_clone = download_path.clone();
        let root = tokio::task::spawn_blocking(move || http::extract_tar_gz(&download_path_clone, &extract_root))
            .await
            .expect("extraction task panicked")?;
        (root, ArtifactKind::Source)
    } else {
        (download_path.clone(), ArtifactKind::Binary)
    };

    let mut artifact = Artifact::new(&recipe.name, version, platform, path, kind);
    artifact.download_path = Some(download_path);
    Ok(artifact)
}

async fn download_git(recipe: &Recipe, version: &str, platform: &str, out_dir: &Path) -> Result<Artifact> {
    let git_url = recipe
        .download
        .git_url
        .as_deref()
        .ok_or_else(|| Error::PlatformUnsupported("git method requires gitURL".to_string()))?;

    let path = git::clone(git_url, &recipe.download.git_tag_prefix, version, out_dir).await?;

    // `downloadPath` stays unset for git: signature verification is
    // skipped entirely for this method (§4.F.5).
    Ok(Artifact::new(&recipe.name, version, platform, path, ArtifactKind::Source))
}
