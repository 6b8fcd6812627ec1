//! HTTP download and tar.gz safe extraction.

use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use futures::StreamExt;
use tar::Archive;

use crate::error::{Error, Result};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
/// Decompression-bomb defense: copy at most 1 GiB per archive entry.
const MAX_ENTRY_BYTES: u64 = 1 << 30;

/// GET `url` with a `User-Agent` header, streaming the body to
/// `<out>.part` before renaming, so a crashed download never leaves a
/// half-written file at the final path.
pub async fn download(url: &str, out: &Path) -> Result<()> {
    let client = reqwest::Client::builder()
        .user_agent("potions/0.1")
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;

    let resp = client.get(url).send().await?;
    if !resp.status().is_success() {
        return Err(Error::HttpFailed(format!("{url}: status {}", resp.status())));
    }

    let part = out.with_extension(
        out.extension()
            .map(|e| format!("{}.part", e.to_string_lossy()))
            .unwrap_or_else(|| "part".to_string()),
    );

    let mut file = tokio::fs::File::create(&part).await?;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk).await?;
    }
    drop(file);
    tokio::fs::rename(&part, out).await?;
    Ok(())
}

fn is_safe_relative(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
}

fn resolve_under_root(root: &Path, entry_path: &Path) -> Result<PathBuf> {
    if entry_path.is_absolute() || !is_safe_relative(entry_path) {
        return Err(Error::ExtractInvalid(format!(
            "unsafe entry path: {}",
            entry_path.display()
        )));
    }
    let dest = root.join(entry_path);
    // Lexical containment check (Zip-Slip defense): the destination must
    // still resolve under `root` once `..` components are collapsed.
    let mut normalized = PathBuf::new();
    for component in dest.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(Error::ExtractInvalid(format!(
                        "entry escapes extraction root: {}",
                        entry_path.display()
                    )));
                }
            }
            other => normalized.push(other),
        }
    }
    if !normalized.starts_with(root) {
        return Err(Error::ExtractInvalid(format!(
            "entry escapes extraction root: {}",
            entry_path.display()
        )));
    }
    Ok(normalized)
}

/// Extract a `.tar.gz`/`.tgz` archive into `out_dir`, returning the
/// directory the rest of the pipeline should treat as the artifact root.
pub fn extract_tar_gz(archive_path: &Path, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir)?;
    let file = File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = Archive::new(decoder);

    let mut deferred_symlinks = Vec::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let entry_path = entry.path()?.into_owned();
        let entry_type = entry.header().entry_type();

        let dest = match resolve_under_root(out_dir, &entry_path) {
            Ok(dest) => dest,
            Err(e) => {
                tracing::error!("rejecting archive entry: {e}");
                return Err(e);
            }
        };

        if entry_type.is_dir() {
            fs::create_dir_all(&dest)?;
            fs::set_permissions(&dest, fs::Permissions::from_mode(0o750))?;
            continue;
        }

        if entry_type.is_symlink() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let link_name = entry
                .link_name()
                .ok()
                .flatten()
                .map(|p| p.into_owned())
                .unwrap_or_default();
            deferred_symlinks.push((dest, link_name));
            continue;
        }

        if entry_type.is_file() {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let mode = entry.header().mode().unwrap_or(0o644);
            let executable = mode & 0o111 != 0;
            let mut out_file = File::create(&dest)?;
            let mut limited = entry.take(MAX_ENTRY_BYTES);
            io::copy(&mut limited, &mut out_file)?;
            let perm = if executable { 0o750 } else { 0o640 };
            fs::set_permissions(&dest, fs::Permissions::from_mode(perm))?;
            continue;
        }

        tracing::warn!("skipping unsupported archive entry type: {entry_path:?}");
    }

    for (dest, target) in deferred_symlinks {
        if target.as_os_str().is_empty() {
            tracing::warn!("skipping broken symlink with empty target: {}", dest.display());
            continue;
        }
        if let Err(e) = std::os::unix::fs::symlink(&target, &dest) {
            tracing::warn!("skipping unwritable symlink {}: {e}", dest.display());
        }
    }

    Ok(single_subdirectory_or_root(out_dir)?)
}

/// If the extract root contains exactly one entry and it is a directory,
/// the artifact path points into it; otherwise it points to the root.
fn single_subdirectory_or_root(root: &Path) -> Result<PathBuf> {
    let mut entries: Vec<fs::DirEntry> = fs::read_dir(root)?.collect::<io::Result<_>>()?;
    if entries.len() == 1 && entries[0].path().is_dir() {
        return Ok(entries.remove(0).path());
    }
    Ok(root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn build_archive(entries: &[(&str, &[u8], bool)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, contents, executable) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(if *executable { 0o755 } else { 0o644 });
            header.set_cksum();
            builder.append_data(&mut header, name, *contents).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(raw: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(raw).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn extracts_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("a.tar.gz");
        let raw = build_archive(&[("kubectl", b"binary-bytes", true)]);
        fs::write(&archive_path, gzip(&raw)).unwrap();

        let out = dir.path().join("out");
        let root = extract_tar_gz(&archive_path, &out).unwrap();
        assert_eq!(root, out);
        assert!(out.join("kubectl").exists());
        let mode = fs::metadata(out.join("kubectl")).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }

    #[test]
    fn rejects_path_traversal_entry() {
        let dir = tempfile::tempdir().unwrap();
        let archive_path = dir.path().join("evil.tar.gz");
        let raw = build_archive(&[("../../etc/passwd", b"pwned", false)]);
        fs::write(&archive_path, gzip(&raw)).unwrap();

        let out = dir.path().join("out");
        let result = extract_tar_gz(&archive_path, &out);
        assert!(matches!(result, Err(Error::ExtractInvalid(_))));
        assert!(!dir.path().join("etc").exists());
    }

    #[test]
    fn single_subdirectory_collapses_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("only-child")).unwrap();
        let resolved = single_subdirectory_or_root(dir.path()).unwrap();
        assert_eq!(resolved, dir.path().join("only-child"));
    }
}
