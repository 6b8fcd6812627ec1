//! Packager: deterministic tar.gz composition of the build output tree.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use potions_core::recipe::Recipe;
use potions_fetch::{Artifact, ArtifactKind};

use crate::error::{Error, Result};

fn strip_leading_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// Choose the source tree: the first of `out_dir/out_dir/bin` (nested
/// convention from install scripts with `PREFIX=out_dir`), `out_dir/bin`,
/// a `bin/` sibling of the extracted root, the extracted root itself, or
/// the raw single-file binary.
fn choose_source_root(artifact: &Artifact, out_dir: &Path) -> (PathBuf, Option<String>) {
    let nested = out_dir.join(out_dir.file_name().unwrap_or_default()).join("bin");
    if nested.is_dir() {
        return (nested, None);
    }
    let direct = out_dir.join("bin");
    if direct.is_dir() {
        return (direct, None);
    }
    if let Some(sibling_bin) = artifact.path.parent().map(|p| p.join("bin")) {
        if sibling_bin.is_dir() {
            return (sibling_bin, None);
        }
    }
    if artifact.path.is_dir() {
        return (artifact.path.clone(), None);
    }
    // Raw single-file binary: archived alone, renamed to the recipe name.
    (artifact.path.clone(), Some(artifact.name.clone()))
}

fn append_tree(builder: &mut tar::Builder<impl io::Write>, root: &Path, dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let rel = path
            .strip_prefix(root)
            .map_err(|e| Error::PackageIo(e.to_string()))?;
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            append_tree(builder, root, &path)?;
        } else if metadata.file_type().is_symlink() {
            match std::fs::read_link(&path) {
                Ok(target) => {
                    let mut header = tar::Header::new_gnu();
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_size(0);
                    header.set_mode(0o777);
                    header.set_cksum();
                    builder
                        .append_link(&mut header, rel, &target)
                        .map_err(|e| Error::PackageIo(e.to_string()))?;
                }
                Err(e) => {
                    tracing::warn!("omitting unreadable symlink {}: {e}", path.display());
                }
            }
        } else {
            let mut file = File::open(&path)?;
            builder
                .append_file(rel, &mut file)
                .map_err(|e| Error::PackageIo(e.to_string()))?;
        }
    }
    Ok(())
}

/// `package(recipe, artifact, version, platform, out_dir) -> Artifact`.
pub fn package(recipe: &Recipe, artifact: &Artifact, version: &str, platform: &str, out_dir: &Path) -> Result<Artifact> {
    let tarball_name = format!(
        "{}-{}-{}.tar.gz",
        recipe.name,
        strip_leading_v(version),
        platform
    );
    let tarball_path = out_dir.join(tarball_name);

    let (source_root, rename_single_file) = choose_source_root(artifact, out_dir);

    let file = File::create(&tarball_path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    if let Some(new_name) = rename_single_file {
        let mut f = File::open(&source_root)?;
        builder
            .append_file(new_name, &mut f)
            .map_err(|e| Error::PackageIo(e.to_string()))?;
    } else {
        append_tree(&mut builder, &source_root, &source_root)?;
    }

    builder
        .into_inner()
        .map_err(|e| Error::PackageIo(e.to_string()))?
        .finish()
        .map_err(|e| Error::PackageIo(e.to_string()))?;

    Ok(Artifact::new(
        &artifact.name,
        &artifact.version,
        &artifact.platform,
        tarball_path,
        ArtifactKind::Archive,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(name: &str) -> Recipe {
        let yaml = format!(
            "name: {name}\nversion:\n  source: \"static:v1.0.0\"\n"
        );
        Recipe::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn packages_single_file_binary() {
        let dir = tempfile::tempdir().unwrap();
        let bin_path = dir.path().join("kubectl-bin");
        std::fs::write(&bin_path, b"12 bytes!!!!").unwrap();

        let recipe = recipe("kubectl");
        let artifact = Artifact::new("kubectl", "1.28.0", "linux-amd64", bin_path, ArtifactKind::Binary);

        let out_dir = dir.path().join("dist");
        std::fs::create_dir_all(&out_dir).unwrap();
        let packaged = package(&recipe, &artifact, "1.28.0", "linux-amd64", &out_dir).unwrap();

        assert_eq!(packaged.kind, ArtifactKind::Archive);
        assert_eq!(
            packaged.path.file_name().unwrap().to_str().unwrap(),
            "kubectl-1.28.0-linux-amd64.tar.gz"
        );

        let file = File::open(&packaged.path).unwrap();
        let decoder = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(decoder);
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["kubectl"]);
    }

    #[test]
    fn packages_directory_tree_preserving_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let extracted = dir.path().join("extracted");
        std::fs::create_dir_all(&extracted).unwrap();
        std::fs::write(extracted.join("tool"), b"binary").unwrap();
        std::os::unix::fs::symlink("tool", extracted.join("tool-link")).unwrap();

        let recipe = recipe("tool");
        let artifact = Artifact::new("tool", "2.0.0", "linux-amd64", extracted, ArtifactKind::Source);

        let out_dir = dir.path().join("dist");
        std::fs::create_dir_all(&out_dir).unwrap();
        let packaged = package(&recipe, &artifact, "2.0.0", "linux-amd64", &out_dir).unwrap();

        let file = File::open(&packaged.path).unwrap();
        let decoder = flate2::read::GzDecoder::new(file);
        let mut archive = tar::Archive::new(decoder);
        let mut saw_symlink = false;
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            if entry.header().entry_type().is_symlink() {
                saw_symlink = true;
            }
        }
        assert!(saw_symlink);
    }

    #[test]
    fn strips_leading_v_from_version() {
        assert_eq!(strip_leading_v("v1.2.3"), "1.2.3");
        assert_eq!(strip_leading_v("1.2.3"), "1.2.3");
    }
}
