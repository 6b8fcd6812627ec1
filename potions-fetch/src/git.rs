//! Git clone with injection-proof argument validation.

use std::path::{Path, PathBuf};

use regex::Regex;

use crate::error::{Error, Result};

const SHELL_METACHARACTERS: &[char] = &['|', '&', ';', '`', '$', '(', ')', '{', '}', '[', ']', '<', '>', '\n', '\r'];

fn validate_git_url(url: &str) -> Result<()> {
    if !(url.starts_with("https://") || url.starts_with("git@")) {
        return Err(Error::GitInvalidUrl(url.to_string()));
    }
    if url.chars().any(|c| SHELL_METACHARACTERS.contains(&c)) {
        return Err(Error::GitInvalidUrl(url.to_string()));
    }
    Ok(())
}

fn validate_git_tag(tag: &str) -> Result<()> {
    let re = Regex::new(r"^[A-Za-z0-9._/-]+$").expect("static pattern");
    if !re.is_match(tag) || tag.contains("..") {
        return Err(Error::GitInvalidTag(tag.to_string()));
    }
    Ok(())
}

/// Shallow, single-branch clone of `git_url` at `git_tag_prefix + version`
/// into a clean destination inside `out_dir`.
pub async fn clone(git_url: &str, git_tag_prefix: &str, version: &str, out_dir: &Path) -> Result<PathBuf> {
    validate_git_url(git_url)?;
    let tag = format!("{git_tag_prefix}{version}");
    validate_git_tag(&tag)?;

    let dest = out_dir.join("src");
    if dest.exists() {
        return Err(Error::GitFailed(format!("destination already exists: {}", dest.display())));
    }
    tokio::fs::create_dir_all(out_dir).await?;

    let output = tokio::process::Command::new("git")
        .args([
            "clone",
            "--depth",
            "1",
            "--branch",
            &tag,
            "--single-branch",
            git_url,
        ])
        .arg(&dest)
        .output()
        .await
        .map_err(|e| Error::GitFailed(e.to_string()))?;

    if !output.status.success() {
        return Err(Error::GitFailed(String::from_utf8_lossy(&output.stderr).into_owned()));
    }

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_and_ssh_urls() {
        assert!(validate_git_url("https://github.com/example/repo.git").is_ok());
        assert!(validate_git_url("git@github.com:example/repo.git").is_ok());
    }

    #[test]
    fn rejects_non_git_scheme() {
        assert!(validate_git_url("ftp://example.test/repo.git").is_err());
    }

    #[test]
    fn rejects_shell_metacharacters() {
        assert!(validate_git_url("https://example.test/repo.git; rm -rf /").is_err());
        assert!(validate_git_url("https://example.test/$(whoami).git").is_err());
    }

    #[test]
    fn validates_tag_format() {
        assert!(validate_git_tag("v1.2.3").is_ok());
        assert!(validate_git_tag("release/v1.2.3").is_ok());
        assert!(validate_git_tag("../etc/passwd").is_err());
        assert!(validate_git_tag("tag with spaces").is_err());
    }
}
