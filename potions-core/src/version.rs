//! Version resolver (discover and normalize the latest upstream version).

use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::recipe::{Recipe, VersionSource};

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    draft: bool,
}

#[derive(Debug, Deserialize)]
struct GithubTag {
    name: String,
}

fn client() -> Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .user_agent("potions/0.1")
        .timeout(VERSION_PROBE_TIMEOUT)
        .build()?)
}

fn fetch_body(url: &str) -> Result<String> {
    let resp = client()?
        .get(url)
        .send()
        .map_err(|e| Error::VersionFetchFailed(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(Error::VersionFetchFailed(format!(
            "{url}: status {}",
            resp.status()
        )));
    }
    resp.text().map_err(|e| Error::VersionFetchFailed(e.to_string()))
}

fn fetch_latest_release(owner: &str, repo: &str) -> Result<String> {
    let url = format!("https://api.github.com/repos/{owner}/{repo}/releases/latest");
    let resp = client()?
        .get(&url)
        .header("Accept", "application/vnd.github+json")
        .send()
        .map_err(|e| Error::VersionFetchFailed(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(Error::VersionFetchFailed(format!(
            "{url}: status {}",
            resp.status()
        )));
    }
    let release: GithubRelease = resp.json().map_err(|e| Error::VersionFetchFailed(e.to_string()))?;
    if release.draft {
        return Err(Error::VersionFetchFailed(format!(
            "{owner}/{repo}: latest release is a draft"
        )));
    }
    Ok(release.tag_name)
}

fn fetch_first_tag(owner: &str, repo: &str, exclude_patterns: Option<&str>) -> Result<String> {
    let url = format!("https://api.github.com/repos/{owner}/{repo}/tags");
    let resp = client()?
        .get(&url)
        .header("Accept", "application/vnd.github+json")
        .send()
        .map_err(|e| Error::VersionFetchFailed(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(Error::VersionFetchFailed(format!(
            "{url}: status {}",
            resp.status()
        )));
    }
    let tags: Vec<GithubTag> = resp.json().map_err(|e| Error::VersionFetchFailed(e.to_string()))?;
    let exclude = exclude_patterns.map(Regex::new).transpose()?;

    tags.into_iter()
        .map(|t| t.name)
        .find(|name| !exclude.as_ref().is_some_and(|re| re.is_match(name)))
        .ok_or(Error::VersionNoMatch)
}

/// Component-wise integer comparison of dot-split parts: the leading
/// numeric prefix of each part counts, the remainder is ignored.
fn numeric_prefix(part: &str) -> u64 {
    part.chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

fn semantic_key(version: &str) -> Vec<u64> {
    version.split('.').map(numeric_prefix).collect()
}

fn semantic_max<'a>(candidates: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    candidates.max_by_key(|c| semantic_key(c))
}

fn apply_exclude(candidate: &str, exclude: Option<&Regex>) -> bool {
    exclude.is_some_and(|re| re.is_match(candidate))
}

/// `s<sep>PATTERN<sep>REPLACEMENT<sep>[g]` substitution or a bare
/// `FIND:REPLACE` literal replacement.
fn apply_cleanup(input: &str, cleanup: &str) -> Result<String> {
    let mut chars = cleanup.chars();
    if chars.next() == Some('s') {
        let sep = chars.next().ok_or_else(|| Error::VersionInvalidCleanup(cleanup.into()))?;
        if sep.is_alphanumeric() {
            return Err(Error::VersionInvalidCleanup(cleanup.into()));
        }
        let rest: String = chars.collect();
        let parts = split_unescaped(&rest, sep);
        if parts.len() < 2 {
            return Err(Error::VersionInvalidCleanup(cleanup.into()));
        }
        let pattern = &parts[0];
        let replacement = parts.get(1).map(String::as_str).unwrap_or("");
        let flags = parts.get(2).map(String::as_str).unwrap_or("");
        let global = flags.contains('g');

        let re = Regex::new(pattern)?;
        let replacement = replacement.replace("\\", "$");
        let out = if global {
            re.replace_all(input, replacement.as_str()).into_owned()
        } else {
            re.replace(input, replacement.as_str()).into_owned()
        };
        return Ok(out);
    }

    if let Some((find, replace)) = cleanup.split_once(':') {
        return Ok(input.replace(find, replace));
    }

    Err(Error::VersionInvalidCleanup(cleanup.into()))
}

/// Split on `sep`, honoring a backslash escape of the separator character.
fn split_unescaped(input: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && chars.peek() == Some(&sep) {
            current.push(sep);
            chars.next();
        } else if c == sep {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// Resolve the upstream version string for a recipe.
pub fn resolve(recipe: &Recipe) -> Result<String> {
    let spec = &recipe.version;
    let exclude = spec
        .exclude_patterns
        .as_deref()
        .map(Regex::new)
        .transpose()?;

    let resolved = match &spec.source {
        VersionSource::Url(url) => {
            let body = fetch_body(url)?;
            match spec.extract_pattern.as_deref() {
                Some(pattern) => {
                    let re = Regex::new(pattern)?;
                    let candidates: Vec<&str> = re
                        .find_iter(&body)
                        .map(|m| m.as_str())
                        .filter(|c| !apply_exclude(c, exclude.as_ref()))
                        .collect();
                    semantic_max(candidates.into_iter())
                        .map(str::to_string)
                        .ok_or(Error::VersionNoMatch)?
                }
                None => body,
            }
        }
        VersionSource::GithubRelease { owner, repo } => {
            let tag = fetch_latest_release(owner, repo)?;
            apply_extract_once(&tag, spec.extract_pattern.as_deref())?
        }
        VersionSource::GithubTag { owner, repo } => {
            let tag = fetch_first_tag(owner, repo, spec.exclude_patterns.as_deref())?;
            apply_extract_once(&tag, spec.extract_pattern.as_deref())?
        }
        VersionSource::Static(literal) => literal.clone(),
    };

    let resolved = match spec.cleanup.as_deref() {
        Some(cleanup) => apply_cleanup(&resolved, cleanup)?,
        None => resolved,
    };

    if apply_exclude(&resolved, exclude.as_ref()) {
        return Err(Error::VersionFilteredOut);
    }

    let trimmed = resolved.trim().to_string();
    if trimmed.is_empty() {
        return Err(Error::VersionNoMatch);
    }
    Ok(trimmed)
}

fn apply_extract_once(input: &str, pattern: Option<&str>) -> Result<String> {
    let Some(pattern) = pattern else {
        return Ok(input.to_string());
    };
    let re = Regex::new(pattern)?;
    let caps = re.captures(input).ok_or(Error::VersionNoMatch)?;
    let matched = caps
        .get(1)
        .or_else(|| caps.get(0))
        .ok_or(Error::VersionNoMatch)?;
    Ok(matched.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_max_picks_highest_release() {
        let candidates = ["v1.2.0", "v1.10.1", "v1.9.9"];
        assert_eq!(semantic_max(candidates.into_iter()), Some("v1.10.1"));
    }

    #[test]
    fn cleanup_strips_leading_v() {
        assert_eq!(apply_cleanup("v1.10.1", "s/^v//").unwrap(), "1.10.1");
    }

    #[test]
    fn cleanup_plain_find_replace() {
        assert_eq!(apply_cleanup("release-1.0", "release-:").unwrap(), "1.0");
    }

    #[test]
    fn cleanup_rejects_invalid_expression() {
        assert!(apply_cleanup("1.0", "???").is_err());
    }

    #[test]
    fn s2_scenario_url_semantic_max_with_cleanup() {
        let body = "Versions: v1.2.0 v1.10.1 v1.10.0-rc1 v1.9.9";
        let re = Regex::new(r"v[0-9]+\.[0-9]+\.[0-9]+(-rc[0-9]+)?").unwrap();
        let exclude = Regex::new("-rc").unwrap();
        let candidates: Vec<&str> = re
            .find_iter(body)
            .map(|m| m.as_str())
            .filter(|c| !exclude.is_match(c))
            .collect();
        let max = semantic_max(candidates.into_iter()).unwrap();
        let cleaned = apply_cleanup(max, "s/^v//").unwrap();
        assert_eq!(cleaned, "1.10.1");
    }

    #[test]
    fn numeric_prefix_ignores_non_numeric_suffix() {
        assert_eq!(numeric_prefix("10-rc1"), 10);
        assert_eq!(numeric_prefix("rc1"), 0);
    }
}
