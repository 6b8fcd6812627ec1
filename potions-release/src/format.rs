//! Tag and release-body text formatting (§4.H).

use std::collections::BTreeMap;

/// `<packageName>-<version>` with `version` normalized to start with `v`.
pub fn format_tag(package_name: &str, version: &str) -> String {
    format!("{package_name}-{}", normalize_version(version))
}

fn normalize_version(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    }
}

/// Crude, display-only platform label: the dot-delimited token immediately
/// before the basename's final dot. Not the authoritative platform-id
/// parser (that lives in the coverage validator) — this exists purely to
/// group assets for a human-readable release body.
fn token_before_last_dot(basename: &str) -> &str {
    let tokens: Vec<&str> = basename.split('.').collect();
    if tokens.len() < 2 {
        return basename;
    }
    tokens[tokens.len() - 2]
}

/// Lists release assets grouped by their display platform label.
pub fn generate_release_body(asset_basenames: &[String]) -> String {
    let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for name in asset_basenames {
        grouped.entry(token_before_last_dot(name)).or_default().push(name);
    }

    let mut body = String::from("## Release artifacts\n\n");
    for (platform, names) in grouped {
        body.push_str(&format!("### {platform}\n"));
        for name in names {
            body.push_str(&format!("- {name}\n"));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_normalizes_missing_v_prefix() {
        assert_eq!(format_tag("kubectl", "1.29.0"), "kubectl-v1.29.0");
        assert_eq!(format_tag("kubectl", "v1.29.0"), "kubectl-v1.29.0");
    }

    #[test]
    fn body_groups_assets_by_display_token() {
        let names = vec![
            "kubectl-1.29.0-linux-amd64.tar.gz".to_string(),
            "kubectl-1.29.0-linux-amd64.tar.gz.sha256".to_string(),
        ];
        let body = generate_release_body(&names);
        assert!(body.contains("## Release artifacts"));
        assert!(body.contains("kubectl-1.29.0-linux-amd64.tar.gz"));
    }
}
