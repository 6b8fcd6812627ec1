//! URL placeholder expansion for `DownloadSpec::download_url`.

use potions_core::recipe::PlatformConfig;

fn substitute(template: &str, key: &str, value: &str) -> String {
    template.replace(&format!("{{{key}}}"), value)
}

/// Expand `{version}` first, then every custom platform key, then
/// `{os}`/`{arch}`/`{suffix}` (with `{version}` inside `suffix` resolved
/// recursively). Defaults `os=linux`, `arch=amd64`, `suffix=""`.
pub fn expand(template: &str, version: &str, platform: &PlatformConfig) -> String {
    let mut out = substitute(template, "version", version);

    for (key, value) in &platform.custom {
        out = substitute(&out, key, value);
    }

    let os = platform.os.as_deref().unwrap_or("linux");
    let arch = platform.arch.as_deref().unwrap_or("amd64");
    let suffix = platform.suffix.as_deref().unwrap_or("");
    let suffix = substitute(suffix, "version", version);

    out = substitute(&out, "os", os);
    out = substitute(&out, "arch", arch);
    out = substitute(&out, "suffix", &suffix);
    out
}

/// Sanitize the remote filename: path-basename, collapse invalid
/// characters to `_`, substitute `"download"` for empty/`/`/`.`.
pub fn sanitize_filename(url: &str) -> String {
    let basename = url
        .split('/')
        .next_back()
        .unwrap_or("")
        .split('?')
        .next()
        .unwrap_or("");

    let sanitized: String = basename
        .chars()
        .map(|c| {
            if "\":<>|*?\r\n".contains(c) {
                '_'
            } else {
                c
            }
        })
        .collect();

    match sanitized.as_str() {
        "" | "/" | "." => "download".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn expands_all_placeholders() {
        let platform = PlatformConfig {
            os: Some("linux".into()),
            arch: Some("amd64".into()),
            suffix: None,
            custom: HashMap::new(),
        };
        let url = expand(
            "https://example.test/{version}/{os}/{arch}/kubectl",
            "1.28.0",
            &platform,
        );
        assert_eq!(url, "https://example.test/1.28.0/linux/amd64/kubectl");
    }

    #[test]
    fn leaves_unresolved_placeholders_literal() {
        let platform = PlatformConfig::default();
        let url = expand("https://example.test/{missing}", "1.0.0", &platform);
        assert_eq!(url, "https://example.test/{missing}");
    }

    #[test]
    fn sanitizes_basename() {
        assert_eq!(sanitize_filename("https://h/a/b/tool:v1"), "tool_v1");
        assert_eq!(sanitize_filename("https://h/a/b/"), "download");
    }
}
