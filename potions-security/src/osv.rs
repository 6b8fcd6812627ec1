//! OSV vulnerability query. Results are advisory: the ecosystem heuristic
//! below is a name-substring match and will misclassify many packages.

use serde::{Deserialize, Serialize};

use crate::error::Result;

const OSV_QUERY_ENDPOINT: &str = "https://api.osv.dev/v1/query";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Unknown,
        }
    }

    /// Derive severity from a CVSS score: >=9 CRITICAL, >=7 HIGH, >=4
    /// MEDIUM, >0 LOW, else UNKNOWN.
    fn from_cvss(score: f64) -> Self {
        if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else if score > 0.0 {
            Severity::Low
        } else {
            Severity::Unknown
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Vulnerability {
    pub id: String,
    pub severity: Severity,
    pub description: String,
    pub score: f64,
    pub component: String,
}

/// Guess the OSV ecosystem from the package name. Deliberately crude: a
/// name-substring heuristic, not a real ecosystem resolver.
pub fn infer_ecosystem(name: &str) -> &'static str {
    let lower = name.to_ascii_lowercase();
    if lower.contains("kubectl") || lower.contains("kube") || lower.contains("kubernetes") {
        "Go"
    } else if lower.contains("node") || lower.contains("npm") || lower.contains("yarn") {
        "npm"
    } else if lower.contains("python") || lower.contains("pip") {
        "PyPI"
    } else {
        "Generic"
    }
}

/// Placeholder: the numeric-CVSS extraction path is unimplemented
/// upstream and always returns 0.0, so severity promotion to
/// CRITICAL/HIGH by score alone never happens here; the OSV `severity`
/// string field is the only live signal.
fn extract_cvss_score(_raw_vuln: &serde_json::Value) -> f64 {
    0.0
}

#[derive(Debug, Deserialize)]
struct OsvResponse {
    #[serde(default)]
    vulns: Vec<serde_json::Value>,
}

/// `POST {package:{name, ecosystem}, version}` to the OSV query endpoint.
/// Non-200 responses yield an empty report rather than an error.
pub fn query(name: &str, version: &str) -> Result<Vec<Vulnerability>> {
    let ecosystem = infer_ecosystem(name);
    let body = serde_json::json!({
        "package": { "name": name, "ecosystem": ecosystem },
        "version": version,
    });

    let client = reqwest::blocking::Client::builder()
        .user_agent("potions/0.1")
        .build()?;

    let resp = match client.post(OSV_QUERY_ENDPOINT).json(&body).send() {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!("OSV query failed, treating as empty report: {e}");
            return Ok(Vec::new());
        }
    };

    if !resp.status().is_success() {
        tracing::warn!("OSV query returned status {}, treating as empty report", resp.status());
        return Ok(Vec::new());
    }

    let parsed: OsvResponse = resp.json()?;
    let component = format!("{name}@{version}");

    Ok(parsed
        .vulns
        .into_iter()
        .map(|raw| {
            let id = raw
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let description = raw
                .get("summary")
                .or_else(|| raw.get("details"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let cvss = extract_cvss_score(&raw);
            let severity = raw
                .get("severity")
                .and_then(|v| v.as_array())
                .and_then(|arr| arr.first())
                .and_then(|s| s.get("score"))
                .and_then(|s| s.as_str())
                .map(Severity::parse)
                .unwrap_or_else(|| Severity::from_cvss(cvss));

            Vulnerability {
                id,
                severity,
                description,
                score: cvss,
                component: component.clone(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_ecosystem_by_keyword() {
        assert_eq!(infer_ecosystem("kubectl"), "Go");
        assert_eq!(infer_ecosystem("node-gyp"), "npm");
        assert_eq!(infer_ecosystem("python-requests"), "PyPI");
        assert_eq!(infer_ecosystem("htop"), "Generic");
    }

    #[test]
    fn cvss_buckets_match_spec_thresholds() {
        assert_eq!(Severity::from_cvss(9.5), Severity::Critical);
        assert_eq!(Severity::from_cvss(7.0), Severity::High);
        assert_eq!(Severity::from_cvss(4.0), Severity::Medium);
        assert_eq!(Severity::from_cvss(0.1), Severity::Low);
        assert_eq!(Severity::from_cvss(0.0), Severity::Unknown);
    }

    #[test]
    fn extract_cvss_score_is_stub_returning_zero() {
        assert_eq!(extract_cvss_score(&serde_json::json!({})), 0.0);
    }
}
