//! Batch report-file and JSON-summary writers (§6).
//!
//! The batch orchestrator classifies each package into one of three
//! buckets (success/timeout/error). §6 names four report files
//! (successes/failures/timeouts/errors); since there is no fourth
//! classification bucket, the `error` bucket is written to both the
//! `failures` file (plain line) and the `errors` file (`- ERROR -`
//! tagged line) — see DESIGN.md's Open Question decisions.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::batch::PackageOutcome;

pub fn write_reports(out_dir: &Path, outcomes: &[PackageOutcome]) -> std::io::Result<()> {
    let mut success_lines = Vec::new();
    let mut failure_lines = Vec::new();
    let mut timeout_lines = Vec::new();
    let mut error_lines = Vec::new();

    for outcome in outcomes {
        match outcome {
            PackageOutcome::Success { name, version, .. } => {
                success_lines.push(format!("{name}:{version}"));
            }
            PackageOutcome::Timeout { name, version, platform } => {
                timeout_lines.push(format!("{name} v{version} ({platform})"));
            }
            PackageOutcome::Error { name, version, platform, message } => {
                let suffix = message.as_deref().map(|m| format!(" - {m}")).unwrap_or_default();
                failure_lines.push(format!("{name} v{version} ({platform}){suffix}"));
                error_lines.push(format!("{name} v{version} ({platform}) - ERROR -{suffix}"));
            }
        }
    }

    write_lines(&out_dir.join("successes.txt"), &success_lines)?;
    write_lines(&out_dir.join("failures.txt"), &failure_lines)?;
    write_lines(&out_dir.join("timeouts.txt"), &timeout_lines)?;
    write_lines(&out_dir.join("errors.txt"), &error_lines)?;
    Ok(())
}

fn write_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct JsonSummary {
    pub total_packages: usize,
    pub successful_builds: usize,
    pub failed_builds: usize,
    pub timeout_builds: usize,
    pub success_details: Vec<String>,
    pub failure_details: Vec<String>,
    pub timeout_details: Vec<String>,
    pub platform_breakdown: std::collections::BTreeMap<String, usize>,
    pub duration_seconds: f64,
}

pub fn write_json_summary(out_dir: &Path, summary: &JsonSummary) -> std::io::Result<()> {
    let path = out_dir.join("summary.json");
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::PackageOutcome;

    #[test]
    fn report_lines_match_spec_formats() {
        let dir = tempfile::tempdir().unwrap();
        let outcomes = vec![
            PackageOutcome::Success {
                name: "kubectl".to_string(),
                version: "1.28.0".to_string(),
                platform: "linux-amd64".to_string(),
            },
            PackageOutcome::Timeout {
                name: "helm".to_string(),
                version: "3.0.0".to_string(),
                platform: "linux-amd64".to_string(),
            },
            PackageOutcome::Error {
                name: "kind".to_string(),
                version: "0.20.0".to_string(),
                platform: "linux-arm64".to_string(),
                message: Some("download failed".to_string()),
            },
        ];
        write_reports(dir.path(), &outcomes).unwrap();

        let success = std::fs::read_to_string(dir.path().join("successes.txt")).unwrap();
        assert_eq!(success, "kubectl:1.28.0\n");

        let timeout = std::fs::read_to_string(dir.path().join("timeouts.txt")).unwrap();
        assert_eq!(timeout, "helm v3.0.0 (linux-amd64)\n");

        let error = std::fs::read_to_string(dir.path().join("errors.txt")).unwrap();
        assert_eq!(error, "kind v0.20.0 (linux-arm64) - ERROR - download failed\n");

        let failure = std::fs::read_to_string(dir.path().join("failures.txt")).unwrap();
        assert_eq!(failure, "kind v0.20.0 (linux-arm64) - download failed\n");
    }
}
