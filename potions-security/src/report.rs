//! Aggregate security report and block-policy decision (§3, §4.F).

use serde::Serialize;

use crate::hardening::BinaryAnalysis;
use crate::osv::{Severity, Vulnerability};

#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub vulnerabilities: Vec<Vulnerability>,
    pub hardening: Option<BinaryAnalysis>,
    pub signature_verified: bool,
    pub score: f64,
}

impl SecurityReport {
    pub fn new(vulnerabilities: Vec<Vulnerability>, hardening: Option<BinaryAnalysis>, signature_verified: bool) -> Self {
        let score = compute_score(&vulnerabilities);
        SecurityReport {
            vulnerabilities,
            hardening,
            signature_verified,
            score,
        }
    }

    pub fn has_critical(&self) -> bool {
        self.vulnerabilities.iter().any(|v| v.severity == Severity::Critical)
    }
}

/// `10 - 3*CRITICAL - 2*HIGH - 1*MEDIUM - 0.5*LOW - 0.1*UNKNOWN`, clamped to `[0, 10]`.
fn compute_score(vulns: &[Vulnerability]) -> f64 {
    let mut score = 10.0;
    for v in vulns {
        score -= match v.severity {
            Severity::Critical => 3.0,
            Severity::High => 2.0,
            Severity::Medium => 1.0,
            Severity::Low => 0.5,
            Severity::Unknown => 0.1,
        };
    }
    score.clamp(0.0, 10.0)
}

/// `shouldBlockBuild(report) = (any CRITICAL vuln) OR (score < 5.0)`
pub fn should_block_build(report: &SecurityReport) -> bool {
    report.has_critical() || report.score < 5.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vuln(severity: Severity) -> Vulnerability {
        Vulnerability {
            id: "TEST-0001".to_string(),
            severity,
            description: String::new(),
            score: 0.0,
            component: "tool".to_string(),
        }
    }

    #[test]
    fn clean_report_has_max_score_and_does_not_block() {
        let report = SecurityReport::new(Vec::new(), None, true);
        assert_eq!(report.score, 10.0);
        assert!(!should_block_build(&report));
    }

    #[test]
    fn any_critical_blocks_regardless_of_score() {
        let report = SecurityReport::new(vec![vuln(Severity::Critical)], None, true);
        assert!(report.has_critical());
        assert!(should_block_build(&report));
    }

    #[test]
    fn low_score_without_critical_still_blocks() {
        let vulns = vec![vuln(Severity::High), vuln(Severity::High), vuln(Severity::High)];
        let report = SecurityReport::new(vulns, None, true);
        assert!(!report.has_critical());
        assert!(report.score < 5.0);
        assert!(should_block_build(&report));
    }

    #[test]
    fn score_never_goes_below_zero() {
        let vulns: Vec<Vulnerability> = (0..10).map(|_| vuln(Severity::Critical)).collect();
        let report = SecurityReport::new(vulns, None, true);
        assert_eq!(report.score, 0.0);
    }
}
