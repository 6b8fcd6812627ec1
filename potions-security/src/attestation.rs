//! SLSA-shaped build attestation (in-toto statement).

use serde::Serialize;

use crate::hardening::BinaryAnalysis;

#[derive(Debug, Clone, Serialize)]
pub struct Attestation {
    #[serde(rename = "_type")]
    pub statement_type: &'static str,
    #[serde(rename = "predicateType")]
    pub predicate_type: &'static str,
    pub subject_name: String,
    pub subject_digest_sha256: String,
    pub subject_digest_sha512: String,
    pub build_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardening_percentage: Option<u32>,
    pub signature_verified: bool,
    pub vulnerability_scan_performed: bool,
}

pub fn generate(
    subject_name: &str,
    subject_digest_sha256: &str,
    subject_digest_sha512: &str,
    analysis: Option<&BinaryAnalysis>,
    signature_verified: bool,
    vulnerability_scan_performed: bool,
) -> Attestation {
    Attestation {
        statement_type: "https://in-toto.io/Statement/v0.1",
        predicate_type: "https://slsa.dev/provenance/v0.2",
        subject_name: subject_name.to_string(),
        subject_digest_sha256: subject_digest_sha256.to_string(),
        subject_digest_sha512: subject_digest_sha512.to_string(),
        build_type: "potions",
        hardening_percentage: analysis.map(|a| a.percentage),
        signature_verified,
        vulnerability_scan_performed,
    }
}
