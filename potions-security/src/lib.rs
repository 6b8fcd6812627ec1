mod attestation;
mod checksum;
mod error;
mod hardening;
mod osv;
mod report;
mod sbom;
mod signature;

pub use attestation::{generate as generate_attestation, Attestation};
pub use checksum::{sha256sum, sha512sum, write_sidecars};
pub use error::{Error, Result};
pub use hardening::{analyze, analyze_elf, analyze_macho, parse_library_name, BinaryAnalysis, Relro};
pub use osv::{infer_ecosystem, query as query_vulnerabilities, Severity, Vulnerability};
pub use report::{should_block_build, SecurityReport};
pub use sbom::{generate as generate_sbom, Component, Hash, Sbom};
pub use signature::{import_keys, verify_detached};
