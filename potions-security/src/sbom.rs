//! Minimal CycloneDX 1.4 SBOM generation.

use serde::Serialize;

use crate::hardening::{parse_library_name, BinaryAnalysis};

#[derive(Debug, Clone, Serialize)]
pub struct Hash {
    pub alg: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub component_type: &'static str,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hashes: Vec<Hash>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Sbom {
    #[serde(rename = "bomFormat")]
    pub bom_format: &'static str,
    #[serde(rename = "specVersion")]
    pub spec_version: &'static str,
    pub version: u32,
    pub components: Vec<Component>,
}

/// One `application` component for the artifact, plus one `library`
/// component per imported dynamic library discovered during hardening
/// inspection.
pub fn generate(artifact_name: &str, artifact_sha256: &str, analysis: Option<&BinaryAnalysis>) -> Sbom {
    let mut components = vec![Component {
        component_type: "application",
        name: artifact_name.to_string(),
        version: None,
        hashes: vec![Hash {
            alg: "SHA-256",
            content: artifact_sha256.to_string(),
        }],
    }];

    if let Some(analysis) = analysis {
        for lib in &analysis.imported_libraries {
            let (name, version_parts) = parse_library_name(lib);
            let version = if version_parts.is_empty() {
                None
            } else {
                Some(version_parts.join("."))
            };
            components.push(Component {
                component_type: "library",
                name,
                version,
                hashes: Vec::new(),
            });
        }
    }

    Sbom {
        bom_format: "CycloneDX",
        spec_version: "1.4",
        version: 1,
        components,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardening::Relro;

    #[test]
    fn generates_application_and_library_components() {
        let analysis = BinaryAnalysis {
            pie: true,
            relro: Relro::Full,
            nx: true,
            stack_canary: true,
            fortify_source: true,
            macho_signed: None,
            hardened_runtime: None,
            imported_libraries: vec!["libssl.so.3".to_string()],
            score: 10.0,
            percentage: 100,
        };
        let sbom = generate("kubectl", "deadbeef", Some(&analysis));
        assert_eq!(sbom.components.len(), 2);
        assert_eq!(sbom.components[0].component_type, "application");
        assert_eq!(sbom.components[1].component_type, "library");
        assert_eq!(sbom.components[1].name, "ssl.so");
    }
}
