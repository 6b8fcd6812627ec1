//! Sidecar artifact generator (§4.G): `.sha256`, `.sha512`, `.sbom.json`,
//! `.provenance.json`, written alongside the packaged tarball.

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use sha2::{Digest, Sha256, Sha512};

use crate::attestation::Attestation;
use crate::error::Result;
use crate::sbom::Sbom;

const BUF_SIZE: usize = 64 * 1024;

fn hash_file<D: Digest>(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = D::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn sha256sum(path: &Path) -> io::Result<String> {
    hash_file::<Sha256>(path)
}

pub fn sha512sum(path: &Path) -> io::Result<String> {
    hash_file::<Sha512>(path)
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Writes `p.sha256`/`p.sha512` (fatal on failure), then `p.sbom.json`
/// and `p.provenance.json` (failures logged as warnings only).
pub fn write_sidecars(tarball: &Path, sbom: &Sbom, attestation: &Attestation) -> Result<()> {
    let name = basename(tarball);

    let sha256 = sha256sum(tarball)?;
    write_checksum_sidecar(&tarball.with_extra_extension("sha256"), &sha256, &name)?;

    let sha512 = sha512sum(tarball)?;
    write_checksum_sidecar(&tarball.with_extra_extension("sha512"), &sha512, &name)?;

    if let Err(e) = write_json_sidecar(&tarball.with_extra_extension("sbom.json"), sbom) {
        tracing::warn!("failed to write SBOM sidecar: {e}");
    }
    if let Err(e) = write_json_sidecar(&tarball.with_extra_extension("provenance.json"), attestation) {
        tracing::warn!("failed to write provenance sidecar: {e}");
    }

    Ok(())
}

fn write_checksum_sidecar(path: &Path, hex_digest: &str, basename: &str) -> Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{hex_digest}  {basename}")?;
    Ok(())
}

fn write_json_sidecar<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut file = File::create(path)?;
    let json = serde_json::to_string_pretty(value)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

trait ExtraExtension {
    fn with_extra_extension(&self, ext: &str) -> std::path::PathBuf;
}

impl ExtraExtension for Path {
    fn with_extra_extension(&self, ext: &str) -> std::path::PathBuf {
        let mut s = self.as_os_str().to_os_string();
        s.push(".");
        s.push(ext);
        std::path::PathBuf::from(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_matches_known_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello world").unwrap();
        let digest = sha256sum(&path).unwrap();
        assert_eq!(
            digest,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde"
        );
    }

    #[test]
    fn checksum_sidecar_format_matches_spec() {
        let dir = tempfile::tempdir().unwrap();
        let tarball = dir.path().join("tool-1.0.0-linux-amd64.tar.gz");
        std::fs::write(&tarball, b"archive bytes").unwrap();

        let sidecar = tarball.with_extra_extension("sha256");
        let digest = sha256sum(&tarball).unwrap();
        write_checksum_sidecar(&sidecar, &digest, &basename(&tarball)).unwrap();

        let contents = std::fs::read_to_string(&sidecar).unwrap();
        assert_eq!(contents, format!("{digest}  tool-1.0.0-linux-amd64.tar.gz\n"));
    }
}
