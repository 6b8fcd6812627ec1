//! Binary hardening inspection: ELF on linux, Mach-O on darwin.

use std::fs::File;
use std::path::Path;

use goblin::elf::program_header::{PT_GNU_RELRO, PT_GNU_STACK};
use goblin::elf::Elf;
use memmap2::Mmap;
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relro {
    Disabled,
    Partial,
    Full,
}

#[derive(Debug, Clone, Serialize)]
pub struct BinaryAnalysis {
    pub pie: bool,
    pub relro: Relro,
    pub nx: bool,
    pub stack_canary: bool,
    pub fortify_source: bool,
    pub macho_signed: Option<bool>,
    /// Hardened runtime, mirrored from `macho_signed` on Mach-O; `None` on ELF.
    pub hardened_runtime: Option<bool>,
    /// Imported dynamic library basenames, fed into SBOM generation.
    pub imported_libraries: Vec<String>,
    pub score: f64,
    pub percentage: u32,
}

const TOTAL_CHECKS: f64 = 7.0;

impl BinaryAnalysis {
    fn from_checks(
        pie: bool,
        relro: Relro,
        nx: bool,
        stack_canary: bool,
        fortify_source: bool,
        macho_signed: Option<bool>,
        hardened_runtime: Option<bool>,
        imported_libraries: Vec<String>,
    ) -> Self {
        let passed = [
            pie,
            relro != Relro::Disabled,
            nx,
            stack_canary,
            fortify_source,
            macho_signed.unwrap_or(false),
            hardened_runtime.unwrap_or(false),
        ]
        .iter()
        .filter(|v| **v)
        .count() as f64;

        let score = 10.0 * passed / TOTAL_CHECKS;
        let percentage = (100.0 * passed / TOTAL_CHECKS).round() as u32;

        BinaryAnalysis {
            pie,
            relro,
            nx,
            stack_canary,
            fortify_source,
            macho_signed,
            hardened_runtime,
            imported_libraries,
            score,
            percentage,
        }
    }
}

/// Parse ELF headers/program headers/symbols out of a mapped file.
pub fn analyze_elf(path: &Path) -> Result<BinaryAnalysis> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    let elf = Elf::parse(&mmap).map_err(|e| Error::BinaryParse(e.to_string()))?;

    let pie = elf.header.e_type == goblin::elf::header::ET_DYN;

    let has_gnu_relro = elf
        .program_headers
        .iter()
        .any(|ph| ph.p_type == PT_GNU_RELRO);
    const DT_BIND_NOW: i64 = 24;
    const DT_FLAGS: i64 = 30;
    const DF_BIND_NOW: u64 = 0x8;
    let bind_now = elf.dynamic.as_ref().is_some_and(|dynamic| {
        dynamic.dyns.iter().any(|d| {
            d.d_tag as i64 == DT_BIND_NOW
                || (d.d_tag as i64 == DT_FLAGS && d.d_val & DF_BIND_NOW != 0)
        })
    });
    let relro = if has_gnu_relro && bind_now {
        Relro::Full
    } else if has_gnu_relro {
        Relro::Partial
    } else {
        Relro::Disabled
    };

    let gnu_stack = elf.program_headers.iter().find(|ph| ph.p_type == PT_GNU_STACK);
    let nx = match gnu_stack {
        Some(ph) => ph.p_flags & goblin::elf::program_header::PF_X == 0,
        None => true,
    };

    let stack_canary = elf
        .dynsyms
        .iter()
        .chain(elf.syms.iter())
        .any(|sym| elf.dynstrtab.get_at(sym.st_name) == Some("__stack_chk_fail")
            || elf.strtab.get_at(sym.st_name) == Some("__stack_chk_fail"));

    let fortify_source = elf
        .dynsyms
        .iter()
        .chain(elf.syms.iter())
        .filter_map(|sym| elf.dynstrtab.get_at(sym.st_name).or_else(|| elf.strtab.get_at(sym.st_name)))
        .any(|name| name.ends_with("_chk") && name != "__stack_chk_fail");

    let imported_libraries = elf.libraries.iter().map(|s| s.to_string()).collect();

    Ok(BinaryAnalysis::from_checks(
        pie,
        relro,
        nx,
        stack_canary,
        fortify_source,
        None,
        None,
        imported_libraries,
    ))
}

/// Parse Mach-O headers/segments out of a mapped file.
pub fn analyze_macho(path: &Path) -> Result<BinaryAnalysis> {
    use goblin::mach::header::MH_PIE;
    use goblin::mach::MachO;

    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    let macho = MachO::parse(&mmap, 0).map_err(|e| Error::BinaryParse(e.to_string()))?;

    let pie = macho.header.flags & MH_PIE != 0;
    let signed = macho
        .segments
        .iter()
        .any(|seg| seg.name().map(|n| n == "__LINKEDIT").unwrap_or(false));

    let imported_libraries = macho.libs.iter().map(|s| s.to_string()).collect();

    Ok(BinaryAnalysis::from_checks(
        pie,
        Relro::Disabled,
        true,
        false,
        false,
        Some(signed),
        Some(signed),
        imported_libraries,
    ))
}

/// Dispatch by platform id prefix: `linux-*` -> ELF, `darwin-*` -> Mach-O.
pub fn analyze(path: &Path, platform: &str) -> Result<BinaryAnalysis> {
    if platform.starts_with("darwin") {
        analyze_macho(path)
    } else {
        analyze_elf(path)
    }
}

/// Parse a dynamic-library basename into `(name, version_components)` by
/// stripping the `lib` prefix and splitting trailing dotted numeric runs.
pub fn parse_library_name(basename: &str) -> (String, Vec<String>) {
    let stripped = basename.strip_prefix("lib").unwrap_or(basename);
    let mut parts: Vec<&str> = stripped.split('.').collect();
    let mut version = Vec::new();
    while let Some(last) = parts.last() {
        if last.chars().all(|c| c.is_ascii_digit()) && !last.is_empty() {
            version.insert(0, parts.pop().unwrap().to_string());
        } else {
            break;
        }
    }
    (parts.join("."), version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_versioned_library_basename() {
        let (name, version) = parse_library_name("libssl.so.3.0.2");
        assert_eq!(name, "ssl.so");
        assert_eq!(version, vec!["3", "0", "2"]);
    }

    #[test]
    fn unversioned_library_name_has_no_version() {
        let (name, version) = parse_library_name("libc.so");
        assert_eq!(name, "c.so");
        assert!(version.is_empty());
    }

    #[test]
    fn score_scales_with_passed_checks() {
        let analysis = BinaryAnalysis::from_checks(
            true,
            Relro::Disabled,
            true,
            false,
            false,
            None,
            None,
            Vec::new(),
        );
        assert!(analysis.score > 0.0 && analysis.score < 10.0);
    }
}
