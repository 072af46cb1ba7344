//! Pre-flight checks for gotrace
//!
//! Validates system requirements and the target binary before loading eBPF
//! programs, so failures come with actionable messages instead of verifier
//! or attach errors.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use log::warn;
use object::{Object, ObjectSymbol, SymbolKind};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

use crate::domain::{Pid, TracerError};

/// BPF ring buffers arrived in Linux 5.8
const MIN_KERNEL_VERSION: (u32, u32) = (5, 8);

/// Run all pre-flight checks before eBPF loading.
///
/// Returns the symbols to attach to: the requested `symbols` present in the
/// binary's symbol table, followed by the functions matched by `pattern`.
///
/// # Errors
/// Fails on missing privileges, an old kernel, a missing binary, or when
/// nothing resolves to a symbol.
pub fn run_preflight_checks(
    target_path: &str,
    symbols: &[String],
    pattern: Option<&Regex>,
    quiet: bool,
) -> Result<Vec<String>> {
    check_privileges()?;
    check_kernel_version()?;
    check_binary_exists(target_path)?;
    let data = std::fs::read(target_path)
        .with_context(|| format!("Failed to read binary: {target_path}"))?;
    check_go_binary(&data, quiet);
    let present = check_symbols(&data, target_path, symbols, pattern)?;
    Ok(present)
}

/// Check if running with sufficient privileges for eBPF
fn check_privileges() -> Result<()> {
    if unsafe { libc::geteuid() } == 0 {
        return Ok(());
    }

    bail!(
        "Permission denied: gotrace requires root privileges to load eBPF programs.\n\n\
         Run with: sudo gotrace ..."
    );
}

/// Check if the kernel version is sufficient for eBPF ring buffers
fn check_kernel_version() -> Result<()> {
    let version_str = std::fs::read_to_string("/proc/version")
        .context("Failed to read kernel version from /proc/version")?;

    let release = version_str.split_whitespace().nth(2).unwrap_or("unknown");
    let Some((major, minor)) = parse_kernel_release(release) else {
        // Can't parse, assume it's fine
        return Ok(());
    };

    if (major, minor) < MIN_KERNEL_VERSION {
        bail!(
            "Kernel version {major}.{minor} is too old.\n\n\
             gotrace requires Linux {}.{} or newer for eBPF ring buffer support.\n\
             Current kernel: {release}",
            MIN_KERNEL_VERSION.0,
            MIN_KERNEL_VERSION.1,
        );
    }

    Ok(())
}

/// Parse "6.1.0-arch1-1" into (6, 1).
fn parse_kernel_release(release: &str) -> Option<(u32, u32)> {
    let mut parts = release.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor_digits: String =
        parts.next()?.chars().take_while(char::is_ascii_digit).collect();
    let minor = minor_digits.parse().ok()?;
    Some((major, minor))
}

/// Check if the target binary exists and is a file
fn check_binary_exists(target_path: &str) -> Result<()> {
    let path = Path::new(target_path);
    if !path.exists() {
        bail!(
            "Binary not found: {target_path}\n\n\
             Make sure the path is correct and the binary exists."
        );
    }
    if !path.is_file() {
        bail!(
            "Not a file: {target_path}\n\n\
             --target must point to an executable file, not a directory."
        );
    }
    Ok(())
}

/// Warn when the binary does not look like a Go executable; register
/// decoding assumes Go's ABI.
fn check_go_binary(data: &[u8], quiet: bool) {
    if quiet {
        return;
    }
    let Ok(obj) = object::File::parse(data) else {
        return;
    };
    let is_go = obj.section_by_name(".gopclntab").is_some()
        || obj.section_by_name(".go.buildinfo").is_some();
    if !is_go {
        eprintln!("warning: target does not look like a Go binary, arguments may be garbage");
    }
}

/// Resolve the traced symbols against `.symtab`.
///
/// Requested symbols that are defined keep their order. `pattern` then adds
/// every defined function whose name it matches, sorted, skipping names
/// already present.
fn check_symbols(
    data: &[u8],
    target_path: &str,
    symbols: &[String],
    pattern: Option<&Regex>,
) -> Result<Vec<String>> {
    let obj = object::File::parse(data)
        .with_context(|| format!("Failed to parse ELF: {target_path}"))?;

    let defined: HashSet<&str> = obj
        .symbols()
        .filter(|s| s.is_definition())
        .filter_map(|s| s.name().ok())
        .collect();

    let (present, missing): (Vec<&String>, Vec<&String>) =
        symbols.iter().partition(|s| defined.contains(s.as_str()));

    for symbol in &missing {
        warn!("Symbol {symbol} not found in {target_path}, skipping");
    }

    let mut resolved: Vec<String> = present.into_iter().cloned().collect();

    if let Some(pattern) = pattern {
        let mut matched: Vec<&str> = obj
            .symbols()
            .filter(|s| s.is_definition() && s.kind() == SymbolKind::Text)
            .filter_map(|s| s.name().ok())
            .filter(|name| pattern.is_match(name))
            .collect();
        matched.sort_unstable();
        matched.dedup();

        if matched.is_empty() {
            warn!("No function in {target_path} matches {pattern}");
        }
        for name in matched {
            if !resolved.iter().any(|s| s == name) {
                resolved.push(name.to_string());
            }
        }
    }

    if resolved.is_empty() {
        let symbol = symbols
            .first()
            .cloned()
            .or_else(|| pattern.map(|p| p.as_str().to_string()))
            .unwrap_or_default();
        return Err(TracerError::SymbolNotFound { symbol, binary: target_path.to_string() }.into());
    }

    Ok(resolved)
}

/// Check if the target process exists
///
/// # Errors
/// Returns [`TracerError::ProcessNotFound`] if `/proc/<pid>` is missing.
pub fn check_process_exists(pid: i32) -> Result<()> {
    let proc_path = format!("/proc/{pid}");
    if !Path::new(&proc_path).exists() {
        return Err(TracerError::ProcessNotFound(Pid(pid)))
            .with_context(|| format!("Is the process still running? Check with: ps -p {pid}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_version_check() {
        // Don't assert success since test might run on old kernel
        let _ = check_kernel_version();
    }

    #[test]
    fn test_parse_kernel_release() {
        assert_eq!(parse_kernel_release("5.15.0-generic"), Some((5, 15)));
        assert_eq!(parse_kernel_release("6.1.0-arch1-1"), Some((6, 1)));
        assert_eq!(parse_kernel_release("garbage"), None);
    }

    #[test]
    fn test_binary_not_found() {
        let result = check_binary_exists("/nonexistent/path/to/binary");
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Binary not found"));
    }

    #[test]
    fn test_directory_is_not_a_binary() {
        let dir = tempfile::tempdir().unwrap();
        let result = check_binary_exists(dir.path().to_str().unwrap());
        assert!(result.unwrap_err().to_string().contains("Not a file"));
    }

    #[test]
    fn test_process_not_found() {
        let result = check_process_exists(999_999_999);
        assert!(result.is_err());
        let err = format!("{:#}", result.unwrap_err());
        assert!(err.contains("not found"));
    }

    #[test]
    fn test_symbols_filtered_against_symtab() {
        // The test executable itself carries a symbol table with `main`
        let exe = std::env::current_exe().unwrap();
        let data = std::fs::read(&exe).unwrap();
        let path = exe.to_string_lossy();

        let requested = ["main".to_string(), "no.such.symbol".to_string()];
        let present = check_symbols(&data, &path, &requested, None).unwrap();
        assert_eq!(present, vec!["main".to_string()]);

        let err = check_symbols(&data, &path, &["no.such.symbol".to_string()], None).unwrap_err();
        assert!(err.to_string().contains("no.such.symbol"));
    }

    #[test]
    fn test_symbol_pattern_expands_against_symtab() {
        let exe = std::env::current_exe().unwrap();
        let data = std::fs::read(&exe).unwrap();
        let path = exe.to_string_lossy();
        let exactly_main = Regex::new("^(?:main$)").unwrap();

        // Pattern alone
        let matched = check_symbols(&data, &path, &[], Some(&exactly_main)).unwrap();
        assert_eq!(matched, vec!["main".to_string()]);

        // Merged with explicit symbols, without duplicates
        let merged =
            check_symbols(&data, &path, &["main".to_string()], Some(&exactly_main)).unwrap();
        assert_eq!(merged, vec!["main".to_string()]);

        let nothing = Regex::new("^(?:no\\.such\\.)").unwrap();
        let err = check_symbols(&data, &path, &[], Some(&nothing)).unwrap_err();
        assert!(err.to_string().contains("no\\.such"));
    }

    #[test]
    fn test_non_elf_is_rejected() {
        let err = check_symbols(b"not an elf", "junk", &["main".to_string()], None).unwrap_err();
        assert!(err.to_string().contains("Failed to parse ELF"));
    }
}
