//! Pre-flight checks for framescope
//!
//! Validates that the target can be read before a sampler is started.
//! Provides clear, actionable error messages when requirements aren't met.

#![allow(unsafe_code)] // geteuid() requires unsafe

use anyhow::{bail, Context, Result};
use log::debug;
use object::{Object, ObjectSection};
use std::path::Path;

use crate::domain::Pid;

const PTRACE_SCOPE_PATH: &str = "/proc/sys/kernel/yama/ptrace_scope";

/// Yama mode in which no process may attach or read, regardless of privilege
const PTRACE_SCOPE_DISABLED: u32 = 3;

/// Run all pre-flight checks for `pid` and its runtime image
pub fn run_preflight_checks(pid: Pid, binary_path: &str, quiet: bool) -> Result<()> {
    check_process_exists(pid)?;
    check_proc_access(pid)?;
    check_binary_exists(binary_path)?;
    check_read_permission(pid, quiet)?;
    check_runtime_symbols(binary_path, quiet)?;
    Ok(())
}

/// Check that cross-process reads of `pid` can be allowed at all
///
/// Root passes unless Yama forbids every attach. Other users must own the
/// target; Yama's restricted mode is only reported, since a parent may still
/// read its children.
fn check_read_permission(pid: Pid, quiet: bool) -> Result<()> {
    let scope = read_ptrace_scope();
    if scope == Some(PTRACE_SCOPE_DISABLED) {
        bail!(
            "Permission denied: kernel.yama.ptrace_scope is {PTRACE_SCOPE_DISABLED}, \
             cross-process reads are disabled.\n\n\
             No user can read {pid} until the system is rebooted with a lower scope."
        );
    }

    let euid = unsafe { libc::geteuid() };
    if euid == 0 {
        return Ok(());
    }

    if let Some(owner) = process_owner(pid) {
        if owner != euid {
            bail!(
                "Permission denied: {pid} is owned by uid {owner}, framescope runs as uid {euid}.\n\n\
                 Run with: sudo framescope ..."
            );
        }
    }

    if let Some(scope) = scope.filter(|s| !quiet && *s > 0) {
        eprintln!("warning: ptrace_scope is {scope}, reads may be refused without root");
    }
    Ok(())
}

fn read_ptrace_scope() -> Option<u32> {
    let content = std::fs::read_to_string(PTRACE_SCOPE_PATH).ok()?;
    let scope = content.trim().parse().ok();
    debug!("ptrace_scope: {scope:?}");
    scope
}

/// Real uid of `pid`, from the `Uid:` line of `/proc/<pid>/status`
fn process_owner(pid: Pid) -> Option<u32> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid.0)).ok()?;
    parse_status_uid(&status)
}

fn parse_status_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

/// Check if the runtime image exists and is readable
fn check_binary_exists(binary_path: &str) -> Result<()> {
    let path = Path::new(binary_path);
    if !path.exists() {
        bail!(
            "Binary not found: {}\n\n\
             Make sure the path is correct and the binary exists.",
            binary_path
        );
    }
    if !path.is_file() {
        bail!(
            "Not a file: {}\n\n\
             --binary must point to an executable file, not a directory.",
            binary_path
        );
    }
    Ok(())
}

/// Warn when the image has no symbol table to find anchors in
fn check_runtime_symbols(binary_path: &str, quiet: bool) -> Result<()> {
    if quiet {
        return Ok(());
    }

    let file_data = std::fs::read(binary_path)
        .with_context(|| format!("Failed to read binary: {binary_path}"))?;

    let Ok(obj) = object::File::parse(&*file_data) else {
        // Not a valid object file, anchor resolution reports it
        return Ok(());
    };

    let has_symtab = obj.section_by_name(".symtab").is_some_and(|s| s.size() > 0);
    let has_dynsym = obj.section_by_name(".dynsym").is_some_and(|s| s.size() > 0);

    if !has_symtab && !has_dynsym {
        eprintln!("warning: binary stripped, anchors must be passed with --heap-anchor/--frame-anchor");
    }

    Ok(())
}

/// Check if the target process exists
pub fn check_process_exists(pid: Pid) -> Result<()> {
    let proc_path = format!("/proc/{}", pid.0);
    if !Path::new(&proc_path).exists() {
        bail!(
            "Process {} not found.\n\n\
             Is the process still running? Check with: ps -p {}",
            pid.0,
            pid.0
        );
    }
    Ok(())
}

/// Check if we can read the process's memory maps
pub fn check_proc_access(pid: Pid) -> Result<()> {
    let maps_path = format!("/proc/{}/maps", pid.0);
    std::fs::read_to_string(&maps_path).with_context(|| {
        format!(
            "Cannot read {maps_path}\n\n\
             This usually means:\n\
             - The process doesn't exist (check: ps -p {})\n\
             - Permission denied (run with sudo)\n\
             - /proc is not mounted",
            pid.0
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_not_found() {
        let result = check_binary_exists("/nonexistent/path/to/binary");
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Binary not found"));
    }

    #[test]
    fn test_binary_is_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_binary_exists(dir.path().to_str().unwrap()).unwrap_err().to_string();
        assert!(err.contains("Not a file"));
    }

    #[test]
    fn test_process_not_found() {
        let result = check_process_exists(Pid(999_999_999));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("not found"));
    }

    #[test]
    fn test_own_process_accessible() {
        check_process_exists(Pid::current()).unwrap();
        check_proc_access(Pid::current()).unwrap();
    }

    #[test]
    fn test_parse_status_uid() {
        let status = "Name:\tphp-fpm\nState:\tS (sleeping)\nUid:\t33\t33\t33\t33\nGid:\t33\t33\t33\t33\n";
        assert_eq!(parse_status_uid(status), Some(33));
        assert_eq!(parse_status_uid("Name:\tx\n"), None);
    }

    #[test]
    fn test_non_object_file_is_not_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"#!/bin/sh\n").unwrap();
        assert!(check_runtime_symbols(file.path().to_str().unwrap(), false).is_ok());
    }
}
