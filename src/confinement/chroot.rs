//! The chroot-populator contract.
//!
//! `hermit-setup` (see `sandbox_setup`) is the tool that actually populates a
//! sandbox root; this module only defines what a populated root must
//! contain, so the launcher can refuse to chroot into a half-built one and
//! `hermit-setup` has a single source of truth to build against.

use std::path::{Path, PathBuf};

/// Binaries `hermit-setup` must copy (with their shared-library closure) into
/// the sandbox root for a command of any risk level to have a chance of
/// running. Mirrors `REQUIRED_BINARIES` in the original `setup_sandbox.py`.
pub const REQUIRED_BINARIES: &[&str] = &[
    "/bin/bash",
    "/bin/sh",
    "/bin/ls",
    "/bin/cat",
    "/bin/cp",
    "/bin/mv",
    "/bin/rm",
    "/bin/mkdir",
    "/bin/touch",
    "/bin/echo",
    "/bin/grep",
    "/bin/find",
    "/bin/chmod",
    "/bin/chown",
    "/usr/bin/wc",
    "/usr/bin/head",
    "/usr/bin/tail",
    "/usr/bin/sort",
    "/usr/bin/uniq",
    "/usr/bin/python3",
];

/// Paths relative to the sandbox root that must exist before the launcher
/// will chroot into it.
pub const REQUIRED_PATHS: &[&str] = &[
    "bin/bash",
    "usr/bin/python3",
    "usr/lib/libseccomp.so.2",
    "etc/passwd",
    "etc/group",
    "dev/null",
    "dev/zero",
    "dev/random",
    "dev/urandom",
    "proc",
    "workspace",
    "sandbox",
    "sandbox/hermit-sandbox-wrapper",
];

#[derive(Debug, thiserror::Error)]
pub enum ChrootError {
    #[error("sandbox root does not exist: {0}")]
    RootMissing(PathBuf),

    #[error("sandbox root is missing required paths: {0:?}")]
    Incomplete(Vec<String>),
}

/// Check that `root` looks like a populated sandbox: present on disk and
/// carrying every [`REQUIRED_PATHS`] entry. Does not inspect shared-library
/// closures or file permissions — this is a cheap pre-flight, not a full
/// audit of `hermit-setup`'s work.
pub fn validate_sandbox_root(root: &Path) -> Result<(), ChrootError> {
    if !root.exists() {
        return Err(ChrootError::RootMissing(root.to_path_buf()));
    }

    let missing: Vec<String> = REQUIRED_PATHS
        .iter()
        .filter(|p| !root.join(p).exists())
        .map(|p| p.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ChrootError::Incomplete(missing));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_root() {
        let result = validate_sandbox_root(Path::new("/nonexistent-hermit-sandbox-root"));
        assert!(matches!(result, Err(ChrootError::RootMissing(_))));
    }

    #[test]
    fn rejects_empty_directory() {
        let temp = tempfile::tempdir().unwrap();
        let result = validate_sandbox_root(temp.path());
        assert!(matches!(result, Err(ChrootError::Incomplete(_))));
    }

    #[test]
    fn accepts_fully_populated_root() {
        let temp = tempfile::tempdir().unwrap();
        for p in REQUIRED_PATHS {
            let full = temp.path().join(p);
            if matches!(*p, "proc" | "workspace" | "sandbox") {
                std::fs::create_dir_all(&full).unwrap();
            } else {
                std::fs::create_dir_all(full.parent().unwrap()).unwrap();
                std::fs::write(&full, b"").unwrap();
            }
        }
        assert!(validate_sandbox_root(temp.path()).is_ok());
    }
}
