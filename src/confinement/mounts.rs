//! Bind-mount lifecycle for the sandbox's workspace directories.
//!
//! Every sandbox path this module returns is the *full* host-filesystem path
//! under the sandbox root (e.g. `<root>/workspace/downloads`), not the
//! in-sandbox path the planner sees (`/workspace/downloads`) — the launcher
//! chroots into `<root>` afterwards, at which point the two coincide.

use std::path::{Path, PathBuf};

use nix::mount::{mount, umount2, MntFlags, MsFlags};

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("host path does not exist: {0}")]
    HostMissing(PathBuf),

    #[error("failed to create sandbox mount point {0}: {1}")]
    CreateMountPoint(PathBuf, std::io::Error),

    #[error("bind mount {host} -> {sandbox} failed: {source}")]
    Bind {
        host: PathBuf,
        sandbox: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("unmount of {0} failed: {1}")]
    Unmount(PathBuf, nix::Error),
}

/// Resolve `~` in a host path the way the config file expects it.
fn expand_host(host: &str) -> PathBuf {
    if let Some(rest) = host.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(host)
}

fn sandbox_full_path(sandbox_root: &Path, sandbox_path: &str) -> PathBuf {
    sandbox_root.join(sandbox_path.trim_start_matches('/'))
}

/// Mount a single configured directory into the sandbox. Returns the full
/// sandbox-side path on success.
pub fn mount_one(
    sandbox_root: &Path,
    host: &str,
    sandbox: &str,
) -> Result<PathBuf, MountError> {
    let host_full = expand_host(host);
    if !host_full.exists() {
        return Err(MountError::HostMissing(host_full));
    }

    let sandbox_full = sandbox_full_path(sandbox_root, sandbox);
    std::fs::create_dir_all(&sandbox_full)
        .map_err(|e| MountError::CreateMountPoint(sandbox_full.clone(), e))?;

    mount(
        Some(&host_full),
        &sandbox_full,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|source| MountError::Bind {
        host: host_full,
        sandbox: sandbox_full.clone(),
        source,
    })?;

    tracing::info!(host, sandbox, "mounted into sandbox");
    Ok(sandbox_full)
}

/// Unmount a single previously-mounted sandbox path.
pub fn unmount_one(sandbox_full: &Path) -> Result<(), MountError> {
    umount2(sandbox_full, MntFlags::MNT_DETACH)
        .map_err(|e| MountError::Unmount(sandbox_full.to_path_buf(), e))
}

/// Mount every configured `(host, sandbox)` pair. Per-entry failures (host
/// missing, bind failed) are logged and skipped — a partially-available
/// workspace is still usable. Returns the sandbox-side paths that mounted
/// successfully, the runtime "mount set" the caller must eventually pass to
/// [`cleanup_mounts`].
pub fn setup_mounts(sandbox_root: &Path, pairs: &[(String, String)]) -> Vec<PathBuf> {
    let mut mounted = Vec::new();
    for (host, sandbox) in pairs {
        match mount_one(sandbox_root, host, sandbox) {
            Ok(path) => mounted.push(path),
            Err(e) => tracing::warn!(host, sandbox, error = %e, "mount failed, continuing"),
        }
    }
    mounted
}

/// Unmount every path in `mounted`, best-effort. Failures are logged and
/// skipped — teardown must never block session exit. Idempotent: calling it
/// twice on an already-emptied list is a no-op, and the caller is expected to
/// drain the list (e.g. `std::mem::take`) so a repeated call sees nothing.
pub fn cleanup_mounts(mounted: &[PathBuf]) {
    for path in mounted {
        if let Err(e) = unmount_one(path) {
            tracing::warn!(path = %path.display(), error = %e, "unmount failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_host_resolves_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_host("~/Downloads"), home.join("Downloads"));
        }
    }

    #[test]
    fn expand_host_leaves_absolute_paths_untouched() {
        assert_eq!(expand_host("/opt/data"), PathBuf::from("/opt/data"));
    }

    #[test]
    fn sandbox_full_path_strips_leading_slash() {
        let root = Path::new("/tmp/sandbox-root");
        assert_eq!(
            sandbox_full_path(root, "/workspace/downloads"),
            PathBuf::from("/tmp/sandbox-root/workspace/downloads")
        );
    }

    #[test]
    fn setup_mounts_skips_missing_host_paths() {
        let temp = tempfile::tempdir().unwrap();
        let pairs = vec![(
            "/definitely/does/not/exist/hermit-test".to_string(),
            "/workspace/x".to_string(),
        )];
        let mounted = setup_mounts(temp.path(), &pairs);
        assert!(mounted.is_empty());
    }
}
