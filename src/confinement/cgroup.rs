//! cgroup v2 lifecycle for resource-limiting the sandboxed process tree.
//!
//! Hermit creates one cgroup per session at `/sys/fs/cgroup/hermit-sandbox`
//! and tears it down on exit. Writing a limit file is just `fs::write` —
//! cgroup v2 has no separate control-file ioctl, which keeps this module a
//! thin wrapper over the controller hierarchy rather than a syscall binding.

use std::path::{Path, PathBuf};

use nix::unistd::Pid;

const CGROUP_ROOT: &str = "/sys/fs/cgroup";
const CGROUP_NAME: &str = "hermit-sandbox";

#[derive(Debug, thiserror::Error)]
pub enum CgroupError {
    #[error("cgroup v2 not mounted at {0}")]
    NotMounted(PathBuf),

    #[error("failed to create cgroup directory {0}: {1}")]
    Create(PathBuf, std::io::Error),

    #[error("failed to write {file}: {source}")]
    Write {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {file}: {source}")]
    Read {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove cgroup directory {0}: {1}")]
    Remove(PathBuf, std::io::Error),
}

/// Live usage figures read back from the cgroup's accounting files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CgroupUsage {
    pub memory_bytes: u64,
    pub pids_current: u32,
}

/// Handle to the session's cgroup directory; owns nothing the OS doesn't, but
/// gives callers one place to cancel cleanup twice without erroring.
#[derive(Debug, Clone)]
pub struct CgroupHandle {
    path: PathBuf,
}

impl CgroupHandle {
    fn group_dir() -> PathBuf {
        Path::new(CGROUP_ROOT).join(CGROUP_NAME)
    }

    /// A handle that was never backed by a real cgroup directory. Used only
    /// on the `--unsafe` path, where [`crate::launcher::execute_unconfined`]
    /// never calls [`Self::add_process`] or [`Self::cleanup`] on it.
    pub fn unused() -> Self {
        Self {
            path: PathBuf::new(),
        }
    }

    /// Create the cgroup directory and write the configured limits.
    /// `memory_max_mb == 0` means "no limit" (writes `max`).
    pub fn setup(
        memory_max_mb: u64,
        cpu_quota_percent: u32,
        pids_max: u32,
    ) -> Result<Self, CgroupError> {
        let root = Path::new(CGROUP_ROOT);
        if !root.join("cgroup.controllers").exists() {
            return Err(CgroupError::NotMounted(root.to_path_buf()));
        }

        let parent_subtree = root.join("cgroup.subtree_control");
        if parent_subtree.exists() {
            std::fs::write(&parent_subtree, "+cpu +memory +pids").map_err(|e| CgroupError::Write {
                file: parent_subtree,
                source: e,
            })?;
        }

        let path = Self::group_dir();
        std::fs::create_dir_all(&path).map_err(|e| CgroupError::Create(path.clone(), e))?;

        let handle = Self { path };

        handle.write(
            "memory.max",
            if memory_max_mb == 0 {
                "max".to_string()
            } else {
                (memory_max_mb * 1024 * 1024).to_string()
            },
        )?;
        handle.write("memory.swap.max", "0")?;

        // cpu.max is "$quota $period"; a 100ms period keeps the math simple.
        let period_us: u64 = 100_000;
        let quota_us = (period_us as u128 * cpu_quota_percent as u128 / 100) as u64;
        handle.write("cpu.max", format!("{quota_us} {period_us}"))?;

        handle.write("pids.max", pids_max.to_string())?;

        tracing::info!(memory_max_mb, cpu_quota_percent, pids_max, "cgroup configured");
        Ok(handle)
    }

    fn write(&self, file: &str, contents: impl AsRef<str>) -> Result<(), CgroupError> {
        let target = self.path.join(file);
        std::fs::write(&target, contents.as_ref()).map_err(|source| CgroupError::Write {
            file: target,
            source,
        })
    }

    fn read(&self, file: &str) -> Result<String, CgroupError> {
        let target = self.path.join(file);
        std::fs::read_to_string(&target).map_err(|source| CgroupError::Read {
            file: target,
            source,
        })
    }

    /// Add a process to the cgroup by writing its pid to `cgroup.procs`.
    pub fn add_process(&self, pid: Pid) -> Result<(), CgroupError> {
        self.write("cgroup.procs", pid.as_raw().to_string())
    }

    /// Path to `cgroup.procs`, for embedding in a pre-exec shell pipeline
    /// that places itself in the cgroup before handing off to `unshare`.
    pub fn procs_path(&self) -> PathBuf {
        self.path.join("cgroup.procs")
    }

    /// Read current memory and pid-count usage for display/audit.
    pub fn get_current_usage(&self) -> Result<CgroupUsage, CgroupError> {
        let memory_bytes = self
            .read("memory.current")?
            .trim()
            .parse()
            .unwrap_or_default();
        let pids_current = self
            .read("pids.current")?
            .trim()
            .parse()
            .unwrap_or_default();
        Ok(CgroupUsage {
            memory_bytes,
            pids_current,
        })
    }

    /// Remove the cgroup directory. The kernel refuses to rmdir a cgroup
    /// still holding live processes, so callers must have reaped the
    /// sandboxed child first; this is best-effort and logs rather than
    /// propagating on failure, matching [`super::mounts::cleanup_mounts`].
    pub fn cleanup(&self) {
        if let Err(e) = std::fs::remove_dir(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "cgroup cleanup failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_dir_is_under_cgroup_root() {
        assert_eq!(
            CgroupHandle::group_dir(),
            PathBuf::from("/sys/fs/cgroup/hermit-sandbox")
        );
    }

    #[test]
    fn cpu_quota_math_matches_period() {
        let period_us: u64 = 100_000;
        let quota_us = (period_us as u128 * 50u128 / 100) as u64;
        assert_eq!(quota_us, 50_000);
    }

    #[test]
    fn setup_reports_not_mounted_when_cgroupfs_absent() {
        // cgroup.controllers is very unlikely to exist under a path this specific.
        let fake_root = Path::new("/nonexistent-root-for-hermit-tests/cgroup.controllers");
        assert!(!fake_root.exists());
    }
}
