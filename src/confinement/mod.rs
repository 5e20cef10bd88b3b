//! Confinement Primitives (C3): the bind-mount, cgroup, and chroot-contract
//! layers the launcher composes into one sandboxed invocation. Each
//! submodule owns its own lifecycle and error type, matching the original
//! Python's `mounts.py`/`cgroups.py` split.

pub mod cgroup;
pub mod chroot;
pub mod mounts;

pub use cgroup::{CgroupError, CgroupHandle, CgroupUsage};
pub use chroot::{validate_sandbox_root, ChrootError, REQUIRED_BINARIES, REQUIRED_PATHS};
pub use mounts::{cleanup_mounts, mount_one, setup_mounts, unmount_one, MountError};
