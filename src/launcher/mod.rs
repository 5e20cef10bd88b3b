//! Sandbox Launcher (C4): composes the confinement primitives and the
//! seccomp filter into one sandboxed invocation of a rendered command.
//!
//! The happy path is: a thin `sh -c` wrapper writes its own pid into the
//! session cgroup's `cgroup.procs`, then `exec`s `unshare` into a fresh
//! mount+pid namespace (forking so the new pid-namespace init is a real
//! process) — `exec` preserves both pid and cgroup membership, and the
//! namespace fork inherits its parent's current cgroup, so the rendered
//! command is always placed before it ever runs. `unshare` then `chroot`s
//! into the populated sandbox root and execs
//! [`hermit-sandbox-wrapper`](crate) inside it, which installs the seccomp
//! filter and execs the user's command under `/bin/bash -c`. `--unsafe` (see
//! [`crate::cli`]) skips all of this and runs the command directly on the
//! host — confinement only, never the policy engine, which still gates
//! every command either way.
//!
//! A command that outruns its timeout is killed by signalling its whole
//! process group (the launcher makes the top-level `sh` its own group
//! leader) and reported via the distinguished output string
//! `"Command timed out after N seconds"` rather than an error — the spec
//! treats a timeout as a failed step, not a launch failure.

pub mod seccomp;

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::confinement::{CgroupHandle, ChrootError};

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("sandbox root is not populated: {0}")]
    Chroot(#[from] ChrootError),

    #[error("failed to spawn sandboxed process: {0}")]
    Spawn(std::io::Error),

    #[error("failed to read sandboxed process output: {0}")]
    Output(std::io::Error),
}

/// Escape a command for embedding inside a single-quoted shell argument:
/// `'` becomes `'\''` (close the quote, emit an escaped quote, reopen it).
pub fn escape_for_single_quotes(command: &str) -> String {
    command.replace('\'', r"'\''")
}

fn wrap_single_quoted(command: &str) -> String {
    format!("'{}'", escape_for_single_quotes(command))
}

/// Build the pre-exec shell script: write the shell's own pid into the
/// session cgroup, then `exec` into `unshare`/`chroot`/the wrapper. Keeping
/// this in one string (rather than a `Command` args array) is what lets the
/// pid-write and the `exec` share the same process, closing the race window
/// a parent-writes-child's-pid-after-spawn approach leaves open.
fn build_confinement_script(
    procs_path: &Path,
    sandbox_root: &Path,
    wrapper_relative: &Path,
    quoted_command: &str,
) -> String {
    format!(
        "echo $$ > {} && exec unshare --mount --pid --fork --mount-proc chroot {} {} {}",
        wrap_single_quoted(&procs_path.to_string_lossy()),
        wrap_single_quoted(&sandbox_root.to_string_lossy()),
        wrap_single_quoted(&wrapper_relative.to_string_lossy()),
        quoted_command,
    )
}

/// Run `command` confined by mount/pid namespaces, a chroot, a cgroup, and a
/// seccomp filter; return combined stdout+stderr, truncated by nothing here
/// (the audit sink truncates for its own storage, not this call). A command
/// that runs past `timeout` has its process group killed and the distinguished
/// string `"Command timed out after N seconds"` returned as output, not an
/// error — a timeout is a failed step, not a launch failure.
pub async fn execute_sandboxed(
    command: &str,
    sandbox_root: &Path,
    cgroup: &CgroupHandle,
    timeout_duration: Duration,
) -> Result<String, LaunchError> {
    crate::confinement::validate_sandbox_root(sandbox_root)?;

    let wrapper_path = sandbox_root.join("sandbox").join("hermit-sandbox-wrapper");
    let wrapper_relative = wrapper_path.strip_prefix(sandbox_root).unwrap_or(&wrapper_path);
    let quoted = wrap_single_quoted(command);
    let script = build_confinement_script(&cgroup.procs_path(), sandbox_root, wrapper_relative, &quoted);

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(&script)
        .process_group(0)
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(LaunchError::Spawn)?;

    let pid = child.id();

    let run = async {
        let output = child.wait_with_output().await.map_err(LaunchError::Output)?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        Ok(combined)
    };

    match timeout(timeout_duration, run).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(?timeout_duration, "sandboxed command timed out, killing process group");
            if let Some(pid) = pid {
                let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
            }
            Ok(format!(
                "Command timed out after {} seconds",
                timeout_duration.as_secs()
            ))
        }
    }
}

/// `--unsafe` path: run the command directly on the host, no namespaces, no
/// chroot, no cgroup, no seccomp. The policy engine still runs first and
/// still can refuse the command; this only removes the confinement layer.
pub async fn execute_unconfined(
    command: &str,
    timeout_duration: Duration,
) -> Result<String, LaunchError> {
    let mut child = Command::new("/bin/bash")
        .arg("-c")
        .arg(command)
        .process_group(0)
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(LaunchError::Spawn)?;

    // Close stdin explicitly; some interactive tools wedge on an inherited
    // but unclosed pipe otherwise.
    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.shutdown().await;
    }

    let pid = child.id();

    let run = async {
        let output = child.wait_with_output().await.map_err(LaunchError::Output)?;
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        Ok(combined)
    };

    match timeout(timeout_duration, run).await {
        Ok(result) => result,
        Err(_) => {
            if let Some(pid) = pid {
                let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
            }
            Ok(format!(
                "Command timed out after {} seconds",
                timeout_duration.as_secs()
            ))
        }
    }
}

/// The sandbox root Hermit populates and launches into, by default under the
/// user's state directory so it survives across sessions until explicitly
/// torn down by `hermit-setup --clean`.
pub fn default_sandbox_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("hermit")
        .join("sandbox-root")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_handles_simple_quote() {
        assert_eq!(escape_for_single_quotes("it's"), r"it'\''s");
    }

    #[test]
    fn escape_is_noop_without_quotes() {
        assert_eq!(escape_for_single_quotes("ls -la /tmp"), "ls -la /tmp");
    }

    #[test]
    fn wrap_produces_single_quoted_literal() {
        assert_eq!(wrap_single_quoted("echo hi"), "'echo hi'");
    }

    #[test]
    fn wrap_handles_embedded_single_quotes() {
        assert_eq!(wrap_single_quoted("echo it's"), r"'echo it'\''s'");
    }

    #[test]
    fn default_sandbox_root_ends_in_hermit_sandbox_root() {
        let root = default_sandbox_root();
        assert!(root.ends_with("hermit/sandbox-root"));
    }

    #[test]
    fn confinement_script_writes_pid_before_exec_unshare() {
        let script = build_confinement_script(
            Path::new("/sys/fs/cgroup/hermit-sandbox/cgroup.procs"),
            Path::new("/var/lib/hermit/sandbox-root"),
            Path::new("sandbox/hermit-sandbox-wrapper"),
            "'echo hi'",
        );
        let pid_write_pos = script.find("echo $$ >").unwrap();
        let exec_pos = script.find("exec unshare").unwrap();
        assert!(pid_write_pos < exec_pos, "pid must be written before exec");
        assert!(script.contains("'/sys/fs/cgroup/hermit-sandbox/cgroup.procs'"));
        assert!(script.contains("chroot '/var/lib/hermit/sandbox-root' 'sandbox/hermit-sandbox-wrapper' 'echo hi'"));
    }
}
