//! Seccomp Filter (C5): default-ALLOW, deny-list install.
//!
//! `libseccomp` has no maintained safe Rust binding in this stack, and the
//! spec pins the library to a hardcoded path rather than relying on
//! dynamic-linker search order, so this module `dlopen`s it directly via
//! `libloading` and declares just the four entry points it calls. This runs
//! inside the sandboxed child, immediately before exec — a filter installed
//! after exec would be too late, and one installed in the parent would apply
//! to the wrong process.

use std::ffi::CString;
use std::os::raw::{c_int, c_uint, c_void};

use libloading::{Library, Symbol};

const LIBSECCOMP_PATH: &str = "/usr/lib/libseccomp.so.2";

// From <seccomp.h>. `SCMP_ACT_ALLOW`/`KILL`/`ERRNO` are constructed via the
// macros in the header; ERRNO additionally packs the errno value into the
// upper 16 bits of the action code, which `errno_action` below replicates.
const SCMP_ACT_ALLOW: u32 = 0x7fff_0000;
const SCMP_ACT_KILL: u32 = 0x0000_0000;
const SCMP_ACT_ERRNO_BASE: u32 = 0x0005_0000;

fn errno_action(errno: u16) -> u32 {
    SCMP_ACT_ERRNO_BASE | errno as u32
}

const EPERM: u16 = 1;

/// Syscalls that terminate the process immediately if invoked — anything
/// that could escape or subvert the confinement itself.
pub const KILL_SYSCALLS: &[&str] = &[
    "reboot",
    "kexec_load",
    "kexec_file_load",
    "init_module",
    "finit_module",
    "delete_module",
    "mount",
    "umount",
    "umount2",
    "pivot_root",
    "chroot",
    "ptrace",
    "process_vm_readv",
    "process_vm_writev",
    "sethostname",
    "setdomainname",
    "settimeofday",
    "adjtimex",
    "clock_adjtime",
];

/// Syscalls that return `EPERM` rather than killing the process — mostly
/// networking, which Hermit has no legitimate use for but which callers may
/// probe for availability rather than treat as fatal.
pub const ERRNO_SYSCALLS: &[&str] = &[
    "socket",
    "connect",
    "bind",
    "listen",
    "accept",
    "accept4",
    "sendto",
    "recvfrom",
    "sendmsg",
    "recvmsg",
];

#[derive(Debug, thiserror::Error)]
pub enum SeccompError {
    #[error("failed to load {LIBSECCOMP_PATH}: {0}")]
    LoadLibrary(libloading::Error),

    #[error("seccomp_init returned a null filter context")]
    InitFailed,

    #[error("seccomp_syscall_resolve_name failed for {0}")]
    UnknownSyscall(String),

    #[error("seccomp_rule_add failed for {syscall} (errno {errno})")]
    RuleAdd { syscall: String, errno: c_int },

    #[error("seccomp_load failed with errno {0}")]
    LoadFailed(c_int),
}

type ScmpFilterCtx = *mut c_void;

type SeccompInit = unsafe extern "C" fn(c_uint) -> ScmpFilterCtx;
type SeccompSyscallResolveName = unsafe extern "C" fn(*const i8) -> c_int;
type SeccompRuleAdd = unsafe extern "C" fn(ScmpFilterCtx, c_uint, c_int, c_uint) -> c_int;
type SeccompLoad = unsafe extern "C" fn(ScmpFilterCtx) -> c_int;
type SeccompRelease = unsafe extern "C" fn(ScmpFilterCtx);

/// Install the KILL/ERRNO deny-list into the current process via libseccomp,
/// loaded from its hardcoded path. Must be called after all setup the child
/// still needs privileged syscalls for (mounts, chroot) and immediately
/// before the final `exec` of the user's command.
pub fn install_filter() -> Result<(), SeccompError> {
    // Safety: the library is loaded from a fixed, trusted path and every
    // symbol below is resolved by name and cast to the signature the
    // libseccomp header declares; this function is the sole caller of each.
    unsafe {
        let lib = Library::new(LIBSECCOMP_PATH).map_err(SeccompError::LoadLibrary)?;

        let seccomp_init: Symbol<SeccompInit> =
            lib.get(b"seccomp_init\0").map_err(SeccompError::LoadLibrary)?;
        let resolve_name: Symbol<SeccompSyscallResolveName> = lib
            .get(b"seccomp_syscall_resolve_name\0")
            .map_err(SeccompError::LoadLibrary)?;
        let rule_add: Symbol<SeccompRuleAdd> =
            lib.get(b"seccomp_rule_add\0").map_err(SeccompError::LoadLibrary)?;
        let load: Symbol<SeccompLoad> = lib.get(b"seccomp_load\0").map_err(SeccompError::LoadLibrary)?;
        let release: Symbol<SeccompRelease> =
            lib.get(b"seccomp_release\0").map_err(SeccompError::LoadLibrary)?;

        let ctx = seccomp_init(SCMP_ACT_ALLOW);
        if ctx.is_null() {
            return Err(SeccompError::InitFailed);
        }

        let result = install_rules(&resolve_name, &rule_add, ctx).and_then(|_| {
            let rc = load(ctx);
            if rc != 0 {
                Err(SeccompError::LoadFailed(rc))
            } else {
                Ok(())
            }
        });

        release(ctx);
        result
    }
}

unsafe fn install_rules(
    resolve_name: &Symbol<SeccompSyscallResolveName>,
    rule_add: &Symbol<SeccompRuleAdd>,
    ctx: ScmpFilterCtx,
) -> Result<(), SeccompError> {
    for name in KILL_SYSCALLS {
        add_rule(resolve_name, rule_add, ctx, name, SCMP_ACT_KILL)?;
    }
    for name in ERRNO_SYSCALLS {
        add_rule(resolve_name, rule_add, ctx, name, errno_action(EPERM))?;
    }
    Ok(())
}

unsafe fn add_rule(
    resolve_name: &Symbol<SeccompSyscallResolveName>,
    rule_add: &Symbol<SeccompRuleAdd>,
    ctx: ScmpFilterCtx,
    name: &str,
    action: u32,
) -> Result<(), SeccompError> {
    let c_name = CString::new(name).expect("syscall name has no interior NUL");
    let syscall_nr = resolve_name(c_name.as_ptr());
    if syscall_nr < 0 {
        // Some syscalls in the list (e.g. kexec_file_load) don't exist on
        // every kernel/arch; skip rather than fail the whole filter.
        tracing::debug!(syscall = name, "syscall unknown on this kernel, skipping");
        return Ok(());
    }

    let rc = rule_add(ctx, action, syscall_nr, 0);
    if rc != 0 {
        return Err(SeccompError::RuleAdd {
            syscall: name.to_string(),
            errno: rc,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_action_packs_errno_into_action_code() {
        assert_eq!(errno_action(EPERM), 0x0005_0001);
    }

    #[test]
    fn kill_list_does_not_overlap_errno_list() {
        for k in KILL_SYSCALLS {
            assert!(!ERRNO_SYSCALLS.contains(k), "{k} listed in both tables");
        }
    }

    #[test]
    fn kill_list_covers_core_escape_vectors() {
        for must_have in [
            "mount",
            "umount",
            "umount2",
            "chroot",
            "ptrace",
            "pivot_root",
            "reboot",
            "settimeofday",
            "adjtimex",
            "clock_adjtime",
        ] {
            assert!(KILL_SYSCALLS.contains(&must_have), "{must_have} missing");
        }
    }

    #[test]
    fn errno_list_covers_networking() {
        for must_have in ["socket", "connect", "bind", "listen"] {
            assert!(ERRNO_SYSCALLS.contains(&must_have));
        }
    }

    #[test]
    fn kill_list_matches_spec_enumeration_exactly() {
        assert_eq!(
            KILL_SYSCALLS,
            &[
                "reboot",
                "kexec_load",
                "kexec_file_load",
                "init_module",
                "finit_module",
                "delete_module",
                "mount",
                "umount",
                "umount2",
                "pivot_root",
                "chroot",
                "ptrace",
                "process_vm_readv",
                "process_vm_writev",
                "sethostname",
                "setdomainname",
                "settimeofday",
                "adjtimex",
                "clock_adjtime",
            ]
        );
    }

    #[test]
    fn errno_list_matches_spec_enumeration_exactly() {
        assert_eq!(
            ERRNO_SYSCALLS,
            &[
                "socket", "connect", "bind", "listen", "accept", "accept4", "sendto", "recvfrom",
                "sendmsg", "recvmsg",
            ]
        );
    }
}
