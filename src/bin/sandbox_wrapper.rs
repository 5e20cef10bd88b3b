//! `hermit-sandbox-wrapper`: runs INSIDE the sandbox, as the chroot's own
//! init process. Installs the seccomp filter, then execs the user's command
//! through bash so brace expansion and globbing work the way the planner's
//! rendered commands expect.
//!
//! Takes over the process image via `execvp` rather than spawning a child —
//! there is no parent left to wait on once this process is the sandbox's
//! pid-1 equivalent, and exiting here would tear down the new pid namespace.

use std::os::unix::process::CommandExt;

use hermit::launcher::seccomp;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("usage: hermit-sandbox-wrapper <command>");
        std::process::exit(1);
    }
    let command = args.join(" ");

    if let Err(e) = seccomp::install_filter() {
        eprintln!("hermit-sandbox-wrapper: failed to install seccomp filter: {e}");
        std::process::exit(1);
    }

    // LC_ALL/LANG pinned to C: the sandbox has no locale data installed, and
    // coreutils' locale-aware sorting/formatting would otherwise fall back
    // to slow or inconsistent behavior trying to probe for it.
    let error = std::process::Command::new("/bin/bash")
        .arg("-c")
        .arg(format!("export LC_ALL=C LANG=C; {command}"))
        .exec();

    eprintln!("hermit-sandbox-wrapper: failed to exec /bin/bash: {error}");
    std::process::exit(1);
}
