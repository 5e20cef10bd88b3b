//! `hermit-setup`: populates a sandbox root with everything the
//! chroot-populator contract (see [`hermit::confinement::chroot`]) requires —
//! a minimal directory skeleton, the required binaries and their shared
//! library closures, `/etc` stubs, device nodes, and the in-sandbox wrapper
//! binary. Mirrors the original `setup_sandbox.py` step for step; ldd-based
//! dependency resolution replaces dlopen-path patching since the wrapper
//! here is a static Rust binary, not a Python script needing its own
//! library search path.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use nix::sys::stat::{makedev, mknod, Mode, SFlag};

use hermit::confinement::chroot::REQUIRED_BINARIES;

#[derive(Parser, Debug)]
#[command(name = "hermit-setup")]
#[command(about = "Populate a sandbox root for hermit to chroot into")]
struct Args {
    /// Where to build the sandbox root. Defaults to the same path
    /// `hermit`'s launcher chroots into.
    #[arg(long)]
    root: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let root = args.root.unwrap_or_else(hermit::launcher::default_sandbox_root);

    println!();
    println!("  {}", "Setting up hermit sandbox".bold());
    println!("  {}", format!("Location: {}", root.display()).dimmed());
    println!();

    if !nix::unistd::geteuid().is_root() {
        println!("  {} not running as root — some steps may fail", "!".yellow());
        println!();
    }

    run_step("Creating directories", || setup_directory_structure(&root));
    run_step("Copying binaries", || copy_required_binaries(&root));
    run_step("Copying Python stdlib", || copy_python_stdlib(&root));
    run_step("Copying libseccomp", || copy_libseccomp(&root));
    run_step("Creating symlinks", || create_python_symlink(&root));
    run_step("Setting up /etc", || setup_etc_files(&root));
    run_step("Creating /dev nodes", || setup_dev_nodes(&root));
    run_step("Installing sandbox wrapper", || install_wrapper_binary(&root));

    println!();
    println!("  {} {}", "✓".green(), "Sandbox ready!".bold());
    println!();
}

fn run_step(message: &str, step: impl FnOnce() -> Result<(), String>) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("  {spinner} {msg}")
            .unwrap()
            .tick_chars("◐◓◑◒◐"),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = step();
    spinner.finish_and_clear();

    match result {
        Ok(()) => println!("  {} {message}", "✓".green()),
        Err(e) => println!("  {} {message}: {e}", "✗".red()),
    }
}

fn setup_directory_structure(root: &Path) -> Result<(), String> {
    const DIRS: &[&str] = &[
        "bin",
        "sbin",
        "usr/bin",
        "usr/lib",
        "lib",
        "lib64",
        "lib/x86_64-linux-gnu",
        "etc",
        "dev",
        "tmp",
        "proc",
        "workspace",
        "sandbox",
    ];
    for d in DIRS {
        std::fs::create_dir_all(root.join(d)).map_err(|e| e.to_string())?;
    }
    std::fs::set_permissions(root.join("tmp"), std::fs::Permissions::from_mode(0o1777))
        .map_err(|e| e.to_string())?;
    Ok(())
}

/// Shared-library dependencies of `binary`, resolved via `ldd` the same way
/// the original Python tool does — parsing `ldd`'s output is the closest
/// thing to a portable dependency closure without reimplementing an ELF
/// loader.
fn ldd_dependencies(binary: &Path) -> Vec<PathBuf> {
    let Ok(output) = std::process::Command::new("ldd").arg(binary).output() else {
        return Vec::new();
    };
    let text = String::from_utf8_lossy(&output.stdout);
    let mut libs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.contains("=>") && !line.contains("not found") {
            if let Some(path) = line.split("=>").nth(1) {
                if let Some(path) = path.trim().split_whitespace().next() {
                    if path.starts_with('/') {
                        libs.push(PathBuf::from(path));
                    }
                }
            }
        } else if line.starts_with('/') {
            if let Some(path) = line.split_whitespace().next() {
                libs.push(PathBuf::from(path));
            }
        }
    }
    libs
}

fn copy_into_sandbox(root: &Path, host_path: &Path) -> Result<(), String> {
    let Ok(relative) = host_path.strip_prefix("/") else {
        return Err(format!("expected an absolute path: {}", host_path.display()));
    };
    let dest = root.join(relative);
    if dest.exists() {
        return Ok(());
    }
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
    }
    std::fs::copy(host_path, &dest).map_err(|e| e.to_string())?;
    Ok(())
}

fn copy_binary_with_deps(root: &Path, binary: &str) -> Result<(), String> {
    let host_path = Path::new(binary);
    if !host_path.exists() {
        return Err(format!("not found on host: {binary}"));
    }
    copy_into_sandbox(root, host_path)?;
    std::fs::set_permissions(root.join(binary.trim_start_matches('/')), std::fs::Permissions::from_mode(0o755))
        .map_err(|e| e.to_string())?;
    for lib in ldd_dependencies(host_path) {
        copy_into_sandbox(root, &lib)?;
    }
    Ok(())
}

fn copy_required_binaries(root: &Path) -> Result<(), String> {
    let mut missing = Vec::new();
    for binary in REQUIRED_BINARIES {
        if let Err(e) = copy_binary_with_deps(root, binary) {
            missing.push(format!("{binary}: {e}"));
        }
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(missing.join("; "))
    }
}

fn copy_python_stdlib(root: &Path) -> Result<(), String> {
    let candidates = ["/usr/lib/python3.12", "/usr/lib/python3.11", "/usr/lib/python3.10"];
    let Some(src) = candidates.iter().map(Path::new).find(|p| p.exists()) else {
        return Err("no python3 stdlib found on host".to_string());
    };
    let dest = root.join(src.strip_prefix("/").unwrap());
    if dest.exists() {
        return Ok(());
    }
    copy_dir_recursive(src, &dest)
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<(), String> {
    std::fs::create_dir_all(dest).map_err(|e| e.to_string())?;
    for entry in std::fs::read_dir(src).map_err(|e| e.to_string())? {
        let entry = entry.map_err(|e| e.to_string())?;
        let dest_path = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| e.to_string())?;
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else if file_type.is_symlink() {
            if let Ok(target) = std::fs::read_link(entry.path()) {
                let _ = std::os::unix::fs::symlink(target, &dest_path);
            }
        } else {
            std::fs::copy(entry.path(), &dest_path).map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

/// Copies libseccomp (and its libffi dependency) to both its usual
/// distro-path location and the hardcoded `/usr/lib/libseccomp.so.2` that
/// [`hermit::launcher::seccomp`] dlopens by fixed path.
fn copy_libseccomp(root: &Path) -> Result<(), String> {
    let candidates = [
        "/lib/x86_64-linux-gnu/libseccomp.so.2",
        "/usr/lib/x86_64-linux-gnu/libseccomp.so.2",
        "/usr/lib64/libseccomp.so.2",
    ];
    let Some(src) = candidates.iter().map(Path::new).find(|p| p.exists()) else {
        return Err("libseccomp.so.2 not found on host".to_string());
    };

    copy_into_sandbox(root, src)?;

    let hardcoded_dest = root.join("usr/lib/libseccomp.so.2");
    if !hardcoded_dest.exists() {
        if let Some(parent) = hardcoded_dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        std::fs::copy(src, &hardcoded_dest).map_err(|e| e.to_string())?;
    }

    for lib in ["/lib/x86_64-linux-gnu/libffi.so.8", "/usr/lib/x86_64-linux-gnu/libffi.so.8"] {
        let path = Path::new(lib);
        if path.exists() {
            copy_into_sandbox(root, path)?;
            break;
        }
    }
    Ok(())
}

fn create_python_symlink(root: &Path) -> Result<(), String> {
    let link = root.join("usr/bin/python");
    if link.exists() {
        return Ok(());
    }
    std::os::unix::fs::symlink("/usr/bin/python3", &link).map_err(|e| e.to_string())
}

fn setup_etc_files(root: &Path) -> Result<(), String> {
    let etc = root.join("etc");
    std::fs::create_dir_all(&etc).map_err(|e| e.to_string())?;
    std::fs::write(
        etc.join("passwd"),
        "root:x:0:0:root:/root:/bin/sh\nnobody:x:65534:65534:nobody:/:/bin/false\n",
    )
    .map_err(|e| e.to_string())?;
    std::fs::write(etc.join("group"), "root:x:0:\nnogroup:x:65534:\n").map_err(|e| e.to_string())?;
    std::fs::write(
        etc.join("nsswitch.conf"),
        "passwd: files\ngroup: files\nhosts: files\n",
    )
    .map_err(|e| e.to_string())
}

fn setup_dev_nodes(root: &Path) -> Result<(), String> {
    let dev = root.join("dev");
    std::fs::create_dir_all(&dev).map_err(|e| e.to_string())?;

    let nodes: &[(&str, u32, u64, u64)] = &[
        ("null", 0o666, 1, 3),
        ("zero", 0o666, 1, 5),
        ("random", 0o666, 1, 8),
        ("urandom", 0o666, 1, 9),
    ];

    let mut failures = Vec::new();
    for (name, mode, major, minor) in nodes {
        let path = dev.join(name);
        if path.exists() {
            continue;
        }
        let result = mknod(
            &path,
            SFlag::S_IFCHR,
            Mode::from_bits_truncate(*mode),
            makedev(*major, *minor),
        );
        if let Err(e) = result {
            failures.push(format!("/dev/{name}: {e}"));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures.join("; "))
    }
}

fn install_wrapper_binary(root: &Path) -> Result<(), String> {
    let candidates = [
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join("hermit-sandbox-wrapper"))),
        Some(PathBuf::from("./target/release/hermit-sandbox-wrapper")),
        Some(PathBuf::from("./target/debug/hermit-sandbox-wrapper")),
    ];
    let Some(src) = candidates.into_iter().flatten().find(|p| p.exists()) else {
        return Err("hermit-sandbox-wrapper binary not built alongside hermit-setup".to_string());
    };

    let dest = root.join("sandbox").join("hermit-sandbox-wrapper");
    std::fs::copy(&src, &dest).map_err(|e| e.to_string())?;
    std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(0o755)).map_err(|e| e.to_string())?;
    Ok(())
}
