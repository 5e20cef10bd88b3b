//! Session Driver (C9): REPL glue binding user input → plan → executor →
//! output. This is the one component the spec calls "mechanical" (spec.md
//! §1) — it owns no novel algorithm, only the wiring between the Planner
//! Contract, Executor, Policy Engine (via the executor), and the
//! process-wide handles (mount set, cgroup, audit sink) that must be torn
//! down exactly once on exit (spec.md §5).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;
use dialoguer::{Confirm, Input};

use crate::audit::{AuditSink, JsonlAuditSink, MemoryAuditSink};
use crate::backends::{FixtureBackend, Planner};
use crate::config::ConfigManager;
use crate::confinement::CgroupHandle;
use crate::executor::{execute_plan, ApprovalGate};
use crate::launcher;
use crate::models::{HermitConfig, PlanStep, RiskLevel};
use crate::planner;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("sandbox setup error: {0}")]
    Sandbox(String),

    #[error(transparent)]
    Audit(#[from] anyhow::Error),
}

/// Confirms high-risk/step-by-step steps on the real terminal.
struct TerminalApproval;

impl ApprovalGate for TerminalApproval {
    fn confirm(&self, step: &PlanStep, command: &str, risk: RiskLevel, reason: &str) -> bool {
        let tag = match risk {
            RiskLevel::Blocked => "BLOCKED".red().bold(),
            RiskLevel::High => "HIGH RISK".red().bold(),
            RiskLevel::Medium => "CAUTION".yellow().bold(),
            RiskLevel::Low => "confirm".dimmed(),
        };
        if !step.description.is_empty() {
            println!("  {} {}", "·".dimmed(), step.description.dimmed());
        }
        println!("  {tag} [{risk}]: {reason}");
        println!("  {} {command}", "$".dimmed());
        Confirm::new()
            .with_prompt("Execute this step?")
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Latch ensuring the teardown sequence (unmount, cgroup removal) runs
/// exactly once, whether triggered by `exit`, Ctrl-C, or an early return.
/// Mirrors the original `cleanup_done` module-global (spec.md §5).
#[derive(Clone)]
struct CleanupLatch(Arc<AtomicBool>);

impl CleanupLatch {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Returns `true` the first time it is called; every later call is a
    /// no-op that returns `false`.
    fn fire(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

/// Everything the REPL owns for the lifetime of one session: the loaded
/// config, the process-wide mount/cgroup handles, and the collaborator
/// seams (planner, audit sink).
pub struct Session {
    config_manager: ConfigManager,
    config: HermitConfig,
    sandbox_root: PathBuf,
    mounted: Vec<PathBuf>,
    cgroup: Option<CgroupHandle>,
    audit: Arc<dyn AuditSink>,
    planner: Arc<dyn Planner>,
    unsafe_mode: bool,
    cleanup: CleanupLatch,
}

impl Session {
    /// Build a session: load config, populate the mount set, and stand up
    /// the cgroup, unless `unsafe_mode` skips confinement entirely. Returns
    /// an error only for configuration problems (spec.md §7: fatal at
    /// startup, exit 1); mount/cgroup partial failures are logged and
    /// degrade gracefully instead of aborting the session.
    pub fn bootstrap(unsafe_mode: bool) -> Result<Self, CliError> {
        let config_manager = ConfigManager::new()?;
        let config = config_manager.merge_with_env()?;
        let sandbox_root = launcher::default_sandbox_root();

        let audit: Arc<dyn AuditSink> = match JsonlAuditSink::at_default_path() {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                tracing::warn!(error = %e, "falling back to in-memory audit sink");
                Arc::new(MemoryAuditSink::default())
            }
        };

        let mut mounted = Vec::new();
        let mut cgroup = None;

        if !unsafe_mode {
            mounted = crate::confinement::setup_mounts(&sandbox_root, &config.mount_list());
            if config.cgroups.enabled {
                match CgroupHandle::setup(
                    config.cgroups.memory_max_mb,
                    config.cgroups.cpu_quota_percent,
                    config.cgroups.pids_max,
                ) {
                    Ok(handle) => cgroup = Some(handle),
                    Err(e) => tracing::warn!(error = %e, "cgroup setup failed, continuing without it"),
                }
            }
        }

        Ok(Self {
            config_manager,
            config,
            sandbox_root,
            mounted,
            cgroup,
            audit,
            planner: Arc::new(FixtureBackend),
            unsafe_mode,
            cleanup: CleanupLatch::new(),
        })
    }

    /// Run the interactive REPL until `exit`/`quit`/EOF, then clean up once.
    pub async fn run(&mut self) {
        self.print_banner();

        let cleanup = self.cleanup.clone();
        let sandbox_root = self.sandbox_root.clone();
        let mounted_for_signal = self.mounted.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() && cleanup.fire() {
                println!("\n{}", "Cleaning up...".dimmed());
                crate::confinement::cleanup_mounts(&mounted_for_signal);
                let _ = sandbox_root;
                std::process::exit(0);
            }
        });

        loop {
            let line = match Input::<String>::new().with_prompt("hermit").interact_text() {
                Ok(line) => line,
                Err(_) => break,
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if matches!(line.to_lowercase().as_str(), "exit" | "quit") {
                break;
            }

            self.dispatch(line).await;
        }

        self.cleanup_once();
    }

    fn print_banner(&self) {
        println!(
            r"
       __
      (  )_
     (_____)_
    (________)"
        );
        if self.unsafe_mode {
            println!("  {}", "HERMIT  [UNSAFE MODE]".yellow().bold());
            println!("  {}", "*** No sandbox — be careful! ***".red());
        } else {
            println!("  {}", "HERMIT  [SANDBOXED MODE]".green().bold());
            println!("  Security: namespaces + chroot + seccomp + policy engine");
        }
        println!(
            "  {}\n",
            "Type 'help' for commands, 'exit' to quit".dimmed()
        );
    }

    async fn dispatch(&mut self, line: &str) {
        let mut parts = line.splitn(2, char::is_whitespace);
        let head = parts.next().unwrap_or("").to_lowercase();
        let rest = parts.next().unwrap_or("").trim();

        match head.as_str() {
            "help" | "?" => self.print_help(),
            "tree" => self.print_tree(),
            "audit" => self.print_audit(),
            "clear" => {
                self.planner.clear_history();
                println!("  Conversation history cleared.");
            }
            "mounts" => self.print_mounts(),
            "mount" if !rest.is_empty() => self.mount(rest),
            "unmount" if !rest.is_empty() => self.unmount(rest),
            "config" => self.config_command(rest),
            _ => self.handle_request(line).await,
        }
    }

    fn print_help(&self) {
        println!(
            "  help | ?                         show this message
  tree                              show the sandbox directory tree
  audit                             show the last 10 audit entries
  clear                             reset the planner's conversation history
  mounts                            list active bind mounts
  mount <path>                      mount a configured sandbox directory
  unmount <path>                    unmount a sandbox directory
  config show                       print the current configuration
  config set <key> <value>          set a configuration value
  config add-directory <path>       add a mount under /workspace
  config remove-directory <path>    remove a configured mount
  config reset                      restore default configuration
  exit | quit                       leave hermit"
        );
    }

    fn print_tree(&self) {
        if !self.sandbox_root.exists() {
            println!("  {} sandbox root is not populated yet", "!".yellow());
            return;
        }
        println!("  {}", self.sandbox_root.display());
        print_tree_recursive(&self.sandbox_root, "  ", 0);
    }

    fn print_audit(&self) {
        match self.audit.show_recent(10) {
            Ok(records) if records.is_empty() => println!("  (no audit entries yet)"),
            Ok(records) => {
                for record in records {
                    println!(
                        "  {} {}",
                        record.timestamp.to_rfc3339().dimmed(),
                        describe_event(&record.event)
                    );
                }
            }
            Err(e) => println!("  {} failed to read audit log: {e}", "!".red()),
        }
    }

    fn print_mounts(&self) {
        if self.mounted.is_empty() {
            println!("  (no directories currently mounted)");
            return;
        }
        for (pair, path) in self.config.allowed_directories.iter().zip(&self.mounted) {
            println!("  {}  {} -> {}", "●".green(), pair.host, path.display());
        }
    }

    fn mount(&mut self, sandbox: &str) {
        let Some(pair) = self
            .config
            .allowed_directories
            .iter()
            .find(|m| m.sandbox == sandbox)
            .cloned()
        else {
            println!("  {} no configured mount for {sandbox}", "!".red());
            return;
        };
        match crate::confinement::mount_one(&self.sandbox_root, &pair.host, &pair.sandbox) {
            Ok(path) => {
                self.mounted.push(path);
                println!("  {} mounted {}", "✓".green(), pair.sandbox);
            }
            Err(e) => println!("  {} mount failed: {e}", "✗".red()),
        }
    }

    fn unmount(&mut self, sandbox: &str) {
        let full = self.sandbox_root.join(sandbox.trim_start_matches('/'));
        match self.mounted.iter().position(|p| *p == full) {
            Some(index) => {
                if let Err(e) = crate::confinement::unmount_one(&full) {
                    println!("  {} unmount failed: {e}", "✗".red());
                    return;
                }
                self.mounted.remove(index);
                println!("  {} unmounted {sandbox}", "✓".green());
            }
            None => println!("  {} {sandbox} is not currently mounted", "!".yellow()),
        }
    }

    fn config_command(&mut self, rest: &str) {
        let mut args = rest.splitn(2, char::is_whitespace);
        let sub = args.next().unwrap_or("");
        let tail = args.next().unwrap_or("").trim();

        let result = match sub {
            "show" | "" => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&self.config).unwrap_or_default()
                );
                return;
            }
            "reset" => self.config_manager.reset(),
            "add-directory" if !tail.is_empty() => {
                let sandbox = format!(
                    "/workspace/{}",
                    PathBuf::from(tail)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "custom".to_string())
                );
                self.config_manager.add_directory(tail.to_string(), sandbox)
            }
            "remove-directory" if !tail.is_empty() => self.config_manager.remove_directory(tail),
            "set" => {
                let mut kv = tail.splitn(2, char::is_whitespace);
                let (Some(key), Some(value)) = (kv.next(), kv.next()) else {
                    println!("  usage: config set <key> <value>");
                    return;
                };
                self.set_config_value(key, value.trim())
            }
            _ => {
                println!("  usage: config show | set <key> <value> | add-directory <path> | remove-directory <path> | reset");
                return;
            }
        };

        match result {
            Ok(updated) => {
                self.config = updated;
                println!("  {} configuration updated", "✓".green());
            }
            Err(e) => println!("  {} {e}", "✗".red()),
        }
    }

    fn set_config_value(
        &self,
        key: &str,
        value: &str,
    ) -> Result<HermitConfig, crate::config::ConfigError> {
        use crate::config::ConfigError;
        let mut config = self.config.clone();
        match key {
            "safety.require_confirmation_for_delete" => {
                config.safety.require_confirmation_for_delete = parse_bool(value)?;
            }
            "safety.block_rm_rf" => config.safety.block_rm_rf = parse_bool(value)?,
            "safety.max_files_per_operation" => {
                config.safety.max_files_per_operation = value
                    .parse()
                    .map_err(|_| ConfigError::ValidationError(format!("invalid integer: {value}")))?;
            }
            "preferences.confirm_before_execute" => {
                config.preferences.confirm_before_execute = parse_bool(value)?;
            }
            "cgroups.memory_max_mb" => {
                config.cgroups.memory_max_mb = value
                    .parse()
                    .map_err(|_| ConfigError::ValidationError(format!("invalid integer: {value}")))?;
            }
            "cgroups.cpu_quota_percent" => {
                config.cgroups.cpu_quota_percent = value
                    .parse()
                    .map_err(|_| ConfigError::ValidationError(format!("invalid integer: {value}")))?;
            }
            "cgroups.pids_max" => {
                config.cgroups.pids_max = value
                    .parse()
                    .map_err(|_| ConfigError::ValidationError(format!("invalid integer: {value}")))?;
            }
            "cgroups.timeout_seconds" => {
                config.cgroups.timeout_seconds = value
                    .parse()
                    .map_err(|_| ConfigError::ValidationError(format!("invalid integer: {value}")))?;
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown configuration key: {other}"
                )))
            }
        }
        self.config_manager.save(&config)?;
        Ok(config)
    }

    /// The main path: ask the planner for a plan, parse it, preview it, and
    /// (if the user proceeds) walk it through the executor.
    async fn handle_request(&mut self, user_input: &str) {
        let system_prompt = planner::system_prompt(&self.config.mount_list());
        let raw = match self.planner.completion(&system_prompt, user_input).await {
            Ok(text) => text,
            Err(e) => {
                println!("  {} planner request failed: {e}", "✗".red());
                return;
            }
        };

        let plan = match planner::parse_plan(&raw) {
            Ok(plan) => plan,
            Err(e) => {
                println!("  {} could not parse a plan: {e}", "✗".red());
                println!("  {}", "raw response:".dimmed());
                println!("  {raw}");
                return;
            }
        };

        if plan.is_empty() {
            println!("  (planner returned an empty plan)");
            return;
        }

        println!("  {} {}", "Plan:".bold(), plan.description);
        for step in &plan.steps {
            println!("    {}. {}", step.step_id, step.description);
        }

        if self.config.preferences.confirm_before_execute {
            let proceed = Confirm::new()
                .with_prompt("Run this plan?")
                .default(true)
                .interact()
                .unwrap_or(false);
            if !proceed {
                println!("  Cancelled.");
                return;
            }
        }

        let approval = TerminalApproval;
        let cgroup = match &self.cgroup {
            Some(handle) => handle.clone(),
            None if self.unsafe_mode => {
                // Unsafe mode never touches the cgroup; execute_plan only
                // reads it on the confined path, so a throwaway handle is
                // never dereferenced in that branch.
                return self.run_unsafe_plan(&plan, &approval).await;
            }
            None => {
                println!("  {} sandbox cgroup is not available; cannot run confined", "✗".red());
                return;
            }
        };

        let (results, summary) = execute_plan(
            &plan,
            &self.config,
            &self.sandbox_root,
            &cgroup,
            &approval,
            self.audit.as_ref(),
            false,
            self.unsafe_mode,
        )
        .await;

        self.print_results(&results, summary);
    }

    /// `--unsafe` sessions never create a cgroup at all; `execute_plan`
    /// still takes a `&CgroupHandle` in its signature (the same gate is
    /// reused for both paths), so this passes an unbacked handle that
    /// `unsafe_mode` routes around inside
    /// [`crate::executor::execute_plan`]'s `run_command` dispatch.
    async fn run_unsafe_plan(&self, plan: &crate::models::Plan, approval: &TerminalApproval) {
        let placeholder = CgroupHandle::unused();
        let (results, summary) = execute_plan(
            plan,
            &self.config,
            &self.sandbox_root,
            &placeholder,
            approval,
            self.audit.as_ref(),
            false,
            true,
        )
        .await;
        self.print_results(&results, summary);
    }

    fn print_results(
        &self,
        results: &[crate::models::StepResult],
        summary: crate::models::ExecutionSummary,
    ) {
        for result in results {
            let marker = if result.skipped {
                "·".dimmed()
            } else if result.success {
                "✓".green()
            } else {
                "✗".red()
            };
            println!("  {marker} step {}: {}", result.step_id, result.command);
            if !result.output.trim().is_empty() {
                println!("    {}", result.output.trim());
            }
            if let Some(error) = &result.error {
                println!("    {} {error}", "!".yellow());
            }
        }
        println!(
            "  {} succeeded, {} failed, {} skipped",
            summary.succeeded.to_string().green(),
            summary.failed.to_string().red(),
            summary.skipped.to_string().dimmed()
        );
    }

    fn cleanup_once(&mut self) {
        if !self.cleanup.fire() {
            return;
        }
        if !self.mounted.is_empty() {
            println!("{}", "Cleaning up...".dimmed());
            crate::confinement::cleanup_mounts(&self.mounted);
            self.mounted.clear();
        }
        if let Some(cgroup) = self.cgroup.take() {
            cgroup.cleanup();
        }
        println!("Goodbye!");
    }
}

fn parse_bool(value: &str) -> Result<bool, crate::config::ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(crate::config::ConfigError::ValidationError(format!(
            "expected a boolean, got '{other}'"
        ))),
    }
}

fn describe_event(event: &crate::audit::AuditEvent) -> String {
    use crate::audit::AuditEvent::*;
    match event {
        PolicyCheck { command, risk, reason, .. } => format!("[{risk}] {command} — {reason}"),
        CommandBlocked { command, reason, .. } => format!("BLOCKED {command} — {reason}"),
        CommandExecuted { command, success, .. } => {
            format!("{} {command}", if *success { "ok" } else { "failed" })
        }
        StepSkipped { step_id, reason } => format!("step {step_id} skipped — {reason}"),
    }
}

fn print_tree_recursive(dir: &std::path::Path, prefix: &str, depth: usize) {
    const MAX_DEPTH: usize = 3;
    if depth >= MAX_DEPTH {
        return;
    }
    let Ok(mut entries) = std::fs::read_dir(dir).map(|e| e.flatten().collect::<Vec<_>>()) else {
        return;
    };
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        println!("{prefix}{}", entry.file_name().to_string_lossy());
        if entry.path().is_dir() {
            print_tree_recursive(&entry.path(), &format!("{prefix}  "), depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_latch_fires_exactly_once() {
        let latch = CleanupLatch::new();
        assert!(latch.fire());
        assert!(!latch.fire());
        assert!(!latch.fire());
    }

    #[test]
    fn parse_bool_common_spellings() {
        assert_eq!(parse_bool("yes").unwrap(), true);
        assert_eq!(parse_bool("off").unwrap(), false);
        assert!(parse_bool("maybe").is_err());
    }
}
