//! hermit - a natural-language shell assistant that runs every command it
//! proposes inside a layered Linux sandbox (mount/pid namespaces, chroot,
//! cgroups, seccomp) behind a pattern-based policy engine.
//!
//! # Core Modules
//!
//! - [`models`] - Shared data types: [`models::Action`], [`models::Plan`],
//!   [`models::PolicyResult`], [`models::HermitConfig`]
//! - [`policy`] - Pattern-based command classification (C1)
//! - [`confinement`] - Bind mounts, cgroups, chroot-contract validation (C3)
//! - [`launcher`] - Namespaces + chroot + seccomp composition (C4, C5)
//! - [`planner`] - System prompt and lenient plan parsing (C6)
//! - [`executor`] - Dependency-ordered plan execution with adaptive recovery (C7)
//! - [`audit`] - Append-only record of policy decisions and executions (C8)
//! - [`backends`] - The LLM collaborator seam (no concrete provider)
//! - [`cli`] - The interactive session driver (C9)
//! - [`config`] - `~/.hermit/config.json` load/save/env-override
//! - [`logging`] - Structured logging with sensitive data redaction
//!
//! # Example
//!
//! ```no_run
//! use hermit::models::Action;
//!
//! let action = Action::parse(r#"{"action": "run_command", "command": "ls /workspace"}"#);
//! println!("{}", action.render());
//! ```

pub mod audit;
pub mod backends;
pub mod cli;
pub mod config;
pub mod confinement;
pub mod executor;
pub mod launcher;
pub mod logging;
pub mod models;
pub mod planner;
pub mod policy;

pub use audit::{AuditEvent, AuditRecord, AuditSink, JsonlAuditSink, MemoryAuditSink};
pub use backends::{FixtureBackend, Planner, PlannerError};
pub use config::{ConfigError, ConfigManager};
pub use confinement::{CgroupHandle, CgroupUsage};
pub use executor::{execute_plan, ApprovalGate, AutoApprove};
pub use logging::{LogConfig, LogConfigBuilder, LogError, LogFormat, LogOutput, Logger, Redaction};
pub use models::{
    Action, ExecutionContext, ExecutionSummary, FileType, HermitConfig, MountPair, Plan, PlanStep,
    PolicyResult, RiskLevel, StepResult,
};
pub use planner::{parse_plan, system_prompt, PlanParseError};
