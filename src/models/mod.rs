//! Core data types shared across Hermit's confinement and execution
//! subsystem: the [`Action`] model planners emit, the [`Plan`]/[`PlanStep`]
//! graph they commit to, the executor's per-run [`ExecutionContext`], the
//! [`PolicyResult`]/[`RiskLevel`] the policy engine returns, and the
//! [`HermitConfig`] persisted at `~/.hermit/config.json`.

mod action;
mod config;
mod plan;
mod policy;

pub use action::{escape_single_quotes, Action, FileType};
pub use config::{
    CgroupSettings, ExtensionMap, HermitConfig, LlmSettings, MountPair, Preferences,
    SafetySettings,
};
pub use plan::{ExecutionContext, ExecutionSummary, Plan, PlanStep, StepResult};
pub use policy::{PolicyResult, RiskLevel};
