//! Plan data model: the planner's fixed, pre-data commitment and the
//! executor's per-run bookkeeping over it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::RiskLevel;

/// A single step in a plan.
///
/// `action_json` is kept as a raw JSON value (not parsed into an [`Action`](crate::models::Action)
/// up front) because the executor must re-serialize and textually substitute
/// `$STEPn` tokens into it before the final parse — parsing early would
/// throw away the exact text the substitution pass needs to operate on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    pub step_id: u32,
    pub action: serde_json::Value,
    #[serde(default)]
    pub depends_on: Vec<u32>,
    #[serde(default)]
    pub description: String,
}

/// A complete, ordered plan the LLM collaborator committed to before seeing
/// any file contents or command output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Every `depends_on` id must name a step that appears *earlier* in
    /// `steps` (smaller `step_id` is not sufficient on its own — the spec
    /// requires that dependencies name already-completed steps, and in
    /// practice planners emit ids in ascending step order).
    pub fn validate_dependencies(&self) -> Result<(), String> {
        let known: std::collections::HashSet<u32> =
            self.steps.iter().map(|s| s.step_id).collect();
        for step in &self.steps {
            for dep in &step.depends_on {
                if !known.contains(dep) {
                    return Err(format!(
                        "step {} depends on unknown step {}",
                        step.step_id, dep
                    ));
                }
                if *dep >= step.step_id {
                    return Err(format!(
                        "step {} depends on {} which is not an earlier step",
                        step.step_id, dep
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Outcome of executing a single plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: u32,
    pub command: String,
    pub output: String,
    pub success: bool,
    pub risk: RiskLevel,
    pub skipped: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl StepResult {
    pub fn skipped(step_id: u32, command: String, risk: RiskLevel, reason: impl Into<String>) -> Self {
        StepResult {
            step_id,
            command,
            output: String::new(),
            success: false,
            risk,
            skipped: true,
            error: Some(reason.into()),
        }
    }
}

/// Per-plan mutable state the executor owns: accumulated results and the
/// `$STEPn` variable table derived from them. Created at plan start,
/// dropped when the executor returns; never shared across plans.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    pub results: HashMap<u32, StepResult>,
    pub variables: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step's result and, if it succeeded, publish its trimmed
    /// output as `$STEP{n}` for later steps to substitute.
    pub fn record(&mut self, result: StepResult) {
        if result.success {
            self.variables.insert(
                format!("$STEP{}", result.step_id),
                result.output.trim().to_string(),
            );
        }
        self.results.insert(result.step_id, result);
    }

    pub fn dependencies_satisfied(&self, depends_on: &[u32]) -> bool {
        depends_on.iter().all(|dep| {
            self.results
                .get(dep)
                .map(|r| r.success)
                .unwrap_or(false)
        })
    }

    /// Replace every `$STEPn` occurrence in `text` with the recorded output
    /// of step n. Textual and intentionally unescaped: the planner is
    /// instructed to only place tokens where raw substitution is safe.
    pub fn substitute(&self, text: &str) -> String {
        let mut result = text.to_string();
        // Longer keys first so `$STEP10` doesn't get partially clobbered by
        // a `$STEP1` replacement.
        let mut keys: Vec<&String> = self.variables.keys().collect();
        keys.sort_by_key(|k| std::cmp::Reverse(k.len()));
        for key in keys {
            if let Some(value) = self.variables.get(key) {
                result = result.replace(key.as_str(), value);
            }
        }
        result
    }
}

/// Summary counts returned alongside a plan's full result list.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ExecutionSummary {
    pub fn tally(results: &[StepResult]) -> Self {
        let mut summary = ExecutionSummary::default();
        for r in results {
            if r.skipped {
                summary.skipped += 1;
            } else if r.success {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: u32, depends_on: Vec<u32>) -> PlanStep {
        PlanStep {
            step_id: id,
            action: serde_json::json!({"action": "run_command", "command": "true"}),
            depends_on,
            description: String::new(),
        }
    }

    #[test]
    fn validate_dependencies_rejects_unknown_id() {
        let plan = Plan {
            description: String::new(),
            steps: vec![step(1, vec![99])],
        };
        assert!(plan.validate_dependencies().is_err());
    }

    #[test]
    fn validate_dependencies_rejects_forward_reference() {
        let plan = Plan {
            description: String::new(),
            steps: vec![step(1, vec![2]), step(2, vec![])],
        };
        assert!(plan.validate_dependencies().is_err());
    }

    #[test]
    fn validate_dependencies_accepts_backward_reference() {
        let plan = Plan {
            description: String::new(),
            steps: vec![step(1, vec![]), step(2, vec![1])],
        };
        assert!(plan.validate_dependencies().is_ok());
    }

    #[test]
    fn substitution_replaces_step_tokens() {
        let mut ctx = ExecutionContext::new();
        ctx.record(StepResult {
            step_id: 1,
            command: "mkdir -p /workspace/foo".to_string(),
            output: "  /workspace/foo  \n".to_string(),
            success: true,
            risk: RiskLevel::Medium,
            skipped: false,
            error: None,
        });

        let substituted = ctx.substitute(r#"{"action": "read_file", "path": "$STEP1/bar.txt"}"#);
        assert_eq!(
            substituted,
            r#"{"action": "read_file", "path": "/workspace/foo/bar.txt"}"#
        );
    }

    #[test]
    fn dependencies_satisfied_false_when_dependency_missing() {
        let ctx = ExecutionContext::new();
        assert!(!ctx.dependencies_satisfied(&[1]));
    }
}
