//! The LLM collaborator seam (spec.md §1, §6): Hermit's planner asks an
//! external component for a completion and never inspects how that
//! component maintains conversation state. This module defines that
//! contract as a trait plus one fixture implementation; no concrete
//! network or embedded model backend lives here — wiring an actual LLM
//! provider in is explicitly out of scope for the core (spec.md §1).

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("planner backend unavailable: {0}")]
    Unavailable(String),

    #[error("planner request timed out after {0}s")]
    Timeout(u64),

    #[error("planner backend error: {0}")]
    Backend(String),
}

/// What the executor's planner stage needs from an LLM collaborator: turn a
/// system prompt + user message into a raw completion string, and reset
/// whatever conversation history the backend keeps between turns (`clear`
/// REPL command). The core never reads that history directly.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn completion(&self, system: &str, user: &str) -> Result<String, PlannerError>;

    /// Reset conversation state. A no-op for stateless backends.
    fn clear_history(&self);
}

/// Offline fixture used by tests and by `--unsafe` manual sessions that
/// have no LLM credentials configured: always returns a canned
/// single-step `run_command` plan echoing the user's request back as a
/// shell comment, so the rest of the pipeline (policy, executor, audit)
/// can still be exercised end-to-end without a network call.
pub struct FixtureBackend;

#[async_trait]
impl Planner for FixtureBackend {
    async fn completion(&self, _system: &str, user: &str) -> Result<String, PlannerError> {
        let escaped = user.replace('\'', r"'\''");
        Ok(format!(
            r#"{{"description": "fixture echo", "steps": [{{"step_id": 1, "description": "echo the request", "depends_on": [], "action": {{"action": "run_command", "command": "echo '{escaped}'"}}}}]}}"#
        ))
    }

    fn clear_history(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_backend_returns_parseable_plan() {
        let backend = FixtureBackend;
        let text = backend.completion("system", "list my downloads").await.unwrap();
        let plan = crate::planner::parse_plan(&text).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[tokio::test]
    async fn fixture_backend_escapes_embedded_quotes() {
        let backend = FixtureBackend;
        let text = backend.completion("system", "say it's done").await.unwrap();
        let plan = crate::planner::parse_plan(&text).unwrap();
        let action = crate::models::Action::from_value(plan.steps[0].action.clone(), "");
        assert!(action.render().contains(r"it'\''s"));
    }
}
