//! Planner Contract (C6): builds the instruction text sent to the LLM
//! collaborator and forgivingly parses whatever it sends back into a
//! [`Plan`]. Parsing is deliberately lenient — models wrap JSON in fenced
//! code blocks, leave trailing commas, or add a sentence of preamble — but
//! the *plan itself*, once parsed, is never touched again: this is the one
//! point where Hermit trusts free-form model output, and it trusts it once,
//! before any data has been observed (the CaMeL split between control and
//! data the executor then holds to).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Plan;

#[derive(Debug, thiserror::Error)]
pub enum PlanParseError {
    #[error("no JSON object found in planner output")]
    NoJsonFound,

    #[error("failed to parse plan JSON: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error("plan failed dependency validation: {0}")]
    BadDependencies(String),
}

static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());
static TRAILING_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Build the system prompt describing the action schema and the sandbox's
/// available mount points, so the planner only ever proposes paths that
/// exist once chrooted.
pub fn system_prompt(mounts: &[(String, String)]) -> String {
    let mount_lines = if mounts.is_empty() {
        "  (no directories are currently mounted)".to_string()
    } else {
        mounts
            .iter()
            .map(|(host, sandbox)| format!("  {sandbox}  (host: {host})"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are Hermit's planning component. You turn a natural-language request
into a JSON execution plan. You never execute anything yourself and you never
see command output — a separate, sandboxed executor does that after you
commit to this plan.

Available sandbox directories:
{mount_lines}

Respond with a single JSON object of this shape:
{{
  "description": "one-line summary of the plan",
  "steps": [
    {{
      "step_id": 1,
      "description": "what this step does",
      "depends_on": [],
      "action": {{ "action": "list_files", "path": "/workspace/downloads" }}
    }}
  ]
}}

Rules:
- `action` is one of: list_files, read_file, create_file, delete_files,
  move_file, create_directory, find_files, organize_by_type, run_command.
- `depends_on` may only name step_ids earlier in the plan.
- Reference an earlier step's output with the literal token `$STEPn` (e.g.
  `$STEP1`) anywhere inside a later step's action fields; it is substituted
  with that step's trimmed output before execution.
- Only reference paths under the sandbox directories listed above.
- Emit JSON only, with no prose before or after it."#
    )
}

fn strip_fence(text: &str) -> String {
    if let Some(caps) = FENCE.captures(text) {
        return caps[1].to_string();
    }
    text.to_string()
}

/// The outermost balanced `{...}` substring, tracking string/escape state so
/// braces inside quoted JSON strings don't throw off the count.
fn extract_outermost_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn repair_trailing_commas(json: &str) -> String {
    TRAILING_COMMA.replace_all(json, "$1").into_owned()
}

/// Parse a planner's raw text response into a validated [`Plan`].
///
/// Recovery steps, in order: strip a ```json fenced block if present, locate
/// the outermost `{...}` object (dropping any leading/trailing prose), repair
/// trailing commas, parse, then validate that every `depends_on` names an
/// earlier step.
pub fn parse_plan(text: &str) -> Result<Plan, PlanParseError> {
    let unfenced = strip_fence(text);
    let object = extract_outermost_object(&unfenced).ok_or(PlanParseError::NoJsonFound)?;
    let repaired = repair_trailing_commas(object);

    let plan: Plan = serde_json::from_str(&repaired)?;
    plan.validate_dependencies()
        .map_err(PlanParseError::BadDependencies)?;

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_mounts() {
        let prompt = system_prompt(&[("~/Downloads".into(), "/workspace/downloads".into())]);
        assert!(prompt.contains("/workspace/downloads"));
        assert!(prompt.contains("~/Downloads"));
    }

    #[test]
    fn system_prompt_handles_no_mounts() {
        let prompt = system_prompt(&[]);
        assert!(prompt.contains("no directories are currently mounted"));
    }

    #[test]
    fn parse_plan_handles_bare_json() {
        let text = r#"{"description": "list files", "steps": [
            {"step_id": 1, "action": {"action": "list_files", "path": "/workspace"}, "depends_on": []}
        ]}"#;
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn parse_plan_strips_fenced_code_block() {
        let text = "Sure, here's the plan:\n```json\n{\"description\": \"d\", \"steps\": []}\n```\nLet me know if you need changes.";
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.description, "d");
    }

    #[test]
    fn parse_plan_repairs_trailing_comma() {
        let text = r#"{"description": "d", "steps": [
            {"step_id": 1, "action": {"action": "run_command", "command": "true"}, "depends_on": [],},
        ]}"#;
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn parse_plan_rejects_unknown_dependency() {
        let text = r#"{"description": "d", "steps": [
            {"step_id": 1, "action": {"action": "run_command", "command": "true"}, "depends_on": [5]}
        ]}"#;
        assert!(matches!(parse_plan(text), Err(PlanParseError::BadDependencies(_))));
    }

    #[test]
    fn parse_plan_rejects_forward_reference() {
        let text = r#"{"description": "d", "steps": [
            {"step_id": 1, "action": {"action": "run_command", "command": "true"}, "depends_on": [2]},
            {"step_id": 2, "action": {"action": "run_command", "command": "true"}, "depends_on": []}
        ]}"#;
        assert!(matches!(parse_plan(text), Err(PlanParseError::BadDependencies(_))));
    }

    #[test]
    fn parse_plan_errors_when_no_json_present() {
        let result = parse_plan("I'm not sure how to help with that.");
        assert!(matches!(result, Err(PlanParseError::NoJsonFound)));
    }

    #[test]
    fn extract_outermost_object_ignores_braces_inside_strings() {
        let text = r#"preamble { "a": "{not a brace}", "b": 1 } trailing"#;
        let obj = extract_outermost_object(text).unwrap();
        assert_eq!(obj, r#"{ "a": "{not a brace}", "b": 1 }"#);
    }
}
