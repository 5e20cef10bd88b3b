//! The Action model: a closed set of file/shell operations the planner can emit.
//!
//! Every case renders to a shell command string and describes itself in a
//! short human-readable line for approval prompts and audit entries. Parsing
//! is intentionally forgiving: an `action` field we don't recognize, or no
//! recognizable JSON at all, degrades to [`Action::RunCommand`] with the
//! original text as the command — the planner's output is untrusted and the
//! executor must always have *something* sane to classify and run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// File type filter for `find_files`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    File,
    Directory,
}

/// A single planner-emitted operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    ListFiles {
        #[serde(default = "default_dot")]
        path: String,
        #[serde(default)]
        all: bool,
        #[serde(default)]
        long: bool,
    },
    ReadFile {
        #[serde(default)]
        path: String,
    },
    CreateFile {
        #[serde(default)]
        path: String,
        #[serde(default)]
        content: String,
    },
    DeleteFiles {
        #[serde(default)]
        path: String,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        recursive: bool,
    },
    MoveFile {
        #[serde(default)]
        source: String,
        #[serde(default)]
        destination: String,
    },
    CreateDirectory {
        #[serde(default)]
        path: String,
    },
    FindFiles {
        #[serde(default = "default_dot")]
        path: String,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        file_type: Option<FileType>,
    },
    OrganizeByType {
        #[serde(default = "default_dot")]
        path: String,
    },
    RunCommand {
        #[serde(default)]
        command: String,
    },
}

fn default_dot() -> String {
    ".".to_string()
}

/// Category directories `organize_by_type` sorts files into, in render
/// order, paired with the extension globs that move into each one.
/// `other` is created but never populated by the fixed routine, matching
/// the original implementation's catch-all-in-name-only behavior.
const ORGANIZE_CATEGORIES: &[(&str, &[&str])] = &[
    ("images", &["jpg", "jpeg", "png", "gif", "webp"]),
    ("documents", &["pdf", "doc", "docx", "txt", "md"]),
    ("audio", &["mp3", "wav", "flac"]),
    ("video", &["mp4", "mov", "avi"]),
    ("archives", &["zip", "tar", "gz"]),
    ("other", &[]),
];

impl Action {
    /// Parse a planner's raw step text into an [`Action`].
    ///
    /// Anything that isn't a JSON object with a recognized `action` field
    /// becomes `run_command` with the raw text as the command, per the
    /// degrade-gracefully invariant.
    pub fn parse(text: &str) -> Action {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(value, text),
            Err(_) => Action::RunCommand {
                command: text.to_string(),
            },
        }
    }

    /// Parse an already-decoded JSON value, falling back to `original_text`
    /// as a `run_command` when the shape doesn't match a known action. Used
    /// by the executor, which re-serializes a step's action after variable
    /// substitution and must re-parse the result the same forgiving way.
    pub fn from_value(value: Value, original_text: &str) -> Action {
        serde_json::from_value::<Action>(value).unwrap_or_else(|_| Action::RunCommand {
            command: original_text.to_string(),
        })
    }

    /// Render this action to a shell command string.
    ///
    /// Paths are interpolated as-is (not shell-quoted): the planner is
    /// constrained to emit paths under the configured workspace mounts, and
    /// quoting every path would diverge from the exact escaping contract
    /// this crate is held to for file *content* (see [`escape_single_quotes`]).
    pub fn render(&self) -> String {
        match self {
            Action::ListFiles { path, all, long } => {
                let mut flags = String::new();
                if *all {
                    flags.push('a');
                }
                if *long {
                    flags.push('l');
                }
                if flags.is_empty() {
                    format!("ls {path}")
                } else {
                    format!("ls -{flags} {path}")
                }
            }
            Action::ReadFile { path } => format!("cat {path}"),
            Action::CreateFile { path, content } => {
                format!("echo '{}' > {path}", escape_single_quotes(content))
            }
            Action::DeleteFiles {
                path,
                pattern,
                recursive,
            } => render_delete(path, pattern.as_deref(), *recursive),
            Action::MoveFile { source, destination } => format!("mv {source} {destination}"),
            Action::CreateDirectory { path } => format!("mkdir -p {path}"),
            Action::FindFiles {
                path,
                pattern,
                file_type,
            } => render_find(path, pattern.as_deref(), *file_type),
            Action::OrganizeByType { path } => render_organize(path),
            Action::RunCommand { command } => command.clone(),
        }
    }

    /// Short human-readable description, used in approval prompts and audit
    /// entries.
    pub fn describe(&self) -> String {
        match self {
            Action::ListFiles { path, .. } => format!("List files in {path}"),
            Action::ReadFile { path } => format!("Read contents of {path}"),
            Action::CreateFile { path, .. } => format!("Create file {path}"),
            Action::DeleteFiles { path, pattern, .. } => match pattern {
                Some(p) => format!("Delete files matching {p} in {path}"),
                None => format!("Delete {path}"),
            },
            Action::MoveFile { source, destination } => {
                format!("Move {source} to {destination}")
            }
            Action::CreateDirectory { path } => format!("Create directory {path}"),
            Action::FindFiles { path, pattern, .. } => match pattern {
                Some(p) => format!("Find files matching {p} in {path}"),
                None => format!("Find files in {path}"),
            },
            Action::OrganizeByType { path } => format!("Organize files in {path} by type"),
            Action::RunCommand { command } => format!("Run: {command}"),
        }
    }
}

/// Escape embedded single quotes the way a POSIX shell requires when the
/// surrounding text is itself single-quoted: each `'` becomes `'\''`
/// (close the quote, emit an escaped literal quote, reopen the quote).
pub fn escape_single_quotes(value: &str) -> String {
    value.replace('\'', r"'\''")
}

fn render_delete(path: &str, pattern: Option<&str>, recursive: bool) -> String {
    match (pattern, recursive) {
        (Some(pattern), true) => format!("find {path} -name '{pattern}' -delete"),
        (Some(pattern), false) => format!("rm {path}/{pattern}"),
        (None, true) => format!("rm -r {path}"),
        (None, false) => format!("rm {path}"),
    }
}

fn render_find(path: &str, pattern: Option<&str>, file_type: Option<FileType>) -> String {
    let mut cmd = format!("find {path}");
    if let Some(ft) = file_type {
        let flag = match ft {
            FileType::File => "f",
            FileType::Directory => "d",
        };
        cmd.push_str(&format!(" -type {flag}"));
    }
    if let Some(pattern) = pattern {
        cmd.push_str(&format!(" -name '{pattern}'"));
    }
    cmd
}

fn render_organize(path: &str) -> String {
    let mut lines = vec![
        format!("cd {path} &&"),
        "mkdir -p images documents audio video archives other &&".to_string(),
    ];

    for (category, extensions) in ORGANIZE_CATEGORIES {
        if extensions.is_empty() {
            continue;
        }
        let globs = extensions
            .iter()
            .map(|ext| format!("*.{ext}"))
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(format!(
            r#"for f in {globs}; do [ -f "$f" ] && mv "$f" {category}/; done 2>/dev/null;"#
        ));
    }

    lines.push("true".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_field_falls_back_to_run_command() {
        let text = r#"{"action": "teleport", "destination": "mars"}"#;
        match Action::parse(text) {
            Action::RunCommand { command } => assert_eq!(command, text),
            other => panic!("expected RunCommand fallback, got {other:?}"),
        }
    }

    #[test]
    fn non_json_text_falls_back_to_run_command() {
        let text = "just do the thing";
        match Action::parse(text) {
            Action::RunCommand { command } => assert_eq!(command, text),
            other => panic!("expected RunCommand fallback, got {other:?}"),
        }
    }

    #[test]
    fn list_files_defaults_path_to_dot() {
        let action: Action = serde_json::from_str(r#"{"action": "list_files"}"#).unwrap();
        assert_eq!(action.render(), "ls .");
    }

    #[test]
    fn list_files_renders_combined_flags() {
        let action = Action::ListFiles {
            path: "/workspace/downloads".to_string(),
            all: true,
            long: true,
        };
        assert_eq!(action.render(), "ls -al /workspace/downloads");
    }

    #[test]
    fn create_file_escapes_embedded_apostrophe() {
        let action = Action::CreateFile {
            path: "/workspace/note.txt".to_string(),
            content: "it's mine".to_string(),
        };
        assert_eq!(
            action.render(),
            r#"echo 'it'\''s mine' > /workspace/note.txt"#
        );
    }

    #[test]
    fn delete_files_matrix() {
        assert_eq!(render_delete("/tmp/x", None, false), "rm /tmp/x");
        assert_eq!(render_delete("/tmp/x", None, true), "rm -r /tmp/x");
        assert_eq!(
            render_delete("/tmp/x", Some("*.log"), false),
            "rm /tmp/x/*.log"
        );
        assert_eq!(
            render_delete("/tmp/x", Some("*.log"), true),
            "find /tmp/x -name '*.log' -delete"
        );
    }

    #[test]
    fn organize_by_type_ends_with_success_terminator() {
        let rendered = render_organize("/workspace/downloads");
        assert!(rendered.trim_end().ends_with("true"));
        assert!(rendered.contains("mkdir -p images documents audio video archives other"));
    }

    #[test]
    fn run_command_round_trips_through_json() {
        let original = Action::RunCommand {
            command: "echo hi".to_string(),
        };
        let json = serde_json::to_string(&original).unwrap();
        let parsed = Action::parse(&json);
        assert_eq!(original, parsed);
    }

    #[test]
    fn unused_action_fields_are_ignored_not_rejected() {
        let text = r#"{"action": "read_file", "path": "a.txt", "bogus_extra": 1}"#;
        match Action::parse(text) {
            Action::ReadFile { path } => assert_eq!(path, "a.txt"),
            other => panic!("expected ReadFile, got {other:?}"),
        }
    }
}
