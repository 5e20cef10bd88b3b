//! Sensitive data redaction for logged commands and captured output.
//!
//! A rendered `create_file` command embeds its content verbatim
//! (`echo '...' > path`), and captured `cat`/`find`-style output can easily
//! contain a credential the user never meant to log. Redaction runs on both
//! before they reach `tracing`, not on what's sent to the LLM collaborator —
//! the planner never sees command output at all (see `executor`).

use once_cell::sync::Lazy;
use regex::Regex;

static API_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(api[_-]?key|token|secret|password|passwd|bearer[_-]?token|auth[_-]?token|client[_-]?secret|access[_-]?key|secret[_-]?key|AWS_SECRET_ACCESS_KEY|AWS_ACCESS_KEY_ID)[\s:=]+["']?([a-zA-Z0-9_\-\.]+)["']?"#)
        .unwrap()
});

/// Redaction utilities for log lines derived from sandboxed command text and
/// output, not for data sent to or received from an LLM collaborator.
pub struct Redaction;

impl Redaction {
    /// Redact sensitive data from a rendered command or captured output
    /// string before it is logged.
    ///
    /// ```
    /// use hermit::logging::Redaction;
    ///
    /// let command = "echo 'api_key=sk_live_abc123' > /workspace/downloads/creds.env";
    /// let safe = Redaction::redact(command);
    /// assert!(safe.contains("[REDACTED"));
    /// assert!(!safe.contains("sk_live_abc123"));
    /// ```
    pub fn redact(text: &str) -> String {
        API_KEY_PATTERN
            .replace_all(text, "$1=[REDACTED-$1]")
            .to_string()
    }

    /// Check whether command or output text contains a likely credential,
    /// without redacting it — used to decide whether a step's audit entry
    /// needs the redacted form at all.
    pub fn contains_sensitive(text: &str) -> bool {
        API_KEY_PATTERN.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_api_key_in_create_file_command() {
        let command = "echo 'api_key=sk_test_12345' > /workspace/downloads/secrets.txt";
        let redacted = Redaction::redact(command);
        assert!(!redacted.contains("sk_test_12345"));
        assert!(redacted.contains("[REDACTED"));
    }

    #[test]
    fn redacts_token_in_captured_output() {
        let output = "Using token=abc123token for auth";
        let redacted = Redaction::redact(output);
        assert!(!redacted.contains("abc123token"));
        assert!(redacted.contains("[REDACTED"));
    }

    #[test]
    fn contains_sensitive_flags_credentials_and_passes_plain_text() {
        assert!(Redaction::contains_sensitive("api_key=secret"));
        assert!(!Redaction::contains_sensitive("total 12\n-rw-r--r-- 1 user user 0 a.txt"));
    }
}
