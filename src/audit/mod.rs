//! Audit Sink (C8): an append-only record of every policy decision and
//! executed command. Defined as a trait so the reference JSONL
//! implementation can be swapped for something else (a syslog forwarder, a
//! test double) without touching the executor.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::RiskLevel;

const MAX_OUTPUT_CHARS: usize = 500;

/// One occurrence worth recording. Variants match the points the executor
/// calls into: a policy verdict, a blocked command, a completed execution,
/// or a step skipped for lack of satisfied dependencies/approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum AuditEvent {
    #[serde(rename = "policy_check")]
    PolicyCheck {
        step_id: u32,
        command: String,
        risk: RiskLevel,
        reason: String,
    },
    #[serde(rename = "command_blocked")]
    CommandBlocked {
        step_id: u32,
        command: String,
        reason: String,
    },
    #[serde(rename = "command_executed")]
    CommandExecuted {
        step_id: u32,
        command: String,
        output: String,
        success: bool,
    },
    #[serde(rename = "step_skipped")]
    StepSkipped { step_id: u32, reason: String },
}

/// A stored event with its timestamp, the unit `show_recent` returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent) -> anyhow::Result<()>;

    /// Most recent `n` records, oldest first within the returned slice.
    fn show_recent(&self, n: usize) -> anyhow::Result<Vec<AuditRecord>>;
}

fn truncate_output(event: AuditEvent) -> AuditEvent {
    match event {
        AuditEvent::CommandExecuted {
            step_id,
            command,
            output,
            success,
        } if output.chars().count() > MAX_OUTPUT_CHARS => AuditEvent::CommandExecuted {
            step_id,
            command,
            output: format!(
                "{}... [truncated, {} chars total]",
                output.chars().take(MAX_OUTPUT_CHARS).collect::<String>(),
                output.chars().count()
            ),
            success,
        },
        other => other,
    }
}

/// Reference implementation: one JSON object per line, appended to
/// `~/.hermit/audit.log`. The original Python implementation used the same
/// layout for the same reason — append-only, grep-able, and trivially
/// recoverable if a write is interrupted mid-line.
pub struct JsonlAuditSink {
    path: PathBuf,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.hermit/audit.log`, creating the parent directory if needed.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("no home directory"))?;
        Ok(home.join(".hermit").join("audit.log"))
    }

    pub fn at_default_path() -> anyhow::Result<Self> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self::new(path))
    }

    fn read_all(&self) -> anyhow::Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "skipping unparseable audit line"),
            }
        }
        Ok(records)
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        use std::io::Write;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let record = AuditRecord {
            timestamp: Utc::now(),
            event: truncate_output(event.clone()),
        };
        let line = serde_json::to_string(&record)?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn show_recent(&self, n: usize) -> anyhow::Result<Vec<AuditRecord>> {
        let mut records = self.read_all()?;
        if records.len() > n {
            records = records.split_off(records.len() - n);
        }
        Ok(records)
    }
}

/// In-memory sink for tests and `--unsafe`/dry-run sessions that should not
/// touch `~/.hermit`.
pub struct MemoryAuditSink {
    events: std::sync::Mutex<Vec<AuditRecord>>,
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) -> anyhow::Result<()> {
        let record = AuditRecord {
            timestamp: Utc::now(),
            event: truncate_output(event.clone()),
        };
        self.events.lock().unwrap().push(record);
        Ok(())
    }

    fn show_recent(&self, n: usize) -> anyhow::Result<Vec<AuditRecord>> {
        let events = self.events.lock().unwrap();
        let start = events.len().saturating_sub(n);
        Ok(events[start..].to_vec())
    }
}

/// Used only by tests that want a scratch audit log under a temp directory
/// rather than the real `~/.hermit`.
#[cfg(test)]
fn sink_at(dir: &Path) -> JsonlAuditSink {
    JsonlAuditSink::new(dir.join("audit.log"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_output_leaves_short_output_untouched() {
        let event = AuditEvent::CommandExecuted {
            step_id: 1,
            command: "ls".into(),
            output: "short".into(),
            success: true,
        };
        let truncated = truncate_output(event);
        match truncated {
            AuditEvent::CommandExecuted { output, .. } => assert_eq!(output, "short"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn truncate_output_caps_long_output() {
        let long = "a".repeat(1000);
        let event = AuditEvent::CommandExecuted {
            step_id: 1,
            command: "cat big.log".into(),
            output: long,
            success: true,
        };
        match truncate_output(event) {
            AuditEvent::CommandExecuted { output, .. } => {
                assert!(output.contains("truncated"));
                assert!(output.len() < 1000);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn jsonl_sink_round_trips_events() {
        let temp = tempfile::tempdir().unwrap();
        let sink = sink_at(temp.path());
        sink.record(&AuditEvent::PolicyCheck {
            step_id: 1,
            command: "ls".into(),
            risk: RiskLevel::Low,
            reason: "Read-only operation".into(),
        })
        .unwrap();
        sink.record(&AuditEvent::CommandExecuted {
            step_id: 1,
            command: "ls".into(),
            output: "a.txt\nb.txt".into(),
            success: true,
        })
        .unwrap();

        let recent = sink.show_recent(10).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn jsonl_sink_show_recent_caps_count() {
        let temp = tempfile::tempdir().unwrap();
        let sink = sink_at(temp.path());
        for i in 0..5 {
            sink.record(&AuditEvent::StepSkipped {
                step_id: i,
                reason: "test".into(),
            })
            .unwrap();
        }
        let recent = sink.show_recent(2).unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn jsonl_sink_missing_file_returns_empty() {
        let temp = tempfile::tempdir().unwrap();
        let sink = sink_at(temp.path());
        assert!(sink.show_recent(10).unwrap().is_empty());
    }

    #[test]
    fn memory_sink_round_trips_events() {
        let sink = MemoryAuditSink::default();
        sink.record(&AuditEvent::StepSkipped {
            step_id: 1,
            reason: "declined".into(),
        })
        .unwrap();
        assert_eq!(sink.show_recent(10).unwrap().len(), 1);
    }
}
