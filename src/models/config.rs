//! Configuration data model — the struct persisted at `~/.hermit/config.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single host-directory → sandbox-directory bind mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPair {
    pub host: String,
    pub sandbox: String,
}

/// `preferences.auto_organize_extensions`: category name → extensions.
pub type ExtensionMap = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub confirm_before_execute: bool,
    pub dry_run_by_default: bool,
    pub auto_organize_extensions: ExtensionMap,
}

impl Default for Preferences {
    fn default() -> Self {
        let mut auto_organize_extensions = ExtensionMap::new();
        auto_organize_extensions.insert(
            "images".into(),
            strs(&["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp"]),
        );
        auto_organize_extensions.insert(
            "documents".into(),
            strs(&["pdf", "doc", "docx", "txt", "md", "rtf", "odt"]),
        );
        auto_organize_extensions.insert(
            "audio".into(),
            strs(&["mp3", "wav", "flac", "aac", "ogg", "m4a"]),
        );
        auto_organize_extensions.insert(
            "video".into(),
            strs(&["mp4", "mov", "avi", "mkv", "webm", "wmv"]),
        );
        auto_organize_extensions.insert("archives".into(), strs(&["zip", "tar", "gz", "rar", "7z"]));
        auto_organize_extensions.insert(
            "code".into(),
            strs(&["py", "js", "ts", "java", "c", "cpp", "go", "rs"]),
        );

        Self {
            confirm_before_execute: true,
            dry_run_by_default: false,
            auto_organize_extensions,
        }
    }
}

fn strs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySettings {
    pub block_rm_rf: bool,
    pub require_confirmation_for_delete: bool,
    pub max_files_per_operation: u32,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            block_rm_rf: true,
            require_confirmation_for_delete: true,
            max_files_per_operation: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgroupSettings {
    pub enabled: bool,
    pub memory_max_mb: u64,
    pub cpu_quota_percent: u32,
    pub pids_max: u32,
    pub timeout_seconds: u64,
}

impl Default for CgroupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            memory_max_mb: 512,
            cpu_quota_percent: 50,
            pids_max: 100,
            timeout_seconds: 60,
        }
    }
}

/// LLM backend selection; the core never inspects credentials beyond storing
/// them opaquely for the `backends::Planner` seam to read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// The fields the core reads from `~/.hermit/config.json` (spec.md §6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HermitConfig {
    pub allowed_directories: Vec<MountPair>,
    pub preferences: Preferences,
    pub safety: SafetySettings,
    pub cgroups: CgroupSettings,
    pub llm: LlmSettings,
}

impl Default for HermitConfig {
    fn default() -> Self {
        Self {
            allowed_directories: vec![
                MountPair {
                    host: "~/Downloads".into(),
                    sandbox: "/workspace/downloads".into(),
                },
                MountPair {
                    host: "~/projects".into(),
                    sandbox: "/workspace/projects".into(),
                },
            ],
            preferences: Preferences::default(),
            safety: SafetySettings::default(),
            cgroups: CgroupSettings::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl HermitConfig {
    /// `(host, sandbox)` pairs as the rest of the crate consumes them.
    pub fn mount_list(&self) -> Vec<(String, String)> {
        self.allowed_directories
            .iter()
            .map(|m| (m.host.clone(), m.sandbox.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = HermitConfig::default();
        assert_eq!(config.allowed_directories.len(), 2);
        assert_eq!(config.cgroups.memory_max_mb, 512);
        assert_eq!(config.cgroups.cpu_quota_percent, 50);
        assert_eq!(config.cgroups.pids_max, 100);
        assert_eq!(config.cgroups.timeout_seconds, 60);
        assert!(config.preferences.confirm_before_execute);
        assert!(config.safety.block_rm_rf);
        assert!(config.safety.require_confirmation_for_delete);
    }

    #[test]
    fn roundtrips_through_json() {
        let config = HermitConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: HermitConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed: HermitConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, HermitConfig::default());
    }
}
