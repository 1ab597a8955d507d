use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TallyError};
use crate::resolver::DEFAULT_ACCEPTANCE_THRESHOLD;

pub const DB_FILE: &str = "tally.db";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub data_dir: String,
    pub acceptance_threshold: f64,
    pub auto_accept: bool,
    pub ai_enabled: bool,
    pub ai_host: String,
    pub ai_model: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            auto_accept: true,
            ai_enabled: false,
            ai_host: "http://localhost:11434".to_string(),
            ai_model: "llama3.2".to_string(),
        }
    }
}

impl Settings {
    /// `TALLY_AI_HOST` also switches the AI collaborator on.
    pub fn apply_env(&mut self, host: Option<String>, model: Option<String>) {
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.ai_host = host;
            self.ai_enabled = true;
        }
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.ai_model = model;
        }
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(DB_FILE)
    }

    /// Threshold clamped into [0, 1]; a bogus value in the file falls back
    /// to the default.
    pub fn threshold(&self) -> f64 {
        if self.acceptance_threshold.is_finite() {
            self.acceptance_threshold.clamp(0.0, 1.0)
        } else {
            DEFAULT_ACCEPTANCE_THRESHOLD
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tally")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("tally")
}

fn parse_settings(content: &str) -> Settings {
    serde_json::from_str(content).unwrap_or_default()
}

/// File settings with environment overrides applied. Never fails.
pub fn load_settings() -> Settings {
    let path = settings_path();
    let mut settings = if path.exists() {
        parse_settings(&std::fs::read_to_string(&path).unwrap_or_default())
    } else {
        Settings::default()
    };
    settings.apply_env(
        std::env::var("TALLY_AI_HOST").ok(),
        std::env::var("TALLY_AI_MODEL").ok(),
    );
    settings
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| TallyError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.acceptance_threshold, 0.9);
        assert!(s.auto_accept);
        assert!(!s.ai_enabled);
        assert!(s.data_dir.ends_with("tally"));
        assert!(s.db_path().ends_with("tally.db"));
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let s = parse_settings(r#"{"data_dir": "/tmp/books", "acceptance_threshold": 0.75}"#);
        assert_eq!(s.data_dir, "/tmp/books");
        assert_eq!(s.threshold(), 0.75);
        assert_eq!(s.ai_model, "llama3.2");
    }

    #[test]
    fn test_unreadable_file_falls_back() {
        let s = parse_settings("{ not json");
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_threshold_is_clamped() {
        let s = Settings {
            acceptance_threshold: 1.7,
            ..Default::default()
        };
        assert_eq!(s.threshold(), 1.0);
    }

    #[test]
    fn test_env_host_enables_ai() {
        let mut s = Settings::default();
        s.apply_env(Some("http://gpu:11434".into()), None);
        assert!(s.ai_enabled);
        assert_eq!(s.ai_host, "http://gpu:11434");
        assert_eq!(s.ai_model, "llama3.2");

        let mut s = Settings::default();
        s.apply_env(Some("  ".into()), Some("mistral".into()));
        assert!(!s.ai_enabled);
        assert_eq!(s.ai_model, "mistral");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            ai_enabled: true,
            ..Default::default()
        };
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        let loaded = parse_settings(&std::fs::read_to_string(&path).unwrap());
        assert_eq!(loaded, settings);
    }
}
