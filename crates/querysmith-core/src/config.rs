//! Runtime configuration: TOML file plus `QUERYSMITH_*` environment overlay.
//!
//! ```toml
//! entry_point = "run"
//! audit_dir = "/var/lib/querysmith/audit"
//!
//! [sandbox]
//! timeout_ms = 5000
//!
//! [repair]
//! max_rounds = 2
//!
//! [model]
//! base_url = "http://localhost:11434"
//! model = "qwen2.5-coder"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{QsError, Result};
use crate::repair::RepairPolicy;
use crate::sandbox::{SandboxLimits, DEFAULT_ENTRY_POINT};

/// Chat model endpoint settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    /// Never written back out.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5-coder".to_string(),
            api_key: None,
            temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerysmithConfig {
    pub sandbox: SandboxLimits,
    pub repair: RepairPolicy,
    pub entry_point: String,
    pub model: ModelConfig,
    /// Where audit records go. `None` disables auditing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_dir: Option<PathBuf>,
}

impl Default for QuerysmithConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxLimits::default(),
            repair: RepairPolicy::default(),
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            model: ModelConfig::default(),
            audit_dir: None,
        }
    }
}

impl QuerysmithConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Overlay `QUERYSMITH_*` variables from the process environment.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay variables from `lookup`. Unset keys leave values untouched.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("QUERYSMITH_BASE_URL") {
            self.model.base_url = v;
        }
        if let Some(v) = lookup("QUERYSMITH_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = lookup("QUERYSMITH_API_KEY") {
            self.model.api_key = Some(v);
        }
        if let Some(v) = lookup("QUERYSMITH_ENTRY_POINT") {
            self.entry_point = v;
        }
        if let Some(v) = lookup("QUERYSMITH_MAX_ROUNDS") {
            self.repair.max_rounds = parse_number("QUERYSMITH_MAX_ROUNDS", &v)?;
        }
        if let Some(v) = lookup("QUERYSMITH_TIMEOUT_MS") {
            self.sandbox.timeout_ms = parse_number("QUERYSMITH_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("QUERYSMITH_AUDIT_DIR") {
            self.audit_dir = Some(PathBuf::from(v));
        }
        self.check()?;
        Ok(self)
    }

    fn check(&self) -> Result<()> {
        if self.entry_point.trim().is_empty() {
            return Err(QsError::Config("entry_point must not be empty".into()));
        }
        self.sandbox
            .validate()
            .map_err(|e| QsError::Config(e.to_string()))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| QsError::Config(format!("{key} must be a number, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_toml_is_default() {
        let config = QuerysmithConfig::from_toml_str("").unwrap();
        assert_eq!(config, QuerysmithConfig::default());
        assert_eq!(config.repair.max_rounds, 2);
        assert_eq!(config.entry_point, "run");
    }

    #[test]
    fn test_partial_sections() {
        let config = QuerysmithConfig::from_toml_str(
            r#"
entry_point = "answer"

[sandbox]
timeout_ms = 250

[repair]
max_rounds = 0
advisory_review = true
"#,
        )
        .unwrap();
        assert_eq!(config.entry_point, "answer");
        assert_eq!(config.sandbox.timeout_ms, 250);
        assert_eq!(config.sandbox.max_operations, 5_000_000);
        assert_eq!(config.repair.max_rounds, 0);
        assert!(config.repair.advisory_review);
        assert_eq!(config.repair.collaborator_timeout_ms, 60_000);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let err = QuerysmithConfig::from_toml_str("[sandbox]\ntimeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, QsError::Config(_)));
    }

    #[test]
    fn test_bad_toml_is_toml_error() {
        let err = QuerysmithConfig::from_toml_str("[repair\n").unwrap_err();
        assert!(matches!(err, QsError::Toml(_)));
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("QUERYSMITH_MODEL", "llama3"),
            ("QUERYSMITH_API_KEY", "secret"),
            ("QUERYSMITH_MAX_ROUNDS", "5"),
            ("QUERYSMITH_AUDIT_DIR", "/tmp/audit"),
        ]
        .into_iter()
        .collect();
        let config = QuerysmithConfig::default()
            .apply_env_from(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.model.model, "llama3");
        assert_eq!(config.model.api_key.as_deref(), Some("secret"));
        assert_eq!(config.repair.max_rounds, 5);
        assert_eq!(config.audit_dir, Some(PathBuf::from("/tmp/audit")));
        assert_eq!(config.model.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_env_overlay_rejects_non_numeric() {
        let err = QuerysmithConfig::default()
            .apply_env_from(|k| (k == "QUERYSMITH_MAX_ROUNDS").then(|| "two".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("QUERYSMITH_MAX_ROUNDS"));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = QuerysmithConfig::default();
        config.model.api_key = Some("secret".into());
        let text = toml::to_string(&config).unwrap();
        assert!(!text.contains("secret"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("querysmith.toml");
        std::fs::write(&path, "[model]\nmodel = \"m\"\n").unwrap();
        assert_eq!(QuerysmithConfig::load(&path).unwrap().model.model, "m");
    }
}
