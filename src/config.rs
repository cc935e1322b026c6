use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Service configuration loaded from a TOML file.
///
/// Every key is optional; missing sections fall back to [`Default`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub workflow: WorkflowConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub bind_address: String,
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_address: "0.0.0.0".to_string(),
            cors_origin: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "datagate.db".to_string(),
            max_connections: 20,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: "uploads".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Submission workflow switches
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Run the validation pass right after intake
    pub auto_validate: bool,
    /// Apply a submission as part of its approval
    pub auto_apply_on_approve: bool,
    pub max_rows_per_submission: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            auto_validate: true,
            auto_apply_on_approve: true,
            max_rows_per_submission: 100_000,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Load `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.max_upload_bytes, 26_214_400);
        assert!(config.workflow.auto_validate);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let raw = r#"
[server]
port = 8080
cors_origin = "http://localhost:5173"

[workflow]
auto_apply_on_approve = false
max_rows_per_submission = 50
"#;
        let config = AppConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(
            config.server.cors_origin.as_deref(),
            Some("http://localhost:5173")
        );
        assert!(config.workflow.auto_validate);
        assert!(!config.workflow.auto_apply_on_approve);
        assert_eq!(config.workflow.max_rows_per_submission, 50);
        assert_eq!(config.database.path, "datagate.db");
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = AppConfig::from_toml_str("[server]\nport = \"high\"").unwrap_err();
        assert!(err.to_string().contains("Failed to parse configuration"));
    }

    #[test]
    fn test_load_reads_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[database]\npath = \":memory:\"\n").unwrap();
        let config = AppConfig::load_or_default(Some(file.path())).unwrap();
        assert_eq!(config.database.path, ":memory:");
        assert_eq!(config.database.max_connections, 20);
    }
}
