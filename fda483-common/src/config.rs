//! Configuration loading and config file resolution
//!
//! Config file path priority order:
//! 1. Command-line argument (highest priority)
//! 2. `FDA483_CONFIG` environment variable
//! 3. OS-dependent config directory (`~/.config/fda483/config.toml` on Linux)
//!
//! A missing config file SHALL NOT cause termination: a warning is logged and
//! compiled defaults are used. A file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "FDA483_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// Every section is optional; absent keys fall back to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Gemini API key (lowest priority source, after environment variables)
    pub gemini_api_key: Option<String>,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Classification run settings
    pub classifier: ClassifierSection,

    /// Input dataset column mapping and filtering
    pub dataset: DatasetSection,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[classifier]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// Generative model name
    pub model: String,
    /// Base URL of the Gemini REST API
    pub api_base_url: String,
    /// Sampling temperature sent with every request
    pub temperature: f32,
    /// Built-in schema name: `deficiency_categories` or `granular`
    pub schema: String,
    /// Maximum number of classification calls in flight
    pub concurrency_cap: usize,
    /// Observations whose trimmed text is shorter than this are skipped
    pub min_text_length: usize,
    /// Extra attempts after a failed first attempt
    pub retry_count: u32,
    /// Fixed wait before each retry
    pub retry_backoff_ms: u64,
    /// Fixed pacing delay applied to every call
    pub call_delay_ms: u64,
    /// Per-call timeout
    pub call_timeout_secs: u64,
    /// Optional global request rate cap
    pub requests_per_minute: Option<u32>,
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.0,
            schema: "deficiency_categories".to_string(),
            concurrency_cap: 45,
            min_text_length: 20,
            retry_count: 1,
            retry_backoff_ms: 5000,
            call_delay_ms: 100,
            call_timeout_secs: 60,
            requests_per_minute: None,
        }
    }
}

/// `[dataset]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSection {
    /// Column holding the unique row identifier
    pub id_column: String,
    /// Columns joined (space-separated) to form the observation text
    pub text_columns: Vec<String>,
    /// Column holding the inspected product type
    pub product_type_column: String,
    /// Product types to keep (case-insensitive substring match); empty keeps all rows
    pub product_types: Vec<String>,
}

impl Default for DatasetSection {
    fn default() -> Self {
        Self {
            id_column: "inspection_id".to_string(),
            text_columns: vec![
                "short_description".to_string(),
                "long_description".to_string(),
            ],
            product_type_column: "product_type".to_string(),
            product_types: vec!["drugs".to_string(), "biologics".to_string()],
        }
    }
}

/// Resolve which config file to use
///
/// Returns `None` only when no CLI/ENV override is given and the platform has
/// no config directory.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: OS config directory
    default_config_path()
}

/// OS-dependent default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fda483").join("config.toml"))
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load config from `path`, falling back to defaults when the file is missing
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        Some(path) if path.exists() => {
            let config = load_toml_config(path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("No config directory available, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_source_run_parameters() {
        let config = TomlConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.classifier.concurrency_cap, 45);
        assert_eq!(config.classifier.min_text_length, 20);
        assert_eq!(config.classifier.retry_count, 1);
        assert_eq!(config.dataset.id_column, "inspection_id");
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [classifier]
            concurrency_cap = 8
            schema = "granular"
            "#,
        )
        .unwrap();

        assert_eq!(config.classifier.concurrency_cap, 8);
        assert_eq!(config.classifier.schema, "granular");
        assert_eq!(config.classifier.min_text_length, 20);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_write_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = TomlConfig::default();
        config.gemini_api_key = Some("written-key".to_string());
        config.classifier.requests_per_minute = Some(600);

        write_toml_config(&config, &path).unwrap();
        let loaded = load_toml_config(&path).unwrap();

        assert_eq!(loaded, config);
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");

        let config = load_or_default(Some(&path)).unwrap();
        assert_eq!(config, TomlConfig::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.toml");
        std::fs::write(&path, "[classifier\nconcurrency_cap = ").unwrap();

        let result = load_or_default(Some(&path));
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_cli_path_wins() {
        let path = PathBuf::from("/tmp/explicit.toml");
        assert_eq!(resolve_config_path(Some(&path)), Some(path));
    }
}
