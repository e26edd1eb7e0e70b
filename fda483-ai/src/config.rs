//! Configuration resolution for fda483-ai
//!
//! - API key resolution with ENV → TOML priority
//! - [`BatchConfig`]: explicit run settings handed to the orchestrator

use crate::models::schema::Schema;
use fda483_common::config::{ClassifierSection, TomlConfig};
use fda483_common::{Error, Result};
use std::time::Duration;
use tracing::{info, warn};

/// Primary environment variable for the Gemini API key
pub const API_KEY_ENV_VAR: &str = "FDA483_GEMINI_API_KEY";
/// Fallback environment variable (Google SDK convention)
pub const GOOGLE_API_KEY_ENV_VAR: &str = "GOOGLE_API_KEY";

/// Resolve the Gemini API key
///
/// **Priority:** `FDA483_GEMINI_API_KEY` → `GOOGLE_API_KEY` → TOML `gemini_api_key`
pub fn resolve_api_key(toml_config: &TomlConfig) -> Result<String> {
    let candidates = [
        ("environment (FDA483_GEMINI_API_KEY)", std::env::var(API_KEY_ENV_VAR).ok()),
        ("environment (GOOGLE_API_KEY)", std::env::var(GOOGLE_API_KEY_ENV_VAR).ok()),
        ("TOML", toml_config.gemini_api_key.clone()),
    ];

    let valid: Vec<(&str, String)> = candidates
        .into_iter()
        .filter_map(|(source, key)| key.filter(|k| is_valid_key(k)).map(|k| (source, k)))
        .collect();

    // Warn if multiple sources (potential misconfiguration)
    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(source, _)| *source).collect();
        warn!(
            "Gemini API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    match valid.into_iter().next() {
        Some((source, key)) => {
            info!("Gemini API key loaded from {}", source);
            Ok(key.trim().to_string())
        }
        None => Err(Error::Config(
            "Gemini API key not configured. Please configure using one of:\n\
             1. Environment: FDA483_GEMINI_API_KEY=your-key-here\n\
             2. Environment: GOOGLE_API_KEY=your-key-here\n\
             3. TOML config: ~/.config/fda483/config.toml (gemini_api_key = \"your-key\")"
                .to_string(),
        )),
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Settings for one orchestration run
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum classification calls in flight
    pub concurrency_cap: usize,
    /// Trimmed texts shorter than this many characters are skipped
    pub min_text_length: usize,
    /// Extra attempts after the first failure
    pub retry_count: u32,
    pub retry_backoff: Duration,
    /// Fixed delay applied to every call after admission
    pub call_delay: Duration,
    /// Per-call bound; expiry is a `Timeout` service failure
    pub call_timeout: Duration,
    pub requests_per_minute: Option<u32>,
    pub schema: Schema,
}

impl BatchConfig {
    /// Defaults from the source runs: 45 workers, 20-char minimum, one retry after 5 s
    pub fn new(schema: Schema) -> Self {
        Self::from_parts(&ClassifierSection::default(), schema)
    }

    /// Build from the `[classifier]` TOML section, resolving the schema by name
    pub fn from_section(section: &ClassifierSection) -> Result<Self> {
        let schema = Schema::by_name(&section.schema).ok_or_else(|| {
            Error::Config(format!(
                "Unknown schema '{}' (expected 'deficiency_categories' or 'granular')",
                section.schema
            ))
        })?;
        let config = Self::from_parts(section, schema);
        config.validate()?;
        Ok(config)
    }

    fn from_parts(section: &ClassifierSection, schema: Schema) -> Self {
        Self {
            concurrency_cap: section.concurrency_cap,
            min_text_length: section.min_text_length,
            retry_count: section.retry_count,
            retry_backoff: Duration::from_millis(section.retry_backoff_ms),
            call_delay: Duration::from_millis(section.call_delay_ms),
            call_timeout: Duration::from_secs(section.call_timeout_secs),
            requests_per_minute: section.requests_per_minute,
            schema,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency_cap == 0 {
            return Err(Error::Config("concurrency_cap must be at least 1".to_string()));
        }
        if self.call_timeout.is_zero() {
            return Err(Error::Config("call_timeout must be greater than zero".to_string()));
        }
        if self.schema.fields.is_empty() {
            return Err(Error::Config(format!(
                "schema '{}' has no fields",
                self.schema.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        env::remove_var(API_KEY_ENV_VAR);
        env::remove_var(GOOGLE_API_KEY_ENV_VAR);
    }

    #[test]
    #[serial]
    fn test_env_key_beats_toml() {
        clear_env();
        env::set_var(API_KEY_ENV_VAR, "env-key");
        let toml = TomlConfig {
            gemini_api_key: Some("toml-key".to_string()),
            ..Default::default()
        };

        let key = resolve_api_key(&toml);
        clear_env();
        assert_eq!(key.unwrap(), "env-key");
    }

    #[test]
    #[serial]
    fn test_google_api_key_fallback() {
        clear_env();
        env::set_var(GOOGLE_API_KEY_ENV_VAR, "  google-key  ");

        let key = resolve_api_key(&TomlConfig::default());
        clear_env();
        assert_eq!(key.unwrap(), "google-key");
    }

    #[test]
    #[serial]
    fn test_whitespace_key_ignored() {
        clear_env();
        env::set_var(API_KEY_ENV_VAR, "   ");
        let toml = TomlConfig {
            gemini_api_key: Some("toml-key".to_string()),
            ..Default::default()
        };

        let key = resolve_api_key(&toml);
        clear_env();
        assert_eq!(key.unwrap(), "toml-key");
    }

    #[test]
    #[serial]
    fn test_missing_key_is_config_error() {
        clear_env();
        let result = resolve_api_key(&TomlConfig::default());
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("FDA483_GEMINI_API_KEY")));
    }

    #[test]
    fn test_from_section_resolves_schema() {
        let section = ClassifierSection {
            schema: "granular".to_string(),
            retry_backoff_ms: 250,
            ..Default::default()
        };
        let config = BatchConfig::from_section(&section).unwrap();
        assert_eq!(config.schema, Schema::granular());
        assert_eq!(config.retry_backoff, Duration::from_millis(250));
        assert_eq!(config.concurrency_cap, 45);
    }

    #[test]
    fn test_unknown_schema_rejected() {
        let section = ClassifierSection {
            schema: "devices".to_string(),
            ..Default::default()
        };
        assert!(matches!(BatchConfig::from_section(&section), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_cap_rejected() {
        let mut config = BatchConfig::new(Schema::deficiency_categories());
        config.concurrency_cap = 0;
        assert!(config.validate().is_err());
    }
}
