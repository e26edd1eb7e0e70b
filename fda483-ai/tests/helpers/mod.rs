//! Test Helper Utilities
//!
//! Shared utilities for testing fda483-ai

#![allow(dead_code)]

pub mod scripted_classifier;

pub use scripted_classifier::ScriptedClassifier;

use fda483_ai::config::BatchConfig;
use fda483_ai::models::Schema;
use std::time::Duration;

/// Batch config with no backoff or pacing so tests run fast
pub fn fast_config(schema: Schema) -> BatchConfig {
    let mut config = BatchConfig::new(schema);
    config.retry_backoff = Duration::ZERO;
    config.call_delay = Duration::ZERO;
    config.call_timeout = Duration::from_secs(5);
    config
}

/// Observation text long enough to be classified, tagged with `marker`
pub fn long_text(marker: &str) -> String {
    format!(
        "{} Written procedures for cleaning and maintenance of equipment were not followed.",
        marker
    )
}

/// Row marker that is never a substring of another row's marker
pub fn marker(id: &str) -> String {
    format!("[row-{}]", id)
}

/// A valid deficiency-category response with the given flags set
pub fn categories_reply(set: &[&str]) -> String {
    let mut summary = serde_json::Map::new();
    for field in Schema::deficiency_categories().fields {
        let value = set.contains(&field.name.as_str());
        summary.insert(field.name, serde_json::Value::Bool(value));
    }
    serde_json::json!({ "analysis_summary": summary }).to_string()
}
