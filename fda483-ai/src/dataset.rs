//! JSON Lines dataset I/O
//!
//! Each input line is one JSON object (an inspection row). The identifier
//! comes from a configured column; the observation text is the configured
//! text columns joined with a space.

use crate::error::InputError;
use crate::models::labeled::LabeledDataset;
use crate::models::observation::{ObservationBatch, ObservationRecord};
use fda483_common::config::DatasetSection;
use fda483_common::{Error, Result};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// One external dataset row
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub id: String,
    pub columns: Map<String, Value>,
}

impl DatasetRow {
    /// Build from a parsed JSON line (`line` is 1-based, for messages)
    ///
    /// String identifiers are trimmed; numeric identifiers are stringified.
    pub fn from_json(value: Value, id_column: &str, line: usize) -> std::result::Result<Self, InputError> {
        let Value::Object(columns) = value else {
            return Err(InputError::MalformedRow {
                line,
                message: "expected a JSON object".to_string(),
            });
        };

        let id = match columns.get(id_column) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(_)) | Some(Value::Null) | None => {
                return Err(InputError::MissingIdentifier {
                    line,
                    column: id_column.to_string(),
                })
            }
            Some(other) => {
                return Err(InputError::MalformedRow {
                    line,
                    message: format!("identifier column '{}' has unsupported value {}", id_column, other),
                })
            }
        };

        Ok(Self { id, columns })
    }

    /// Non-empty string values of `text_columns`, joined with a space
    pub fn observation_text(&self, text_columns: &[String]) -> Option<String> {
        let parts: Vec<&str> = text_columns
            .iter()
            .filter_map(|column| self.columns.get(column).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    pub fn to_observation(&self, text_columns: &[String]) -> ObservationRecord {
        ObservationRecord::new(self.id.clone(), self.observation_text(text_columns))
    }

    /// Case-insensitive substring match of `column` against any of `product_types`
    ///
    /// An empty `product_types` list matches every row.
    pub fn matches_product_types(&self, column: &str, product_types: &[String]) -> bool {
        if product_types.is_empty() {
            return true;
        }
        let Some(value) = self.columns.get(column).and_then(Value::as_str) else {
            return false;
        };
        let value = value.to_lowercase();
        product_types
            .iter()
            .any(|wanted| value.contains(&wanted.to_lowercase()))
    }
}

/// Keep rows whose product type matches the configured list
pub fn filter_product_types(rows: Vec<DatasetRow>, section: &DatasetSection) -> Vec<DatasetRow> {
    let before = rows.len();
    let kept: Vec<DatasetRow> = rows
        .into_iter()
        .filter(|row| row.matches_product_types(&section.product_type_column, &section.product_types))
        .collect();

    info!(
        before,
        after = kept.len(),
        product_types = ?section.product_types,
        "Filtered dataset by product type"
    );
    kept
}

/// Observation batch for `rows`, rejecting duplicate identifiers
pub fn to_batch(rows: &[DatasetRow], text_columns: &[String]) -> std::result::Result<ObservationBatch, InputError> {
    ObservationBatch::new(rows.iter().map(|row| row.to_observation(text_columns)).collect())
}

/// Read a JSON Lines dataset; blank lines are ignored
///
/// # Errors
/// - `Error::InputUnavailable` when the file cannot be opened
/// - `Error::InvalidInput` for an unparseable line or a missing identifier
pub fn read_jsonl(path: &Path, section: &DatasetSection) -> Result<Vec<DatasetRow>> {
    let file = File::open(path).map_err(|e| {
        Error::InputUnavailable(format!("cannot open {}: {}", path.display(), e))
    })?;

    let mut rows = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_number = index + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = serde_json::from_str(&line).map_err(|e| InputError::MalformedRow {
            line: line_number,
            message: e.to_string(),
        })?;
        rows.push(DatasetRow::from_json(value, &section.id_column, line_number)?);
    }

    debug!(path = %path.display(), rows = rows.len(), "Loaded dataset");
    Ok(rows)
}

/// Write one JSON object per labeled row
pub fn write_jsonl(path: &Path, dataset: &LabeledDataset) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for row in &dataset.rows {
        serde_json::to_writer(&mut writer, &row.to_json()).map_err(std::io::Error::from)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = dataset.len(), "Wrote labeled dataset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text_columns() -> Vec<String> {
        vec!["short_description".to_string(), "long_description".to_string()]
    }

    #[test]
    fn test_numeric_id_stringified() {
        let row = DatasetRow::from_json(json!({"inspection_id": 1042}), "inspection_id", 1).unwrap();
        assert_eq!(row.id, "1042");
    }

    #[test]
    fn test_missing_id_rejected() {
        let err = DatasetRow::from_json(json!({"other": "x"}), "inspection_id", 7).unwrap_err();
        assert_eq!(
            err,
            InputError::MissingIdentifier {
                line: 7,
                column: "inspection_id".to_string()
            }
        );
    }

    #[test]
    fn test_non_object_line_rejected() {
        let err = DatasetRow::from_json(json!([1, 2]), "inspection_id", 3).unwrap_err();
        assert!(matches!(err, InputError::MalformedRow { line: 3, .. }));
    }

    #[test]
    fn test_observation_text_joins_columns() {
        let row = DatasetRow::from_json(
            json!({
                "inspection_id": "1",
                "short_description": " Procedures not followed ",
                "long_description": "Specifically, the SOP for cleaning was skipped."
            }),
            "inspection_id",
            1,
        )
        .unwrap();

        assert_eq!(
            row.observation_text(&text_columns()).as_deref(),
            Some("Procedures not followed Specifically, the SOP for cleaning was skipped.")
        );
    }

    #[test]
    fn test_observation_text_absent_when_columns_blank() {
        let row = DatasetRow::from_json(
            json!({"inspection_id": "1", "short_description": "  ", "long_description": null}),
            "inspection_id",
            1,
        )
        .unwrap();
        assert_eq!(row.observation_text(&text_columns()), None);
    }

    #[test]
    fn test_product_type_match_is_case_insensitive_substring() {
        let row = DatasetRow::from_json(
            json!({"inspection_id": "1", "product_type": "Human Drugs"}),
            "inspection_id",
            1,
        )
        .unwrap();

        assert!(row.matches_product_types("product_type", &["drugs".to_string()]));
        assert!(!row.matches_product_types("product_type", &["devices".to_string()]));
        assert!(row.matches_product_types("product_type", &[]));
        assert!(!row.matches_product_types("missing_column", &["drugs".to_string()]));
    }

    #[test]
    fn test_to_batch_rejects_duplicates() {
        let rows = vec![
            DatasetRow::from_json(json!({"inspection_id": "1"}), "inspection_id", 1).unwrap(),
            DatasetRow::from_json(json!({"inspection_id": 1}), "inspection_id", 2).unwrap(),
        ];
        assert_eq!(
            to_batch(&rows, &text_columns()).unwrap_err(),
            InputError::DuplicateIdentifier("1".to_string())
        );
    }
}
