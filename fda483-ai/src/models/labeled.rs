//! Labeled output rows

use crate::models::schema::{FieldMap, FieldValue};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Name of the output column carrying the failure marker
pub const ERROR_COLUMN: &str = "error";

/// Original dataset row plus every schema label and the `error` column
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub id: String,
    pub columns: Map<String, Value>,
    pub labels: FieldMap,
    pub error: Option<String>,
}

impl LabeledRow {
    /// Flatten to a single JSON object: columns, then labels, then `error`
    ///
    /// Labels overwrite dataset columns of the same name.
    pub fn to_json(&self) -> Value {
        let mut object = self.columns.clone();
        for (name, value) in &self.labels {
            let json = match value {
                FieldValue::Flag(b) => Value::Bool(*b),
                FieldValue::Text(s) => Value::String(s.clone()),
            };
            object.insert(name.clone(), json);
        }
        object.insert(
            ERROR_COLUMN.to_string(),
            self.error.clone().map(Value::String).unwrap_or(Value::Null),
        );
        Value::Object(object)
    }
}

/// One labeled row per dataset row, in dataset order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledDataset {
    pub rows: Vec<LabeledRow>,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&LabeledRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Number of rows with each flag label set to `true`
    pub fn flag_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            for (name, value) in &row.labels {
                if let Some(flag) = value.as_flag() {
                    let entry = counts.entry(name.clone()).or_insert(0);
                    if flag {
                        *entry += 1;
                    }
                }
            }
        }
        counts
    }

    pub fn error_count(&self) -> usize {
        self.rows.iter().filter(|r| r.error.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: &str, flag: bool, error: Option<&str>) -> LabeledRow {
        let mut labels = FieldMap::new();
        labels.insert("Data Integrity and Record-Keeping".into(), FieldValue::Flag(flag));
        labels.insert("notes".into(), FieldValue::Text("x".into()));
        LabeledRow {
            id: id.into(),
            columns: Map::new(),
            labels,
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_to_json_flattens_labels_and_error() {
        let mut r = row("1", true, None);
        r.columns.insert("inspection_id".into(), json!(1));
        r.columns.insert("notes".into(), json!("overwritten"));

        assert_eq!(
            r.to_json(),
            json!({
                "inspection_id": 1,
                "Data Integrity and Record-Keeping": true,
                "notes": "x",
                "error": null
            })
        );
    }

    #[test]
    fn test_flag_counts_ignore_text_labels() {
        let dataset = LabeledDataset {
            rows: vec![
                row("1", true, None),
                row("2", false, Some("skipped: no text to analyze")),
                row("3", true, None),
            ],
        };
        let counts = dataset.flag_counts();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts["Data Integrity and Record-Keeping"], 2);
        assert_eq!(dataset.error_count(), 1);
    }
}
