//! Classification schemas
//!
//! A schema is the fixed set of labeled fields the classification service
//! must populate for every observation. It drives prompt construction,
//! response parsing and the default values of failed rows.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label name → value for one classified observation
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Value of a single schema field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            FieldValue::Text(_) => None,
        }
    }
}

/// Shape of a schema field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    /// Boolean label, defaults to `false`
    Flag,
    /// Free-text label, defaults to empty. `allowed` is advisory (prompt only).
    Text {
        #[serde(default)]
        allowed: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub description: String,
    pub kind: FieldKind,
}

impl SchemaField {
    pub fn flag(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: FieldKind::Flag,
        }
    }

    pub fn text(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: FieldKind::Text { allowed: Vec::new() },
        }
    }

    /// Text field restricted (in the prompt) to a fixed vocabulary
    pub fn choice(
        name: impl Into<String>,
        description: impl Into<String>,
        allowed: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: FieldKind::Text {
                allowed: allowed.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    pub fn default_value(&self) -> FieldValue {
        match self.kind {
            FieldKind::Flag => FieldValue::Flag(false),
            FieldKind::Text { .. } => FieldValue::Text(String::new()),
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self.kind, FieldKind::Flag)
    }
}

/// Named label set plus the task description given to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    /// Task statement placed at the top of every prompt
    pub instructions: String,
    /// Key the fields are nested under in the response object, if any
    pub envelope: Option<String>,
    pub fields: Vec<SchemaField>,
}

impl Schema {
    /// Multi-label classification over the seven 483 deficiency categories
    pub fn deficiency_categories() -> Self {
        Self {
            name: "deficiency_categories".to_string(),
            instructions: "Perform a comprehensive, multi-label classification of the following \
                list of FDA Form 483 observations from a single inspection. The text may contain \
                multiple observations separated by '---'. Based on the full text, decide for each \
                category whether it is a reason for any of the observations."
                .to_string(),
            envelope: Some("analysis_summary".to_string()),
            fields: vec![
                SchemaField::flag(
                    "Procedures Not in Writing / Not Followed",
                    "SOPs are missing, inadequate, or not being followed by staff.",
                ),
                SchemaField::flag(
                    "Inadequate Investigation of Discrepancies (CAPA)",
                    "Failures, deviations, or out-of-spec results are not properly investigated; \
                     Corrective and Preventive Actions (CAPA) are deficient.",
                ),
                SchemaField::flag(
                    "Data Integrity and Record-Keeping",
                    "Records are not accurate, complete, or secure. Includes issues with master \
                     production and control records.",
                ),
                SchemaField::flag(
                    "Deficient Cleaning, Sanitizing, and Maintenance",
                    "Equipment and facilities are not properly cleaned or maintained, posing \
                     contamination risks.",
                ),
                SchemaField::flag(
                    "Inadequate Equipment and Facilities",
                    "The design, size, location, or maintenance of equipment or the facility \
                     itself is deficient.",
                ),
                SchemaField::flag(
                    "Lack of Process or Equipment Validation",
                    "Manufacturing processes or equipment have not been validated to ensure \
                     consistent product quality.",
                ),
                SchemaField::flag(
                    "Inadequate Testing and Quality Control",
                    "Insufficient or inadequate testing of raw materials or finished products.",
                ),
            ],
        }
    }

    /// Single most significant finding with category, sub-category and severity
    pub fn granular() -> Self {
        Self {
            name: "granular".to_string(),
            instructions: "Analyze the following FDA 483 observation text. Identify the single \
                most significant finding and classify it. Do not return a list."
                .to_string(),
            envelope: None,
            fields: vec![
                SchemaField::text("primary_category", "The main category of the observation."),
                SchemaField::text(
                    "sub_category",
                    "A specific, detailed sub-category of the issue.",
                ),
                SchemaField::choice(
                    "severity",
                    "The estimated severity of the finding.",
                    &["Critical", "Major", "Minor"],
                ),
                SchemaField::text(
                    "reasoning",
                    "A brief justification for the chosen categories and severity.",
                ),
            ],
        }
    }

    /// Look up a built-in schema by name
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "deficiency_categories" => Some(Self::deficiency_categories()),
            "granular" => Some(Self::granular()),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every field at its default value
    pub fn defaults(&self) -> FieldMap {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.default_value()))
            .collect()
    }

    pub fn flag_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| f.is_flag())
            .map(|f| f.name.as_str())
    }
}
