//! Observation records and validated batches

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One inspection's observation text, keyed by a batch-unique identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: String,
    pub text: Option<String>,
}

impl ObservationRecord {
    pub fn new(id: impl Into<String>, text: Option<String>) -> Self {
        Self {
            id: id.into(),
            text,
        }
    }

    /// Text to send to the service, or `None` when it is absent or its
    /// trimmed length is below `min_len` characters
    ///
    /// The returned text is the original, untrimmed value.
    pub fn analyzable_text(&self, min_len: usize) -> Option<&str> {
        let text = self.text.as_deref()?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.chars().count() < min_len {
            None
        } else {
            Some(text)
        }
    }
}

/// Records with pairwise-distinct identifiers
///
/// Uniqueness is checked once here so the orchestrator can key outcomes by
/// identifier without losing rows.
#[derive(Debug, Clone, Default)]
pub struct ObservationBatch {
    records: Vec<ObservationRecord>,
}

impl ObservationBatch {
    pub fn new(records: Vec<ObservationRecord>) -> Result<Self, InputError> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if !seen.insert(record.id.as_str()) {
                return Err(InputError::DuplicateIdentifier(record.id.clone()));
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObservationRecord> {
        self.records.iter()
    }
}
