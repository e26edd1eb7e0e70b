//! Per-row classification outcomes and the batch result map

use crate::error::ServiceError;
use crate::models::schema::FieldMap;
use fda483_common::events::RowStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Error marker for rows whose text was absent or too short
pub const SKIPPED_MARKER: &str = "skipped: no text to analyze";
/// Error marker for rows whose response could not be interpreted
pub const PARSE_FAILURE_MARKER: &str = "parse_failure: response was not valid structured output";
/// Error marker for dataset rows that have no outcome at all
pub const MISSING_OUTCOME_MARKER: &str = "missing_outcome";

/// Terminal result of classifying one observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClassificationOutcome {
    /// Every schema field populated (absent ones defaulted)
    Success { fields: FieldMap },
    /// Text absent or shorter than the threshold; the service was not called
    SkippedNoText,
    /// Service replied with something that is not the expected structure
    ParseFailure { raw_response: String },
    /// The call failed even after retry
    ServiceFailure { cause: ServiceError },
}

impl ClassificationOutcome {
    pub fn status(&self) -> RowStatus {
        match self {
            ClassificationOutcome::Success { .. } => RowStatus::Success,
            ClassificationOutcome::SkippedNoText => RowStatus::Skipped,
            ClassificationOutcome::ParseFailure { .. } => RowStatus::ParseFailure,
            ClassificationOutcome::ServiceFailure { .. } => RowStatus::ServiceFailure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ClassificationOutcome::Success { .. })
    }

    /// Value for the `error` column; `None` on success
    pub fn error_marker(&self) -> Option<String> {
        match self {
            ClassificationOutcome::Success { .. } => None,
            ClassificationOutcome::SkippedNoText => Some(SKIPPED_MARKER.to_string()),
            ClassificationOutcome::ParseFailure { .. } => Some(PARSE_FAILURE_MARKER.to_string()),
            ClassificationOutcome::ServiceFailure { cause } if cause.is_quota() => {
                Some(format!("service_failure (quota): {}", cause.message))
            }
            ClassificationOutcome::ServiceFailure { cause } => {
                Some(format!("service_failure ({}): {}", cause.kind, cause.message))
            }
        }
    }
}

/// Outcome counts for a finished batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub parse_failures: usize,
    pub service_failures: usize,
    /// Subset of `service_failures` caused by quota/rate limiting
    pub quota_failures: usize,
}

impl BatchSummary {
    pub fn failed(&self) -> usize {
        self.parse_failures + self.service_failures
    }
}

/// Outcome of every submitted row, addressable by identifier
#[derive(Debug, Clone)]
pub struct BatchResult {
    run_id: Uuid,
    outcomes: HashMap<String, ClassificationOutcome>,
    elapsed: Duration,
}

impl BatchResult {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            outcomes: HashMap::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn with_capacity(run_id: Uuid, capacity: usize) -> Self {
        Self {
            run_id,
            outcomes: HashMap::with_capacity(capacity),
            elapsed: Duration::ZERO,
        }
    }

    /// Record a row's outcome. Returns the previous outcome if the id was already present.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        outcome: ClassificationOutcome,
    ) -> Option<ClassificationOutcome> {
        self.outcomes.insert(id.into(), outcome)
    }

    pub(crate) fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn get(&self, id: &str) -> Option<&ClassificationOutcome> {
        self.outcomes.get(id)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClassificationOutcome)> {
        self.outcomes.iter()
    }

    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.outcomes.len(),
            ..Default::default()
        };

        for outcome in self.outcomes.values() {
            match outcome {
                ClassificationOutcome::Success { .. } => summary.succeeded += 1,
                ClassificationOutcome::SkippedNoText => summary.skipped += 1,
                ClassificationOutcome::ParseFailure { .. } => summary.parse_failures += 1,
                ClassificationOutcome::ServiceFailure { cause } => {
                    summary.service_failures += 1;
                    if cause.is_quota() {
                        summary.quota_failures += 1;
                    }
                }
            }
        }

        summary
    }
}
