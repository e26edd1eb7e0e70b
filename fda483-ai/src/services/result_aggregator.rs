//! Merge batch outcomes back onto the source dataset
//!
//! Pure and total: every dataset row yields exactly one labeled row, with
//! schema defaults wherever no successful outcome exists.

use crate::dataset::DatasetRow;
use crate::models::labeled::{LabeledDataset, LabeledRow};
use crate::models::outcome::{BatchResult, ClassificationOutcome, MISSING_OUTCOME_MARKER};
use crate::models::schema::Schema;

/// Left-joins a [`BatchResult`] onto dataset rows by identifier
#[derive(Debug, Clone, Copy)]
pub struct ResultAggregator<'a> {
    schema: &'a Schema,
}

impl<'a> ResultAggregator<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema }
    }

    /// One labeled row per dataset row, in dataset order
    pub fn merge(&self, dataset: &[DatasetRow], batch_result: &BatchResult) -> LabeledDataset {
        let rows = dataset
            .iter()
            .map(|row| self.label_row(row, batch_result.get(&row.id)))
            .collect();
        LabeledDataset { rows }
    }

    fn label_row(&self, row: &DatasetRow, outcome: Option<&ClassificationOutcome>) -> LabeledRow {
        let mut labels = self.schema.defaults();

        let error = match outcome {
            Some(ClassificationOutcome::Success { fields }) => {
                for (name, value) in fields {
                    if self.schema.field(name).is_some() {
                        labels.insert(name.clone(), value.clone());
                    }
                }
                None
            }
            Some(failure) => failure.error_marker(),
            None => {
                tracing::warn!(row_id = %row.id, "Dataset row has no classification outcome");
                Some(MISSING_OUTCOME_MARKER.to_string())
            }
        };

        LabeledRow {
            id: row.id.clone(),
            columns: row.columns.clone(),
            labels,
            error,
        }
    }
}

/// Shorthand for [`ResultAggregator::merge`]
pub fn merge(schema: &Schema, dataset: &[DatasetRow], batch_result: &BatchResult) -> LabeledDataset {
    ResultAggregator::new(schema).merge(dataset, batch_result)
}
