//! Data models for fda483-ai
//!
//! - Observation records and validated batches
//! - Classification schemas and field values
//! - Per-row outcomes, batch results and labeled output rows

pub mod labeled;
pub mod observation;
pub mod outcome;
pub mod schema;

pub use labeled::{LabeledDataset, LabeledRow, ERROR_COLUMN};
pub use observation::{ObservationBatch, ObservationRecord};
pub use outcome::{BatchResult, BatchSummary, ClassificationOutcome};
pub use schema::{FieldKind, FieldMap, FieldValue, Schema, SchemaField};
