//! fda483-ai library interface
//!
//! Classifies FDA Form 483 observations with a text-classification service
//! under a bounded concurrency budget, then merges the outcomes back onto
//! the source dataset.

pub mod config;
pub mod dataset;
pub mod error;
pub mod models;
pub mod services;

pub use crate::config::BatchConfig;
pub use crate::dataset::DatasetRow;
pub use crate::error::{InputError, ParseError, ServiceError, ServiceErrorKind};
pub use crate::models::{
    BatchResult, BatchSummary, ClassificationOutcome, LabeledDataset, LabeledRow,
    ObservationBatch, ObservationRecord, Schema,
};
pub use crate::services::{BatchOrchestrator, GeminiClient, ResultAggregator, TextClassifier};
