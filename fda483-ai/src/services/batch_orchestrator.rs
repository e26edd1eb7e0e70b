//! Batch classification orchestrator
//!
//! # Architecture
//! - Every row becomes one future; all rows are polled concurrently
//! - Each attempt holds a [`ConcurrencyLimiter`] slot only while the call
//!   is in flight; retry backoff is waited without a slot
//! - Outcomes are recorded by identifier in completion order
//!
//! Per-row error isolation: a failing row is recorded as failed and never
//! aborts or delays the other rows.

use crate::config::BatchConfig;
use crate::error::{ServiceError, ServiceErrorKind};
use crate::models::observation::{ObservationBatch, ObservationRecord};
use crate::models::outcome::{BatchResult, ClassificationOutcome};
use crate::models::schema::FieldMap;
use crate::services::classifier::TextClassifier;
use crate::services::concurrency_limiter::ConcurrencyLimiter;
use crate::services::payload::parse_response;
use crate::services::request_builder::{ClassificationRequest, RequestBuilder};
use crate::services::retry_policy::{AttemptError, RetryPolicy};
use fda483_common::events::{ClassificationEvent, EventBus};
use fda483_common::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Progress is logged at INFO every this many completed rows
const PROGRESS_LOG_INTERVAL: usize = 10;

/// Drives one batch of observations through the classification service
pub struct BatchOrchestrator {
    classifier: Arc<dyn TextClassifier>,
    config: BatchConfig,
    builder: RequestBuilder,
    limiter: ConcurrencyLimiter,
    retry: RetryPolicy,
    event_bus: Option<EventBus>,
}

impl BatchOrchestrator {
    /// # Errors
    /// Returns `Error::Config` when `config` fails validation.
    pub fn new(classifier: Arc<dyn TextClassifier>, config: BatchConfig) -> Result<Self> {
        config.validate()?;

        let builder = RequestBuilder::new(&config.schema);
        let limiter = ConcurrencyLimiter::new(config.concurrency_cap, config.call_delay)
            .with_requests_per_minute(config.requests_per_minute);
        let retry = RetryPolicy::new(config.retry_count, config.retry_backoff);

        Ok(Self {
            classifier,
            config,
            builder,
            limiter,
            retry,
            event_bus: None,
        })
    }

    /// Broadcast progress events on `event_bus`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Classify every record, returning one outcome per identifier
    pub async fn run(&self, batch: &ObservationBatch) -> BatchResult {
        let run_id = Uuid::new_v4();
        let start_time = Instant::now();
        let total = batch.len();

        tracing::info!(
            run_id = %run_id,
            total,
            service = self.classifier.name(),
            schema = %self.config.schema.name,
            concurrency_cap = self.config.concurrency_cap,
            "Starting classification batch"
        );
        self.emit(ClassificationEvent::BatchStarted {
            run_id,
            total,
            timestamp: chrono::Utc::now(),
        });

        let completed = AtomicUsize::new(0);
        let mut result = BatchResult::with_capacity(run_id, total);

        let mut pending: FuturesUnordered<_> = batch
            .iter()
            .map(|record| async move { (record.id.as_str(), self.classify_record(record).await) })
            .collect();

        while let Some((row_id, outcome)) = pending.next().await {
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            let status = outcome.status();

            tracing::debug!(
                run_id = %run_id,
                row_id,
                status = ?status,
                "({}/{}) {} Processed row",
                done,
                total,
                status.symbol()
            );
            if done % PROGRESS_LOG_INTERVAL == 0 || done == total {
                tracing::info!(
                    run_id = %run_id,
                    progress = format!("{}/{}", done, total),
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    "Classification progress"
                );
            }

            self.emit(ClassificationEvent::RowClassified {
                run_id,
                row_id: row_id.to_string(),
                status,
                completed: done,
                total,
            });

            result.insert(row_id, outcome);
        }

        result.set_elapsed(start_time.elapsed());
        let summary = result.summary();

        tracing::info!(
            run_id = %run_id,
            total = summary.total,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            parse_failures = summary.parse_failures,
            service_failures = summary.service_failures,
            quota_failures = summary.quota_failures,
            peak_in_flight = self.limiter.peak_in_flight(),
            elapsed_ms = result.elapsed().as_millis() as u64,
            "Classification batch complete"
        );
        self.emit(ClassificationEvent::BatchCompleted {
            run_id,
            total: summary.total,
            succeeded: summary.succeeded,
            failed: summary.failed(),
            skipped: summary.skipped,
            elapsed_ms: result.elapsed().as_millis() as u64,
            timestamp: chrono::Utc::now(),
        });

        result
    }

    /// Classify a single record (skip check, then retried attempts)
    pub async fn classify_record(&self, record: &ObservationRecord) -> ClassificationOutcome {
        let Some(text) = record.analyzable_text(self.config.min_text_length) else {
            tracing::debug!(row_id = %record.id, "No text to analyze, skipping");
            return ClassificationOutcome::SkippedNoText;
        };

        let request = self.builder.build(text);
        self.retry
            .attempt(&record.id, || self.attempt_once(&record.id, &request))
            .await
    }

    /// One gated, time-bounded call plus parsing
    async fn attempt_once(
        &self,
        row_id: &str,
        request: &ClassificationRequest,
    ) -> std::result::Result<FieldMap, AttemptError> {
        let raw_response = {
            let _permit = self.limiter.acquire().await.map_err(|e| {
                AttemptError::Service(ServiceError::new(ServiceErrorKind::Unknown, e.to_string()))
            })?;

            match tokio::time::timeout(self.config.call_timeout, self.classifier.classify(request))
                .await
            {
                Ok(reply) => reply.map_err(AttemptError::Service)?,
                Err(_) => {
                    return Err(AttemptError::Service(ServiceError::timeout(
                        self.config.call_timeout,
                    )))
                }
            }
        };

        parse_response(&self.config.schema, &raw_response).map_err(|error| {
            tracing::debug!(row_id, error = %error, "Response did not match schema");
            AttemptError::Parse {
                raw_response,
                error,
            }
        })
    }

    fn emit(&self, event: ClassificationEvent) {
        if let Some(event_bus) = &self.event_bus {
            event_bus.emit_lossy(event);
        }
    }
}
