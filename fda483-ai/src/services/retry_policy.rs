//! Bounded retry for a single classification attempt
//!
//! **Algorithm:**
//! 1. Run the attempt
//! 2. On success, return `Success`
//! 3. On service or parse failure, if retries remain: log WARN, wait the fixed
//!    backoff, run again
//! 4. When retries are exhausted, return the last failure as the outcome
//!
//! No exponential growth: the backoff is the same before every retry.

use crate::error::{ParseError, ServiceError};
use crate::models::outcome::ClassificationOutcome;
use crate::models::schema::FieldMap;
use std::future::Future;
use std::time::Duration;

/// Why one attempt did not produce fields
#[derive(Debug, Clone)]
pub enum AttemptError {
    /// The call failed
    Service(ServiceError),
    /// The call returned text that did not fit the schema
    Parse {
        raw_response: String,
        error: ParseError,
    },
}

impl AttemptError {
    fn into_outcome(self) -> ClassificationOutcome {
        match self {
            AttemptError::Service(cause) => ClassificationOutcome::ServiceFailure { cause },
            AttemptError::Parse { raw_response, .. } => {
                ClassificationOutcome::ParseFailure { raw_response }
            }
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttemptError::Service(e) => write!(f, "service failure: {}", e),
            AttemptError::Parse { error, .. } => write!(f, "parse failure: {}", error),
        }
    }
}

/// Fixed-backoff retry with a bounded number of extra attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    retries: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff: Duration) -> Self {
        Self { retries, backoff }
    }

    /// Single attempt, no retry
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Run `operation` until it succeeds or `1 + retries` attempts have failed
    ///
    /// # Arguments
    /// * `row_id` - Row identifier for logging
    /// * `operation` - Produces one attempt per call
    pub async fn attempt<F, Fut>(&self, row_id: &str, mut operation: F) -> ClassificationOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<FieldMap, AttemptError>>,
    {
        let max_attempts = self.retries.saturating_add(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(fields) => {
                    if attempt > 1 {
                        tracing::info!(row_id, attempt, "Classification succeeded after retry");
                    }
                    return ClassificationOutcome::Success { fields };
                }
                Err(err) if attempt < max_attempts => {
                    tracing::warn!(
                        row_id,
                        attempt,
                        backoff_ms = self.backoff.as_millis() as u64,
                        error = %err,
                        "Classification attempt failed, will retry after backoff"
                    );
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                }
                Err(err) => {
                    match &err {
                        AttemptError::Service(cause) if cause.is_quota() => {
                            tracing::warn!(
                                row_id,
                                attempt,
                                error = %err,
                                "Quota error persisted after retries, row recorded as failed"
                            );
                        }
                        _ => {
                            tracing::error!(
                                row_id,
                                attempt,
                                error = %err,
                                "Classification failed after retries"
                            );
                        }
                    }
                    return err.into_outcome();
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1, Duration::from_secs(5))
    }
}
