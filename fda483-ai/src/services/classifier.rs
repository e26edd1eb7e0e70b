//! Text classification service boundary

use crate::error::ServiceError;
use crate::services::request_builder::ClassificationRequest;
use async_trait::async_trait;

/// One call to an external text-classification service
///
/// Implementations must be safe to call concurrently and keep no mutable
/// per-call state. Retries, pacing and timeouts are applied by the caller.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Service name for logs
    fn name(&self) -> &'static str;

    /// Send the request and return the service's raw text reply
    ///
    /// # Errors
    /// Returns `ServiceError` when the call itself fails (quota, transport,
    /// authentication, server error).
    async fn classify(&self, request: &ClassificationRequest) -> Result<String, ServiceError>;
}
