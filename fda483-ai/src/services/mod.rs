//! Classification services
//!
//! Pipeline per row: request_builder → concurrency_limiter → classifier
//! → payload, wrapped by retry_policy and driven by batch_orchestrator.
//! result_aggregator joins outcomes back onto the dataset.

pub mod batch_orchestrator;
pub mod classifier;
pub mod concurrency_limiter;
pub mod gemini_client;
pub mod payload;
pub mod request_builder;
pub mod result_aggregator;
pub mod retry_policy;

pub use batch_orchestrator::BatchOrchestrator;
pub use classifier::TextClassifier;
pub use concurrency_limiter::{CallPermit, ConcurrencyLimiter, GateClosed};
pub use gemini_client::{GeminiClient, GeminiSettings};
pub use payload::{extract_payload, parse_response};
pub use request_builder::{ClassificationRequest, RequestBuilder};
pub use result_aggregator::{merge, ResultAggregator};
pub use retry_policy::{AttemptError, RetryPolicy};
