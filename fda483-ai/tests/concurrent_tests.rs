//! Integration tests for the concurrency cap and per-row isolation

mod helpers;

use fda483_ai::error::ServiceError;
use fda483_ai::models::{ClassificationOutcome, ObservationBatch, ObservationRecord, Schema};
use fda483_ai::services::BatchOrchestrator;
use helpers::{categories_reply, fast_config, long_text, marker, ScriptedClassifier};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn batch_of(n: usize) -> ObservationBatch {
    ObservationBatch::new(
        (0..n)
            .map(|i| ObservationRecord::new(i.to_string(), Some(long_text(&marker(&i.to_string())))))
            .collect(),
    )
    .unwrap()
}

// ============================================================================
// Concurrency cap
// ============================================================================

#[tokio::test]
async fn test_in_flight_never_exceeds_cap() {
    let classifier = Arc::new(
        ScriptedClassifier::new(Ok(categories_reply(&[]))).with_delay(Duration::from_millis(20)),
    );
    let mut config = fast_config(Schema::deficiency_categories());
    config.concurrency_cap = 4;
    let orchestrator = BatchOrchestrator::new(classifier.clone(), config).unwrap();

    let result = orchestrator.run(&batch_of(40)).await;

    assert_eq!(result.len(), 40);
    assert_eq!(classifier.calls(), 40);
    assert!(
        classifier.max_in_flight() <= 4,
        "observed {} concurrent calls",
        classifier.max_in_flight()
    );
    assert!(orchestrator.limiter().peak_in_flight() <= 4);
    assert_eq!(orchestrator.limiter().in_flight(), 0);
}

#[tokio::test]
async fn test_cap_of_one_serializes_calls() {
    let classifier = Arc::new(
        ScriptedClassifier::new(Ok(categories_reply(&[]))).with_delay(Duration::from_millis(5)),
    );
    let mut config = fast_config(Schema::deficiency_categories());
    config.concurrency_cap = 1;
    let orchestrator = BatchOrchestrator::new(classifier.clone(), config).unwrap();

    orchestrator.run(&batch_of(8)).await;

    assert_eq!(classifier.max_in_flight(), 1);
}

#[tokio::test]
async fn test_rows_run_concurrently_up_to_cap() {
    let classifier = Arc::new(
        ScriptedClassifier::new(Ok(categories_reply(&[]))).with_delay(Duration::from_millis(100)),
    );
    let mut config = fast_config(Schema::deficiency_categories());
    config.concurrency_cap = 10;
    let orchestrator = BatchOrchestrator::new(classifier.clone(), config).unwrap();

    let start = Instant::now();
    orchestrator.run(&batch_of(10)).await;

    // Ten 100 ms calls in one wave, well under the serial 1 s
    assert!(start.elapsed() < Duration::from_millis(900));
    assert!(classifier.max_in_flight() > 1);
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_failing_rows_do_not_affect_others() {
    let mut classifier = ScriptedClassifier::new(Ok(categories_reply(&[])));
    for i in (0..20).filter(|i| i % 4 == 0) {
        classifier = classifier.script(
            marker(&i.to_string()),
            vec![
                Err(ServiceError::from_status(500, "internal error")),
                Err(ServiceError::from_status(500, "internal error")),
            ],
        );
    }
    let classifier = Arc::new(classifier);
    let orchestrator =
        BatchOrchestrator::new(classifier.clone(), fast_config(Schema::deficiency_categories()))
            .unwrap();

    let result = orchestrator.run(&batch_of(20)).await;

    let summary = result.summary();
    assert_eq!(summary.total, 20);
    assert_eq!(summary.service_failures, 5);
    assert_eq!(summary.succeeded, 15);
    assert_eq!(summary.quota_failures, 0);
    for i in 0..20 {
        let outcome = result.get(&i.to_string()).unwrap();
        assert_eq!(outcome.is_success(), i % 4 != 0, "row {}", i);
    }
    assert!(matches!(
        result.get("0"),
        Some(ClassificationOutcome::ServiceFailure { .. })
    ));
}

#[tokio::test]
async fn test_backoff_does_not_hold_a_slot() {
    let m = marker("slow");
    let classifier = Arc::new(
        ScriptedClassifier::new(Ok(categories_reply(&[])))
            .script(&m, vec![Err(ServiceError::from_status(503, "unavailable"))]),
    );
    let mut config = fast_config(Schema::deficiency_categories());
    config.concurrency_cap = 1;
    config.retry_backoff = Duration::from_millis(300);
    let orchestrator = BatchOrchestrator::new(classifier.clone(), config).unwrap();

    let mut records = vec![ObservationRecord::new("slow", Some(long_text(&m)))];
    records.extend((0..5).map(|i| ObservationRecord::new(i.to_string(), Some(long_text(&marker(&i.to_string()))))));
    let batch = ObservationBatch::new(records).unwrap();

    let start = Instant::now();
    let result = orchestrator.run(&batch).await;

    assert!(result.iter().all(|(_, outcome)| outcome.is_success()));
    assert_eq!(classifier.calls_for(&m), 2);
    // Other rows proceed during the retry backoff, so the batch takes about one backoff
    assert!(start.elapsed() < Duration::from_millis(600));
}
