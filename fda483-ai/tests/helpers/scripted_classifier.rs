//! In-process classification service double
//!
//! Replies are scripted per row: the first registered marker found in the
//! prompt selects a queue of replies, consumed one per call. Unscripted
//! calls (or exhausted queues) get the fallback reply.

use async_trait::async_trait;
use fda483_ai::error::ServiceError;
use fda483_ai::services::{ClassificationRequest, TextClassifier};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Reply = Result<String, ServiceError>;

pub struct ScriptedClassifier {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls_by_marker: Mutex<HashMap<String, usize>>,
    fallback: Reply,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedClassifier {
    pub fn new(fallback: Reply) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls_by_marker: Mutex::new(HashMap::new()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold every call for `delay` before replying
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue `replies` for prompts containing `marker`
    pub fn script(self, marker: impl Into<String>, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(marker.into(), replies.into_iter().collect());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, marker: &str) -> usize {
        self.calls_by_marker
            .lock()
            .unwrap()
            .get(marker)
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, prompt: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        let Some((marker, queue)) = scripts.iter_mut().find(|(marker, _)| prompt.contains(marker.as_str())) else {
            return self.fallback.clone();
        };

        *self
            .calls_by_marker
            .lock()
            .unwrap()
            .entry(marker.clone())
            .or_insert(0) += 1;

        queue.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl TextClassifier for ScriptedClassifier {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn classify(&self, request: &ClassificationRequest) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.next_reply(&request.prompt);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}
