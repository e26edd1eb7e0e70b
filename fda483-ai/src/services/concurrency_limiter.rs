//! Shared gate bounding in-flight classification calls
//!
//! Admission is FIFO (tokio semaphore), so every waiter is eventually
//! admitted. After admission each call is additionally paced by a fixed delay
//! and, when configured, by a global requests-per-minute quota.

use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("concurrency gate closed")]
pub struct GateClosed;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Counting gate for classification calls
pub struct ConcurrencyLimiter {
    semaphore: Semaphore,
    capacity: usize,
    call_delay: Duration,
    rate_limiter: Option<DirectRateLimiter>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Slot held for the duration of one call; released on drop
pub struct CallPermit<'a> {
    _permit: SemaphorePermit<'a>,
    in_flight: &'a AtomicUsize,
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// Gate admitting at most `capacity` calls (minimum 1)
    pub fn new(capacity: usize, call_delay: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
            call_delay,
            rate_limiter: None,
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Add a global requests-per-minute cap; `None` or zero disables it
    pub fn with_requests_per_minute(mut self, requests_per_minute: Option<u32>) -> Self {
        self.rate_limiter = requests_per_minute
            .and_then(NonZeroU32::new)
            .map(|rpm| RateLimiter::direct(Quota::per_minute(rpm)));
        self
    }

    /// Wait for a free slot, then apply pacing
    ///
    /// # Errors
    /// Returns `GateClosed` after [`close`](Self::close); waiters fail fast.
    pub async fn acquire(&self) -> Result<CallPermit<'_>, GateClosed> {
        let permit = self.semaphore.acquire().await.map_err(|_| GateClosed)?;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let call_permit = CallPermit {
            _permit: permit,
            in_flight: &self.in_flight,
        };

        if let Some(rate_limiter) = &self.rate_limiter {
            rate_limiter.until_ready().await;
        }
        if !self.call_delay.is_zero() {
            tokio::time::sleep(self.call_delay).await;
        }

        Ok(call_permit)
    }

    /// Refuse all pending and future acquisitions
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest concurrent in-flight count observed so far
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for ConcurrencyLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyLimiter")
            .field("capacity", &self.capacity)
            .field("call_delay", &self.call_delay)
            .field("rate_limited", &self.rate_limiter.is_some())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
