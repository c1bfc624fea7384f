// Copyright (c) 2025 - Cowboy AI, Inc.
//! Retry policy for transactional units of work
//!
//! Executors hand each attempt of a unit of work to [`RetryPolicy::run`],
//! which repeats it while the failure is transient and the retry budget has
//! not been spent. Delays grow exponentially up to `max_delay`.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Errors that can tell whether another attempt might succeed
pub trait Retryable {
    /// Transient failures (leader changes, dropped connections, deadlocks)
    fn is_retryable(&self) -> bool;
}

/// Retry budget and backoff schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total time after which no new attempt is started
    #[serde(with = "duration_millis")]
    pub max_retry_time: Duration,
    /// Delay before the first retry
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,
    /// Factor applied to the delay after each retry
    pub multiplier: f64,
    /// Upper bound for a single delay
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retry_time: Duration::from_secs(30),
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_retry_time: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn with_max_retry_time(mut self, max_retry_time: Duration) -> Self {
        self.max_retry_time = max_retry_time;
        self
    }

    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let capped = millis.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }

    /// Run `attempt` until it succeeds, fails permanently, or the budget runs out
    ///
    /// The last error is returned when retries are exhausted.
    pub async fn run<T, E, F, Fut>(&self, mut attempt: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let start = Instant::now();
        let mut retries = 0u32;

        loop {
            match attempt().await {
                Ok(value) => {
                    if retries > 0 {
                        debug!("Unit of work succeeded after {} retries", retries);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    let delay = self.delay_for(retries);
                    if start.elapsed() + delay > self.max_retry_time {
                        warn!("Retry budget exhausted after {} attempts: {}", retries + 1, e);
                        return Err(e);
                    }
                    retries += 1;
                    debug!("Transient failure, retry {} in {:?}: {}", retries, delay, e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
