//! Exponential backoff retry for calls to the authorization server
//!
//! Only transient failures are retried (transport errors and 5xx responses,
//! see [`Error::is_transient`]). Successful responses and every other error,
//! including 4xx responses, are handed back after a single attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::{RequestBuilder, Response};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Backoff parameters. The defaults are 1s initial interval growing by 1.5x
/// with +/-50% jitter, capped at 30s per wait and 2 minutes in total.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub randomization_factor: f64,
    pub max_interval: Duration,
    pub max_elapsed_time: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 1.5,
            randomization_factor: 0.5,
            max_interval: Duration::from_secs(30),
            max_elapsed_time: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    /// Interval that follows `current`, capped at `max_interval`.
    pub fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier).min(self.max_interval)
    }

    /// Spread `interval` uniformly over `interval * (1 +/- randomization_factor)`.
    pub fn randomize(&self, interval: Duration) -> Duration {
        if self.randomization_factor <= 0.0 || interval.is_zero() {
            return interval;
        }
        let delta = interval.as_secs_f64() * self.randomization_factor;
        let low = interval.as_secs_f64() - delta;
        let high = interval.as_secs_f64() + delta;
        Duration::from_secs_f64(rand::thread_rng().gen_range(low..=high).max(0.0))
    }
}

#[derive(Clone, Debug, Default)]
pub struct RetryingExecutor {
    policy: RetryPolicy,
}

impl RetryingExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `operation` until it succeeds, fails permanently, or the next wait
    /// would carry it past the elapsed time budget. Returns the last error in
    /// the latter case.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let mut interval = self.policy.initial_interval;
        let mut attempt: u32 = 1;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => err,
            };

            // Stop when the next attempt would start past the budget.
            let elapsed = started.elapsed();
            let delay = self.policy.randomize(interval);
            if elapsed + delay > self.policy.max_elapsed_time {
                warn!(
                    attempts = attempt,
                    elapsed_secs = elapsed.as_secs(),
                    "Giving up after exhausting retry budget: {}",
                    err
                );
                return Err(err);
            }

            debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Transient failure, retrying: {}",
                err
            );
            tokio::time::sleep(delay).await;

            interval = self.policy.next_interval(interval);
            attempt = attempt.saturating_add(1);
        }
    }
}

/// Send `request`, mapping transport failures to [`Error::HttpError`] and 5xx
/// responses to [`Error::ServerError`]. Any other response is returned as is.
pub async fn send_classified(request: RequestBuilder) -> Result<Response> {
    let response = request.send().await.map_err(Error::HttpError)?;
    let status = response.status();
    if status.is_server_error() {
        return Err(Error::ServerError {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }
    Ok(response)
}
