//! Bounded retries and failure quarantine
//!
//! Every extraction attempt is logged as an [`ExtractionAttempt`]. Retryable
//! failures are tried again after a fixed backoff until the budget is spent;
//! anything else stops after the first attempt. URLs that never succeed are
//! handed to a [`Quarantine`] sink.

use crate::config::RetryConfig;
use crate::crawler::ExtractError;
use crate::state::{AttemptOutcome, ExtractionAttempt, FailureRecord, Strategy};
use std::future::Future;
use std::time::Duration;

/// Destination for URLs whose retry budget ran out
pub trait Quarantine {
    fn quarantine(&mut self, record: FailureRecord) -> crate::Result<()>;
}

impl Quarantine for Vec<FailureRecord> {
    fn quarantine(&mut self, record: FailureRecord) -> crate::Result<()> {
        self.push(record);
        Ok(())
    }
}

/// Fixed-backoff retry budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` counts the first try and is at least 1
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, Duration::from_secs(config.backoff_secs))
    }

    /// A single attempt, no retries
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `operation` until it succeeds, fails terminally, or the budget
    /// is spent
    ///
    /// `operation` receives the 1-based attempt number. The last error is
    /// returned when no attempt succeeds.
    pub async fn run<T, F, Fut>(
        &self,
        url: &str,
        strategy: Strategy,
        mut operation: F,
    ) -> Result<T, ExtractError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ExtractError>>,
    {
        let mut attempt = 1;
        loop {
            let result = operation(attempt).await;

            let outcome = match &result {
                Ok(_) => AttemptOutcome::Succeeded,
                Err(e) if e.is_retryable() => AttemptOutcome::Retryable(e.to_string()),
                Err(e) => AttemptOutcome::Fatal(e.to_string()),
            };
            log_attempt(&ExtractionAttempt {
                url: url.to_string(),
                strategy,
                attempt,
                outcome,
            });

            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    if !self.backoff.is_zero() {
                        tokio::time::sleep(self.backoff).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Like [`run`](Self::run), but quarantines the URL on final failure
    ///
    /// Returns `Ok(None)` when the URL was quarantined. Only a failing sink
    /// is an error.
    pub async fn run_or_quarantine<T, F, Fut, Q>(
        &self,
        url: &str,
        strategy: Strategy,
        sink: &mut Q,
        operation: F,
    ) -> crate::Result<Option<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ExtractError>>,
        Q: Quarantine + ?Sized,
    {
        match self.run(url, strategy, operation).await {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                sink.quarantine(FailureRecord::new(url, e.reason()))?;
                Ok(None)
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

fn log_attempt(attempt: &ExtractionAttempt) {
    match &attempt.outcome {
        AttemptOutcome::Succeeded => tracing::debug!(
            "{} attempt {} for {} succeeded",
            attempt.strategy,
            attempt.attempt,
            attempt.url
        ),
        AttemptOutcome::Retryable(reason) => tracing::warn!(
            "{} attempt {} for {} failed: {}",
            attempt.strategy,
            attempt.attempt,
            attempt.url,
            reason
        ),
        AttemptOutcome::Fatal(reason) => tracing::warn!(
            "{} attempt {} for {} failed permanently: {}",
            attempt.strategy,
            attempt.attempt,
            attempt.url,
            reason
        ),
    }
}
