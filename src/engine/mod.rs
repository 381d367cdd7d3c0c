//! Assertion Engine
//!
//! Evaluates an ordered list of [`Assertion`]s against a [`ResourceClient`]
//! and returns exactly one [`AssertionResult`] per assertion, in declaration
//! order. Per-assertion failures (missing resources, provider outages,
//! predicate faults, the global deadline) always become failing results;
//! nothing short-circuits the run.
//!
//! # Example
//!
//! ```ignore
//! let engine = Engine::new().parallel(Some(4)).with_timeout(Duration::from_secs(60));
//! let results = engine.evaluate(&assertions, &client).await;
//! ```

mod retry;

pub use retry::RetryPolicy;

use crate::assertion::{Assertion, AssertionResult};
use crate::client::{FetchError, ResourceClient};
use futures::stream::{self, StreamExt};
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::Instant;

/// Detail for a selector the provider does not know
pub const NOT_FOUND: &str = "resource not found";
/// Detail once transient failures have used up every retry
pub const PROVIDER_UNAVAILABLE: &str = "provider unavailable";
/// Detail for assertions cut off by the global deadline
pub const TIMED_OUT: &str = "timed out";

/// Upper bound on the default worker count in parallel mode
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// Scheduling mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    #[default]
    Sequential,
    /// `None` means one worker per assertion, capped at [`MAX_DEFAULT_WORKERS`]
    Parallel { workers: Option<usize> },
}

#[derive(Debug, Clone, Default)]
pub struct Engine {
    retry: RetryPolicy,
    concurrency: Concurrency,
    timeout: Option<Duration>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn parallel(mut self, workers: Option<usize>) -> Self {
        self.concurrency = Concurrency::Parallel { workers };
        self
    }

    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Deadline for the whole run, measured from the start of `evaluate`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Number of assertions evaluated at once for a run of `count`
    pub fn worker_count(&self, count: usize) -> usize {
        match self.concurrency {
            Concurrency::Sequential => 1,
            Concurrency::Parallel { workers: Some(n) } => n.max(1),
            Concurrency::Parallel { workers: None } => count.clamp(1, MAX_DEFAULT_WORKERS),
        }
    }

    /// Evaluate every assertion. Always returns `assertions.len()` results,
    /// in the same order.
    pub async fn evaluate(
        &self,
        assertions: &[Assertion],
        client: &dyn ResourceClient,
    ) -> Vec<AssertionResult> {
        let deadline = self.timeout.and_then(|t| {
            let deadline = Instant::now().checked_add(t);
            if deadline.is_none() {
                tracing::warn!("Timeout {:?} is out of range; running without a deadline", t);
            }
            deadline
        });
        let workers = self.worker_count(assertions.len());

        tracing::info!(
            "Evaluating {} assertions against {} ({} worker(s), timeout {:?})",
            assertions.len(),
            client.name(),
            workers,
            self.timeout
        );

        // `buffered` yields in input order regardless of completion order
        stream::iter(assertions)
            .map(|assertion| self.evaluate_before(assertion, client, deadline))
            .buffered(workers)
            .collect()
            .await
    }

    async fn evaluate_before(
        &self,
        assertion: &Assertion,
        client: &dyn ResourceClient,
        deadline: Option<Instant>,
    ) -> AssertionResult {
        let Some(deadline) = deadline else {
            return self.evaluate_one(assertion, client).await;
        };

        if Instant::now() >= deadline {
            tracing::warn!("Deadline passed before '{}' started", assertion.description);
            return AssertionResult::failed(&assertion.description, TIMED_OUT);
        }

        match tokio::time::timeout_at(deadline, self.evaluate_one(assertion, client)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("'{}' abandoned at deadline", assertion.description);
                AssertionResult::failed(&assertion.description, TIMED_OUT)
            }
        }
    }

    async fn evaluate_one(
        &self,
        assertion: &Assertion,
        client: &dyn ResourceClient,
    ) -> AssertionResult {
        let selector = &assertion.selector;
        let fetched = self
            .retry
            .run(move |attempt| {
                tracing::debug!("Fetching {} (attempt {})", selector, attempt);
                client.fetch(selector)
            })
            .await;

        let descriptor = match fetched {
            Ok(descriptor) => descriptor,
            Err(err) => {
                tracing::info!("'{}' failed: {}", assertion.description, err);
                let detail = match err {
                    FetchError::NotFound { .. } => NOT_FOUND.to_string(),
                    FetchError::Transient(_) => PROVIDER_UNAVAILABLE.to_string(),
                    other => other.to_string(),
                };
                return AssertionResult::failed(&assertion.description, detail);
            }
        };

        let verdict = std::panic::catch_unwind(AssertUnwindSafe(|| {
            assertion.predicate.evaluate(&descriptor)
        }));

        match verdict {
            Ok(Ok(outcome)) => {
                tracing::debug!(
                    "'{}' evaluated: passed={}",
                    assertion.description,
                    outcome.passed
                );
                AssertionResult::from_outcome(&assertion.description, outcome)
            }
            Ok(Err(fault)) => {
                tracing::warn!("Predicate fault in '{}': {}", assertion.description, fault);
                AssertionResult::failed(&assertion.description, fault.to_string())
            }
            Err(_) => {
                tracing::error!("Predicate panicked in '{}'", assertion.description);
                AssertionResult::failed(&assertion.description, "predicate panicked")
            }
        }
    }
}
