use std::sync::Arc;
use std::thread;
use std::time::Duration;

use facade_contracts::errors::{FacadeError, Result};
use tracing::warn;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Wait before retry `retry` (1-based): base, 2*base, 4*base, ...
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// What the invoker reports before each backoff wait.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryNotice {
    pub attempt: u32,
    pub attempts: u32,
    pub delay: Duration,
    pub error: FacadeError,
}

pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Runs a remote call with bounded exponential backoff. Only
/// [`FacadeError::is_retryable`] failures are retried; the last error is
/// returned exactly as the operation produced it.
#[derive(Clone)]
pub struct RetryingInvoker {
    policy: RetryPolicy,
    sleeper: Sleeper,
}

impl std::fmt::Debug for RetryingInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingInvoker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for RetryingInvoker {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryingInvoker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            sleeper: Arc::new(thread::sleep),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn invoke<T>(&self, operation: impl FnMut() -> Result<T>) -> Result<T> {
        self.invoke_observed(operation, |_| {})
    }

    pub fn invoke_observed<T>(
        &self,
        mut operation: impl FnMut() -> Result<T>,
        mut observer: impl FnMut(&RetryNotice),
    ) -> Result<T> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() || attempt >= attempts => return Err(err),
                Err(err) => {
                    let delay = self.policy.delay_before_retry(attempt);
                    warn!(
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "remote call failed; retrying"
                    );
                    observer(&RetryNotice {
                        attempt,
                        attempts,
                        delay,
                        error: err,
                    });
                    (self.sleeper)(delay);
                    attempt += 1;
                }
            }
        }
    }
}
