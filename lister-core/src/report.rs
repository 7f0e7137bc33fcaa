use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::backend::BackendResult;
use crate::config::RetrySection;

/// Delivers terminal status reports with bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct StatusReporter {
    max_attempts: usize,
    base_delay: Duration,
}

impl StatusReporter {
    pub fn new(config: &RetrySection) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    pub fn with_limits(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Wait after a failed 1-based `attempt`: `base * 2^attempt`.
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let exponent = u32::try_from(attempt).unwrap_or(u32::MAX).min(20);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Runs `operation` until it succeeds or the attempts run out. Returns
    /// whether the report was delivered; never propagates the failure.
    pub async fn report_with_retry<F, Fut>(&self, label: &str, mut operation: F) -> bool
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = BackendResult<()>>,
    {
        let mut attempt = 1usize;
        let mut waited = Duration::ZERO;
        loop {
            match operation(attempt).await {
                Ok(()) => {
                    info!(report = label, attempt, "status report delivered");
                    return true;
                }
                Err(err) if attempt >= self.max_attempts => {
                    error!(
                        report = label,
                        attempts = attempt,
                        waited_ms = waited.as_millis() as u64,
                        error = %err,
                        "giving up on status report"
                    );
                    return false;
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        report = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "status report failed; backing off"
                    );
                    sleep(delay).await;
                    waited += delay;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new(&RetrySection::default())
    }
}
