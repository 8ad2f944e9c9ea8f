use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Bounded exponential backoff: `max_attempts` tries in total, waiting
/// `initial_delay`, then twice that, and so on between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Delay slept after the given failed attempt (1-based), or `None` after the last one.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts {
            return None;
        }
        Some(self.initial_delay * 2u32.saturating_pow(attempt - 1))
    }
}

/// Run `op` until it succeeds, `should_retry` rejects its error, or the
/// policy's attempts are used up. The error returned is always the last one
/// seen, so a caller can tell exhaustion from an abort by asking
/// `should_retry` again.
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if !should_retry(&e) {
                    tracing::debug!(attempt, error = %e, "not retrying");
                    return Err(e);
                }
                let Some(delay) = policy.delay_after(attempt) else {
                    tracing::warn!(attempt, error = %e, "giving up, attempts exhausted");
                    return Err(e);
                };
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
