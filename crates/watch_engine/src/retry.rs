use std::future::Future;
use std::time::Duration;

use watch_logging::watch_warn;

use crate::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `n * retry_delay` before retrying.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_delay: Duration::from_secs(5),
        }
    }
}

/// Runs `operation` until it succeeds, fails permanently or runs out of retries.
pub(crate) async fn with_retries<T, F, Fut>(
    policy: RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.kind.is_transient() && attempt <= policy.max_retries => {
                watch_warn!(
                    "{} attempt {}/{} failed: {}. Retrying",
                    label,
                    attempt,
                    policy.max_retries + 1,
                    err
                );
                tokio::time::sleep(policy.retry_delay * attempt).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
