//! Jittered exponential backoff shared by every crate with a transient-error
//! retry path (the Artifact Store Adapter, the Credit Ledger Client, and the
//! Clip Generator's provider polling).

use std::future::Future;
use std::time::Duration;

/// Backoff parameters for [`retry_async`].
#[derive(Debug, Clone, Copy)]
pub struct BackoffConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffConfig {
    pub const fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1 << attempt.min(16));
        let capped = exp.min(self.max_delay);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let jitter = (nanos % 1000) as f64 / 1000.0;
        Duration::from_secs_f64(capped.as_secs_f64() * jitter).max(Duration::from_millis(1))
    }
}

/// Retry `op` up to `config.max_attempts` times. `is_retryable` classifies
/// each error; the first non-retryable error or the last attempt's error is
/// returned.
pub async fn retry_async<T, E, F, Fut>(
    config: BackoffConfig,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt + 1 < config.max_attempts && is_retryable(&e) => {
                tokio::time::sleep(config.delay_for(attempt)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let attempts = AtomicU32::new(0);
        let config = BackoffConfig::new(5, Duration::from_millis(1), Duration::from_millis(5));
        let result: Result<u32, &str> = retry_async(config, |_| true, || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("transient")
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn stops_on_non_retryable() {
        let config = BackoffConfig::new(5, Duration::from_millis(1), Duration::from_millis(5));
        let result: Result<u32, &str> = retry_async(config, |_| false, || async { Err("fatal") }).await;
        assert_eq!(result, Err("fatal"));
    }
}
