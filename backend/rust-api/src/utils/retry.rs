use std::future::Future;
use std::time::Duration;

/// Exponential backoff with optional jitter.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// Push gateway calls: few attempts, longer waits.
    pub fn notification() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        std::cmp::min(current * 2, self.max_backoff)
    }

    fn jitter(&self) -> Duration {
        match self.jitter_max {
            Some(max) if !max.is_zero() => {
                let max_ms = max.as_millis() as u64;
                Duration::from_millis(rand::random::<u64>() % (max_ms + 1))
            }
            _ => Duration::ZERO,
        }
    }
}

pub async fn retry_async_with_config<F, Fut, T, E>(config: RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts_left = config.max_attempts.max(1);
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left -= 1;
                if attempts_left == 0 {
                    return Err(e);
                }
                tracing::warn!("Attempt failed, retrying in {:?}: {}", backoff, e);
                tokio::time::sleep(backoff + config.jitter()).await;
                backoff = config.next_backoff(backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_attempts: usize) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            jitter_max: None,
        }
    }

    #[tokio::test]
    async fn retry_succeeds_after_retries() {
        let counter = AtomicUsize::new(0);

        let res: Result<usize, &'static str> = retry_async_with_config(fast(3), || async {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("fail")
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(res, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_fails_after_max_attempts() {
        let counter = AtomicUsize::new(0);

        let res: Result<(), &'static str> = retry_async_with_config(fast(2), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("always fail")
        })
        .await;

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let counter = AtomicUsize::new(0);
        let _: Result<(), &'static str> = retry_async_with_config(fast(0), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("nope")
        })
        .await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_is_capped() {
        let cfg = RetryConfig::notification();
        let mut backoff = cfg.base_backoff;
        for _ in 0..10 {
            backoff = cfg.next_backoff(backoff);
        }
        assert_eq!(backoff, cfg.max_backoff);
    }
}
