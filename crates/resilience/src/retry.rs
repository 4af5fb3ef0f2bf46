use std::time::Duration;

use rand::Rng;

/// Exponential backoff with jitter, used only for transient client-initiated
/// connect flows : base `T_base`, factor 2, capped at 30s,
/// jittered by +-10%. `attempt` is zero-based (the first retry is attempt 0).
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt);
    let unjittered = base.saturating_mul(factor).min(cap);

    let mut rng = rand::thread_rng();
    let jitter_fraction = rng.gen_range(-0.10..=0.10);
    let millis = unjittered.as_millis() as f64 * (1.0 + jitter_fraction);
    Duration::from_millis(millis.max(0.0) as u64)
}

/// Retries `operation` until it returns `Ok` or `max_attempts` is exhausted,
/// sleeping a jittered exponential backoff between attempts. Intended for
/// client reconnect flows, not server-side adapter/state-store calls (those
/// go through `with_timeout` and the circuit breaker instead).
pub async fn retry_with_backoff<F, Fut, T, E>(
    max_attempts: u32,
    base: Duration,
    cap: Duration,
    mut operation: F,
) -> Result<T, E>
where
F: FnMut() -> Fut,
Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(err);
                }
                let delay = backoff_delay(attempt - 1, base, cap);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_grows_and_caps() {
        let base = Duration::from_millis(1000);
        let cap = Duration::from_millis(30_000);
        for attempt in 0..10 {
            let delay = backoff_delay(attempt, base, cap);
            assert!(delay <= Duration::from_millis(33_000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<u32, &str> = retry_with_backoff(
            5,
            Duration::from_millis(10),
            Duration::from_millis(100),
            move || {
                let calls = calls2.clone();
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("not yet")
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let result: Result<u32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(10),
            Duration::from_millis(100),
            || async { Err("nope") },
        )
        .await;
        assert_eq!(result.unwrap_err(), "nope");
    }
}
