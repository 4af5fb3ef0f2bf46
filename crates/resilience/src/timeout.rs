use std::future::Future;
use std::time::Duration;

use sfunet_domain::{DomainError, ErrorKind};

/// Wraps any outbound call (adapter, state store) with a per-operation
/// deadline . On deadline, yields a `timeout` error; the caller
/// is responsible for best-effort rollback (closing any partially-created
/// resource) since this wrapper has no visibility into what `fut` touched.
pub async fn with_timeout<F, T>(
    operation: &str,
    deadline: Duration,
    fut: F,
) -> Result<T, DomainError>
where
F: Future<Output = T>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(value) => Ok(value),
        Err(_) => {
            tracing::warn!(operation, ms = deadline.as_millis() as u64, "operation timed out");
            Err(DomainError::new(
                    ErrorKind::Timeout,
                    format!("{operation} exceeded {}ms", deadline.as_millis()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_before_deadline() {
        let result = with_timeout("noop", Duration::from_millis(50), async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn exceeding_deadline_yields_timeout() {
        let result = with_timeout("slow", Duration::from_millis(10), async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                42
        })
        .await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Timeout);
    }
}
