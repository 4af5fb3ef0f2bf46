use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sfunet_config::{ResilienceSettings, StateStoreSettings};
use sfunet_domain::{DomainError, DomainResult, ErrorKind};
use sfunet_resilience::{with_timeout, CircuitBreaker, CircuitBreakerConfig};

use super::port::StateStorePort;

/// Remote state store (`E`) wrapping a Redis connection with the
/// resilience circuit breaker from: when the breaker is open,
/// calls fail fast with `circuitOpen` instead of piling up against a dead
/// backend.
pub struct RedisStateStore {
    manager: ConnectionManager,
    breaker: CircuitBreaker,
    call_timeout: Duration,
}

impl RedisStateStore {
    pub async fn connect(settings: &StateStoreSettings, resilience: &ResilienceSettings) -> anyhow::Result<Self> {
        let mut url = format!("redis://{}:{}/{}", settings.host, settings.port, settings.db);
        if let Some(password) = &settings.password {
            url = format!("redis://:{password}@{}:{}/{}", settings.host, settings.port, settings.db);
        }
        let client = redis::Client::open(url)?;
        let manager = client.get_connection_manager().await?;

        Ok(Self {
                manager,
                breaker: CircuitBreaker::new(CircuitBreakerConfig {
                        fail_threshold: resilience.n_fail,
                        monitor_window: Duration::from_secs(resilience.w_monitor_secs),
                        reset_timeout: Duration::from_secs(resilience.t_reset_secs),
                        trial_successes: resilience.n_trial,
                }),
                call_timeout: Duration::from_secs(5),
        })
    }

    async fn guarded<F, T>(&self, operation: &'static str, fut: F) -> DomainResult<T>
    where
    F: std::future::Future<Output = redis::RedisResult<T>>,
    {
        if !self.breaker.allow_call() {
            return Err(DomainError::new(ErrorKind::CircuitOpen, "state store circuit is open"));
        }

        let result = with_timeout(operation, self.call_timeout, fut).await?;
        match result {
            Ok(value) => {
                self.breaker.record_success();
                Ok(value)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(DomainError::new(ErrorKind::StateStoreError, format!("{operation}: {e}")))
            }
        }
    }
}

#[async_trait]
impl StateStorePort for RedisStateStore {
    async fn get_raw(&self, key: &str) -> DomainResult<Option<String>> {
        let mut conn = self.manager.clone();
        self.guarded("get", async move { conn.get(key).await }).await
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: Option<u64>) -> DomainResult<()> {
        let mut conn = self.manager.clone();
        let key = key.to_string();
        match ttl_secs {
            Some(ttl) => {
                self.guarded("setex", async move {
                        conn.set_ex::<_, _, >(key, value, ttl).await
                })
                .await
            }
            None => {
                self.guarded("set", async move { conn.set::<_, _, >(key, value).await })
                .await
            }
        }
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        let mut conn = self.manager.clone();
        let key = key.to_string();
        self.guarded("del", async move { conn.del::<_, >(key).await }).await
    }

    async fn exists(&self, key: &str) -> DomainResult<bool> {
        let mut conn = self.manager.clone();
        self.guarded("exists", async move { conn.exists(key).await }).await
    }

    async fn keys(&self, pattern: &str) -> DomainResult<Vec<String>> {
        let mut conn = self.manager.clone();
        let pattern = pattern.to_string();
        self.guarded("keys", async move { conn.keys(pattern).await }).await
    }

    async fn clear(&self) -> DomainResult<()> {
        let mut conn = self.manager.clone();
        self.guarded("flushdb", async move {
                redis::cmd("FLUSHDB").query_async(&mut conn).await
        })
        .await
    }

    async fn close(&self) {}
}
