use std::time::{Duration, Instant};

use dashmap::DashMap;
use sfunet_domain::DomainResult;

use super::port::StateStorePort;
use async_trait::async_trait;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

/// Process-local implementation of the state store : no network
/// round-trip, used when `state-store.enabled = false`. A background
/// sweeper evicts expired entries; reads also check expiry lazily so a
/// lookup never returns stale data even between sweeps.
pub struct InMemoryStateStore {
    entries: DashMap<String, Entry>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Spawns the TTL sweeper; aborts are the caller's responsibility.
    pub fn spawn_ttl_sweeper(self: std::sync::Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                loop {
                    ticker.tick().await;
                    let now = Instant::now();
                    self.entries.retain(|_, e| e.expires_at.map(|exp| exp > now).unwrap_or(true));
                }
        })
    }
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStorePort for InMemoryStateStore {
    async fn get_raw(&self, key: &str) -> DomainResult<Option<String>> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };
        if let Some(exp) = entry.expires_at {
            if exp <= Instant::now() {
                drop(entry);
                self.entries.remove(key);
                return Ok(None);
            }
        }
        Ok(Some(entry.value.clone()))
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: Option<u64>) -> DomainResult<()> {
        let expires_at = ttl_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
        self.entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> DomainResult<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> DomainResult<bool> {
        Ok(self.get_raw(key).await?.is_some())
    }

    async fn keys(&self, pattern: &str) -> DomainResult<Vec<String>> {
        let prefix = pattern.trim_end_matches('*');
        Ok(self
            .entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn clear(&self) -> DomainResult<()> {
        self.entries.clear();
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryStateStore::new();
        store.set_raw("k", "v".into(), None).await.unwrap();
        assert_eq!(store.get_raw("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let store = InMemoryStateStore::new();
        store.set_raw("k", "v".into(), Some(1)).await.unwrap();
        assert!(store.exists("k").await.unwrap());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn keys_matches_prefix_pattern() {
        let store = InMemoryStateStore::new();
        store.set_raw("room:1", "a".into(), None).await.unwrap();
        store.set_raw("room:2", "b".into(), None).await.unwrap();
        store.set_raw("other", "c".into(), None).await.unwrap();
        let mut keys = store.keys("room:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["room:1".to_string(), "room:2".to_string()]);
    }
}
