use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sfunet_domain::{DomainError, DomainResult, ErrorKind};

/// The State Store Port (`D`): a small key/value abstraction for
/// cross-node coordination. Operates on JSON strings at the trait boundary
/// so the trait stays object-safe; `get`/`set` below add typed
/// (de)serialization on top for call sites.
#[async_trait]
pub trait StateStorePort: Send + Sync {
    async fn get_raw(&self, key: &str) -> DomainResult<Option<String>>;
    async fn set_raw(&self, key: &str, value: String, ttl_secs: Option<u64>) -> DomainResult<()>;
    async fn delete(&self, key: &str) -> DomainResult<()>;
    async fn exists(&self, key: &str) -> DomainResult<bool>;
    async fn keys(&self, pattern: &str) -> DomainResult<Vec<String>>;
    async fn clear(&self) -> DomainResult<()>;
    async fn close(&self);
}

pub async fn get<T: DeserializeOwned>(store: &dyn StateStorePort, key: &str) -> DomainResult<Option<T>> {
    match store.get_raw(key).await? {
        Some(raw) => serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| DomainError::new(ErrorKind::StateStoreError, format!("corrupt value at {key}: {e}"))),
        None => Ok(None),
    }
}

pub async fn set<T: Serialize + Sync>(
    store: &dyn StateStorePort,
    key: &str,
    value: &T,
    ttl_secs: Option<u64>,
) -> DomainResult<()> {
    let raw = serde_json::to_string(value)
    .map_err(|e| DomainError::new(ErrorKind::StateStoreError, format!("failed to serialize {key}: {e}")))?;
    store.set_raw(key, raw, ttl_secs).await
}
