use crate::store::StateStore;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const TOKEN_KIND: &str = "token";

/// One upstream credential: a bearer token bound to the tenant URL it was
/// issued for. Tokens live until an operator deletes them; the pool never
/// refreshes or rotates them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenRecord {
    pub token: String,
    pub tenant_url: String,
    pub issued_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("no credentials available")]
    NoCredentialsAvailable,
    #[error("store error: {0}")]
    Store(String),
}

#[derive(Clone)]
pub struct TokenPool {
    store: Arc<dyn StateStore>,
}

impl TokenPool {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Uniform random pick over a snapshot of the stored records. Load is
    /// spread across accounts without tracking per-token usage or health.
    pub async fn acquire(&self) -> Result<TokenRecord, PoolError> {
        let mut records = self.list().await?;
        if records.is_empty() {
            return Err(PoolError::NoCredentialsAvailable);
        }
        let idx = rand::thread_rng().gen_range(0..records.len());
        Ok(records.swap_remove(idx))
    }

    pub async fn list(&self) -> Result<Vec<TokenRecord>, PoolError> {
        let stored = self
            .store
            .list(TOKEN_KIND)
            .await
            .map_err(PoolError::Store)?;
        let mut out = Vec::with_capacity(stored.len());
        for record in stored {
            match serde_json::from_value::<TokenRecord>(record.value) {
                Ok(token) => out.push(token),
                Err(err) => {
                    tracing::warn!("skipping undecodable token record {}: {}", record.id, err);
                }
            }
        }
        Ok(out)
    }

    pub async fn put(&self, record: TokenRecord) -> Result<(), PoolError> {
        let value = serde_json::to_value(&record).map_err(|err| PoolError::Store(err.to_string()))?;
        self.store
            .put(TOKEN_KIND, &record.token, value)
            .await
            .map_err(PoolError::Store)
    }

    pub async fn delete(&self, token: &str) -> Result<(), PoolError> {
        self.store
            .delete(TOKEN_KIND, token)
            .await
            .map_err(PoolError::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;

    fn record(token: &str) -> TokenRecord {
        TokenRecord {
            token: token.to_string(),
            tenant_url: "https://tenant.example.com/".to_string(),
            issued_at: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn acquire_on_empty_pool_fails() {
        let pool = TokenPool::new(Arc::new(MemoryStateStore::default()));
        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, PoolError::NoCredentialsAvailable));
    }

    #[tokio::test]
    async fn acquire_with_single_record_is_deterministic() {
        let pool = TokenPool::new(Arc::new(MemoryStateStore::default()));
        pool.put(record("tok_a")).await.unwrap();
        for _ in 0..8 {
            let got = pool.acquire().await.unwrap();
            assert_eq!(got, record("tok_a"));
        }
    }

    #[tokio::test]
    async fn put_is_keyed_by_token_value() {
        let pool = TokenPool::new(Arc::new(MemoryStateStore::default()));
        pool.put(record("tok_a")).await.unwrap();
        let mut updated = record("tok_a");
        updated.tenant_url = "https://other.example.com/".to_string();
        pool.put(updated.clone()).await.unwrap();
        let records = pool.list().await.unwrap();
        assert_eq!(records, vec![updated]);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let pool = TokenPool::new(Arc::new(MemoryStateStore::default()));
        pool.put(record("tok_a")).await.unwrap();
        pool.put(record("tok_b")).await.unwrap();
        pool.delete("tok_a").await.unwrap();
        let records = pool.list().await.unwrap();
        assert_eq!(records, vec![record("tok_b")]);
    }

    #[tokio::test]
    async fn acquire_only_returns_stored_records() {
        let pool = TokenPool::new(Arc::new(MemoryStateStore::default()));
        pool.put(record("tok_a")).await.unwrap();
        pool.put(record("tok_b")).await.unwrap();
        for _ in 0..16 {
            let got = pool.acquire().await.unwrap();
            assert!(got.token == "tok_a" || got.token == "tok_b");
        }
    }
}
