//! Persistence boundary: a byte-oriented record store.
//!
//! Entities cross this boundary only in their marshaled record form, so any
//! backend that can keep `(kind, id) -> bytes` works. The in-memory
//! implementation backs tests and single-process deployments.

use async_trait::async_trait;
use keyfold_core::Result;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// One `(kind, id, bytes)` entry of a batched write.
pub type BatchEntry = (String, String, Vec<u8>);

/// A keyed store of marshaled entity records.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn put(&self, kind: &str, id: &str, bytes: Vec<u8>) -> Result<()>;

    /// Writes several records as one atomic batch: a concurrent reader sees
    /// either none of the entries or all of them, never a mix. Used where
    /// entities must replace together (auth record + envelope, invite + org).
    async fn put_batch(&self, entries: Vec<BatchEntry>) -> Result<()>;

    async fn get(&self, kind: &str, id: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, kind: &str, id: &str) -> Result<()>;
}

/// In-memory record store behind a single `RwLock`, so multi-record writes
/// issued while holding a handler's logical turn appear atomic to readers.
#[derive(Default)]
pub struct MemoryStorage {
    records: RwLock<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, kind: &str, id: &str, bytes: Vec<u8>) -> Result<()> {
        self.records
            .write()
            .await
            .insert((kind.to_string(), id.to_string()), bytes);
        Ok(())
    }

    async fn put_batch(&self, entries: Vec<BatchEntry>) -> Result<()> {
        // One write guard across the whole batch is what makes it atomic.
        let mut records = self.records.write().await;
        for (kind, id, bytes) in entries {
            records.insert((kind, id), bytes);
        }
        Ok(())
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .records
            .read()
            .await
            .get(&(kind.to_string(), id.to_string()))
            .cloned())
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<()> {
        self.records
            .write()
            .await
            .remove(&(kind.to_string(), id.to_string()));
        Ok(())
    }
}
