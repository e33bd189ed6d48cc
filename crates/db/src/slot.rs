//! Durable key-value slots holding serialized drafts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use onboard_core::types::Timestamp;
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::RwLock;

#[derive(Debug, thiserror::Error)]
pub enum DraftStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A write issued through the debounced writer failed.
    #[error("Deferred draft write failed: {0}")]
    Deferred(String),

    #[error("Draft writer is no longer running")]
    WriterClosed,
}

/// A durable slot that stores one JSON value per key.
#[async_trait]
pub trait DraftSlot: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Value>, DraftStoreError>;

    /// Overwrite the whole value stored under `key`.
    async fn write(&self, key: &str, payload: &Value, saved_at: Timestamp)
        -> Result<(), DraftStoreError>;

    async fn remove(&self, key: &str) -> Result<(), DraftStoreError>;

    /// Delete every slot last written before `cutoff`. Returns the count.
    async fn purge_older_than(&self, cutoff: Timestamp) -> Result<u64, DraftStoreError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Slot backed by the `onboarding_drafts` table.
#[derive(Clone)]
pub struct PgDraftSlot {
    pool: PgPool,
}

impl PgDraftSlot {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DraftSlot for PgDraftSlot {
    async fn read(&self, key: &str) -> Result<Option<Value>, DraftStoreError> {
        let row: Option<(Value,)> =
            sqlx::query_as("SELECT payload FROM onboarding_drafts WHERE slot_key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(payload,)| payload))
    }

    async fn write(
        &self,
        key: &str,
        payload: &Value,
        saved_at: Timestamp,
    ) -> Result<(), DraftStoreError> {
        sqlx::query(
            "INSERT INTO onboarding_drafts (slot_key, payload, saved_at) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (slot_key) DO UPDATE \
             SET payload = EXCLUDED.payload, saved_at = EXCLUDED.saved_at",
        )
        .bind(key)
        .bind(payload)
        .bind(saved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DraftStoreError> {
        sqlx::query("DELETE FROM onboarding_drafts WHERE slot_key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: Timestamp) -> Result<u64, DraftStoreError> {
        let result = sqlx::query("DELETE FROM onboarding_drafts WHERE saved_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local slot, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryDraftSlot {
    entries: RwLock<HashMap<String, (Value, Timestamp)>>,
    writes: AtomicUsize,
}

impl MemoryDraftSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DraftSlot for MemoryDraftSlot {
    async fn read(&self, key: &str) -> Result<Option<Value>, DraftStoreError> {
        Ok(self.entries.read().await.get(key).map(|(v, _)| v.clone()))
    }

    async fn write(
        &self,
        key: &str,
        payload: &Value,
        saved_at: Timestamp,
    ) -> Result<(), DraftStoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (payload.clone(), saved_at));
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DraftStoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn purge_older_than(&self, cutoff: Timestamp) -> Result<u64, DraftStoreError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, saved_at)| *saved_at >= cutoff);
        Ok((before - entries.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn memory_slot_overwrites_whole_value() {
        let slot = MemoryDraftSlot::new();
        let now = Utc::now();
        slot.write("k", &json!({ "a": 1, "b": 2 }), now).await.unwrap();
        slot.write("k", &json!({ "a": 3 }), now).await.unwrap();
        assert_eq!(slot.read("k").await.unwrap(), Some(json!({ "a": 3 })));
        assert_eq!(slot.write_count(), 2);

        slot.remove("k").await.unwrap();
        assert_eq!(slot.read("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_slot_purges_old_entries() {
        let slot = MemoryDraftSlot::new();
        let now = Utc::now();
        slot.write("old", &json!({}), now - Duration::days(20)).await.unwrap();
        slot.write("new", &json!({}), now).await.unwrap();
        let purged = slot.purge_older_than(now - Duration::days(14)).await.unwrap();
        assert_eq!(purged, 1);
        assert!(slot.read("new").await.unwrap().is_some());
    }

    #[test]
    fn error_display() {
        let err = DraftStoreError::Deferred("disk full".into());
        assert_eq!(err.to_string(), "Deferred draft write failed: disk full");
    }
}
