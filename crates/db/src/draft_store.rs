//! Versioned draft persistence over a [`DraftSlot`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use onboard_core::draft::{
    decode_draft, slot_key, DecodedDraft, DraftSnapshot, DRAFT_RETENTION_DAYS,
};
use onboard_core::types::Timestamp;

use crate::slot::{DraftSlot, DraftStoreError};

/// A draft read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDraft {
    pub snapshot: DraftSnapshot,
    /// Written by another schema version; step and history were recomputed.
    pub salvaged: bool,
}

#[derive(Clone)]
pub struct DraftStore {
    slot: Arc<dyn DraftSlot>,
    retention: Duration,
}

impl DraftStore {
    pub fn new(slot: Arc<dyn DraftSlot>) -> Self {
        Self {
            slot,
            retention: Duration::days(DRAFT_RETENTION_DAYS),
        }
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention = Duration::days(days);
        self
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    pub async fn save(
        &self,
        session_key: &str,
        snapshot: DraftSnapshot,
    ) -> Result<DraftSnapshot, DraftStoreError> {
        self.save_at(session_key, snapshot, Utc::now()).await
    }

    /// Stamp the snapshot with the schema version and `now`, then overwrite
    /// the slot. Returns the stamped snapshot.
    pub async fn save_at(
        &self,
        session_key: &str,
        mut snapshot: DraftSnapshot,
        now: Timestamp,
    ) -> Result<DraftSnapshot, DraftStoreError> {
        snapshot.stamp(now);
        let payload = serde_json::to_value(&snapshot)?;
        self.slot.write(&slot_key(session_key), &payload, now).await?;
        tracing::debug!(
            session_key,
            step = %snapshot.current_step,
            "Draft saved"
        );
        Ok(snapshot)
    }

    pub async fn load(&self, session_key: &str) -> Result<Option<LoadedDraft>, DraftStoreError> {
        self.load_at(session_key, Utc::now()).await
    }

    /// Read a draft. Expired drafts are deleted; unreadable ones are logged
    /// and treated as absent.
    pub async fn load_at(
        &self,
        session_key: &str,
        now: Timestamp,
    ) -> Result<Option<LoadedDraft>, DraftStoreError> {
        let key = slot_key(session_key);
        let Some(raw) = self.slot.read(&key).await? else {
            return Ok(None);
        };

        match decode_draft(&raw, now, self.retention) {
            DecodedDraft::Current(snapshot) => Ok(Some(LoadedDraft {
                snapshot,
                salvaged: false,
            })),
            DecodedDraft::Salvaged(snapshot) => {
                tracing::warn!(
                    session_key,
                    step = %snapshot.current_step,
                    "Draft schema version mismatch, salvaged state"
                );
                Ok(Some(LoadedDraft {
                    snapshot,
                    salvaged: true,
                }))
            }
            DecodedDraft::Expired => {
                tracing::info!(session_key, "Draft expired, deleting");
                self.slot.remove(&key).await?;
                Ok(None)
            }
            DecodedDraft::Corrupt(reason) => {
                tracing::error!(session_key, %reason, "Draft unreadable, ignoring");
                Ok(None)
            }
        }
    }

    /// Delete the draft. Called only after a confirmed final submission.
    pub async fn clear(&self, session_key: &str) -> Result<(), DraftStoreError> {
        self.slot.remove(&slot_key(session_key)).await?;
        tracing::info!(session_key, "Draft cleared");
        Ok(())
    }

    /// Delete every draft older than the retention window.
    pub async fn purge_expired(&self) -> Result<u64, DraftStoreError> {
        self.slot.purge_older_than(Utc::now() - self.retention).await
    }
}
