//! Process-local collaborators.
//!
//! Used when a collaborator base URL is not configured (local development)
//! and as test doubles. They keep what they receive so it can be inspected.

use std::collections::HashMap;

use async_trait::async_trait;
use onboard_core::submission::{CrmPayload, RecordPatch};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::delivery::webhook::CrmSink;
use crate::error::CollaboratorError;
use crate::prefill::{seed_from_record, PrefillResolver};
use crate::record_store::{RecordStore, RemoteRecord};

// ---------------------------------------------------------------------------
// Prefill
// ---------------------------------------------------------------------------

/// Resolves tokens from a fixed table of CRM records.
#[derive(Default)]
pub struct StaticPrefillResolver {
    records: HashMap<String, Value>,
}

impl StaticPrefillResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, token: impl Into<String>, record: Value) -> Self {
        self.records.insert(token.into(), record);
        self
    }
}

#[async_trait]
impl PrefillResolver for StaticPrefillResolver {
    async fn resolve(&self, token: &str) -> Result<Option<Value>, CollaboratorError> {
        Ok(self.records.get(token).and_then(seed_from_record))
    }
}

// ---------------------------------------------------------------------------
// Record store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<String, RemoteRecord>>,
    patches: RwLock<Vec<(String, RecordPatch)>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record_id: impl Into<String>, record: RemoteRecord) {
        self.records.write().await.insert(record_id.into(), record);
    }

    /// Every patch received, oldest first.
    pub async fn patches(&self) -> Vec<(String, RecordPatch)> {
        self.patches.read().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch(&self, record_id: &str) -> Result<Option<RemoteRecord>, CollaboratorError> {
        Ok(self.records.read().await.get(record_id).cloned())
    }

    async fn patch(&self, record_id: &str, patch: &RecordPatch) -> Result<(), CollaboratorError> {
        self.records.write().await.insert(
            record_id.to_string(),
            RemoteRecord {
                form_data: Some(patch.form_data.clone()),
                last_step: Some(patch.current_step),
                navigation_history: patch.navigation_history.clone(),
                estado: patch.estado.map(|e| e.as_str().to_string()),
            },
        );
        self.patches
            .write()
            .await
            .push((record_id.to_string(), patch.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CRM
// ---------------------------------------------------------------------------

/// Keeps every payload instead of sending it. Can be told to fail a number
/// of leading sends.
#[derive(Default)]
pub struct RecordingCrmSink {
    sent: RwLock<Vec<CrmPayload>>,
    failures_left: RwLock<usize>,
}

impl RecordingCrmSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: RwLock::new(times),
            ..Default::default()
        }
    }

    pub async fn sent(&self) -> Vec<CrmPayload> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl CrmSink for RecordingCrmSink {
    async fn send(&self, payload: &CrmPayload) -> Result<(), CollaboratorError> {
        {
            let mut failures = self.failures_left.write().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(CollaboratorError::HttpStatus(503));
            }
        }
        tracing::debug!(
            event_type = payload.event_type.as_str(),
            record_id = ?payload.id_zoho,
            "CRM payload recorded locally"
        );
        self.sent.write().await.push(payload.clone());
        Ok(())
    }
}
