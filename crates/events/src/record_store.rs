//! Remote onboarding record store.
//!
//! `GET {base}/onboarding/{id}` returns the last saved form and position;
//! `PATCH {base}/onboarding/{id}` stores progress. The id doubles as the
//! shareable resume token.

use async_trait::async_trait;
use onboard_core::onboarding_wizard::OnboardingStep;
use onboard_core::submission::RecordPatch;
use serde::Deserialize;
use serde_json::Value;

use crate::error::CollaboratorError;

/// The saved record as returned by the store.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    #[serde(default)]
    pub form_data: Option<Value>,
    #[serde(default)]
    pub last_step: Option<u8>,
    #[serde(default)]
    pub navigation_history: Vec<u8>,
    #[serde(default)]
    pub estado: Option<String>,
}

impl RemoteRecord {
    pub fn step(&self) -> Option<OnboardingStep> {
        self.last_step
            .and_then(|n| OnboardingStep::from_index(n).ok())
    }

    /// History entries that name a known step; unknown indices are dropped.
    pub fn history(&self) -> Vec<OnboardingStep> {
        self.navigation_history
            .iter()
            .filter_map(|n| OnboardingStep::from_index(*n).ok())
            .collect()
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record. `Ok(None)` when the id is unknown.
    async fn fetch(&self, record_id: &str) -> Result<Option<RemoteRecord>, CollaboratorError>;

    async fn patch(&self, record_id: &str, patch: &RecordPatch) -> Result<(), CollaboratorError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    record: RemoteRecord,
}

pub struct HttpRecordStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRecordStore {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    fn record_url(&self, record_id: &str) -> String {
        crate::endpoint(&self.base_url, &format!("onboarding/{record_id}"))
    }
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn fetch(&self, record_id: &str) -> Result<Option<RemoteRecord>, CollaboratorError> {
        let response = self.client.get(self.record_url(record_id)).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(CollaboratorError::HttpStatus(response.status().as_u16()));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;
        if !envelope.success {
            tracing::info!(record_id, error = ?envelope.error, "Record not available");
            return Ok(None);
        }
        Ok(Some(envelope.record))
    }

    async fn patch(&self, record_id: &str, patch: &RecordPatch) -> Result<(), CollaboratorError> {
        let response = self
            .client
            .patch(self.record_url(record_id))
            .json(patch)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(CollaboratorError::HttpStatus(response.status().as_u16()));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;
        if !envelope.success {
            return Err(CollaboratorError::Rejected(
                envelope.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_flattens_record() {
        let envelope: Envelope = serde_json::from_value(json!({
            "success": true,
            "formData": { "company": { "razonSocial": "Andes SpA" } },
            "lastStep": 5,
            "navigationHistory": [0, 1, 2, 3, 4, 5, 42],
            "estado": "en_progreso"
        }))
        .unwrap();
        let record = envelope.record;
        assert_eq!(record.step(), Some(OnboardingStep::Workers));
        assert_eq!(record.history().len(), 6);
        assert_eq!(record.estado.as_deref(), Some("en_progreso"));
    }

    #[test]
    fn patch_reply_without_record_fields_parses() {
        let envelope: Envelope = serde_json::from_value(json!({ "success": true })).unwrap();
        assert_eq!(envelope.record, RemoteRecord::default());
    }
}
