//! Collaborator wiring from configuration.
//!
//! Each collaborator with a configured base URL talks HTTP; the rest fall
//! back to the in-process implementations of `onboard_events::memory`.

use std::sync::Arc;

use onboard_events::{
    build_http_client, CollaboratorError, CrmSink, CrmWebhook, CsvWorkbookExporter, EventBus,
    HttpPrefillResolver, HttpRecordStore, MemoryRecordStore, PrefillResolver, RecordStore,
    RecordingCrmSink, StaticPrefillResolver,
};
use onboard_session::Collaborators;

use crate::config::ServerConfig;

pub fn build_collaborators(
    config: &ServerConfig,
    events: Arc<EventBus>,
) -> Result<Collaborators, CollaboratorError> {
    let client = build_http_client()?;

    let prefill: Arc<dyn PrefillResolver> = match &config.prefill_base_url {
        Some(url) => Arc::new(HttpPrefillResolver::new(client.clone(), url)),
        None => {
            tracing::warn!("PREFILL_BASE_URL not set, prefill tokens will open empty sessions");
            Arc::new(StaticPrefillResolver::new())
        }
    };

    let record_store: Arc<dyn RecordStore> = match &config.record_store_base_url {
        Some(url) => Arc::new(HttpRecordStore::new(client.clone(), url)),
        None => {
            tracing::warn!("RECORD_STORE_BASE_URL not set, using in-memory records");
            Arc::new(MemoryRecordStore::new())
        }
    };

    let crm: Arc<dyn CrmSink> = match &config.crm_base_url {
        Some(url) => Arc::new(CrmWebhook::new(client, url)),
        None => {
            tracing::warn!("CRM_BASE_URL not set, payloads are kept in memory");
            Arc::new(RecordingCrmSink::new())
        }
    };

    Ok(Collaborators {
        prefill,
        record_store,
        crm,
        exporter: Arc::new(CsvWorkbookExporter),
        events,
    })
}
