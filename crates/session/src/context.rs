//! Shared dependencies handed to every session.

use std::sync::Arc;
use std::time::Duration;

use onboard_db::debounce::DEFAULT_DEBOUNCE;
use onboard_events::{CrmSink, EventBus, PrefillResolver, RecordStore, SpreadsheetExporter};

/// External collaborators, shared by all sessions of a process.
#[derive(Clone)]
pub struct Collaborators {
    pub prefill: Arc<dyn PrefillResolver>,
    pub record_store: Arc<dyn RecordStore>,
    pub crm: Arc<dyn CrmSink>,
    pub exporter: Arc<dyn SpreadsheetExporter>,
    /// Progress pings are published here; a forwarder delivers them.
    pub events: Arc<EventBus>,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Quiet window of the autosave writer.
    pub debounce: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}
