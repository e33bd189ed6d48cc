//! External collaborators and progress notification for onboarding.
//!
//! - [`EventBus`]: in-process publish/subscribe hub for progress pings,
//!   backed by `tokio::sync::broadcast`.
//! - [`ProgressForwarder`]: background task delivering pings to the CRM.
//! - [`delivery`]: the CRM webhook transport.
//! - [`prefill`]: token decryption into a prefill seed.
//! - [`record_store`]: the remote onboarding record.
//! - [`export`]: spreadsheet attachment generation.
//! - [`memory`]: process-local collaborators for offline runs and tests.

use std::time::Duration;

pub mod bus;
pub mod delivery;
pub mod error;
pub mod export;
pub mod forwarder;
pub mod memory;
pub mod prefill;
pub mod record_store;

pub use bus::{EventBus, ProgressEvent};
pub use delivery::webhook::{CrmSink, CrmWebhook};
pub use error::CollaboratorError;
pub use export::{CsvWorkbookExporter, SpreadsheetExporter};
pub use forwarder::ProgressForwarder;
pub use memory::{MemoryRecordStore, RecordingCrmSink, StaticPrefillResolver};
pub use prefill::{HttpPrefillResolver, PrefillResolver};
pub use record_store::{HttpRecordStore, RecordStore, RemoteRecord};

/// HTTP request timeout for a single collaborator call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client shared by every collaborator.
pub fn build_http_client() -> Result<reqwest::Client, CollaboratorError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Join a base URL and a path without doubling the slash.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
