use std::time::Duration;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. Unset
/// collaborator URLs and an unset `DATABASE_URL` select the in-process
/// implementations.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound for flushing live sessions at shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Postgres URL for the draft store. In-memory drafts when unset.
    pub database_url: Option<String>,
    /// Base URL of the CRM automation endpoint.
    pub crm_base_url: Option<String>,
    /// Base URL of the remote onboarding record store.
    pub record_store_base_url: Option<String>,
    /// Base URL of the prefill token service.
    pub prefill_base_url: Option<String>,
    /// Quiet window of the autosave writer in milliseconds (default: `1000`).
    pub draft_debounce_ms: u64,
    /// Drafts older than this are ignored and purged (default: `14`).
    pub draft_retention_days: i64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `DATABASE_URL`          | unset (memory)          |
    /// | `CRM_BASE_URL`          | unset (memory)          |
    /// | `RECORD_STORE_BASE_URL` | unset (memory)          |
    /// | `PREFILL_BASE_URL`      | unset (no prefill)      |
    /// | `DRAFT_DEBOUNCE_MS`     | `1000`                  |
    /// | `DRAFT_RETENTION_DAYS`  | `14`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins = split_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let draft_debounce_ms: u64 = std::env::var("DRAFT_DEBOUNCE_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("DRAFT_DEBOUNCE_MS must be a valid u64");

        let draft_retention_days: i64 = std::env::var("DRAFT_RETENTION_DAYS")
            .unwrap_or_else(|_| "14".into())
            .parse()
            .expect("DRAFT_RETENTION_DAYS must be a valid i64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url: optional(std::env::var("DATABASE_URL").ok()),
            crm_base_url: optional(std::env::var("CRM_BASE_URL").ok()),
            record_store_base_url: optional(std::env::var("RECORD_STORE_BASE_URL").ok()),
            prefill_base_url: optional(std::env::var("PREFILL_BASE_URL").ok()),
            draft_debounce_ms,
            draft_retention_days,
        }
    }

    pub fn draft_debounce(&self) -> Duration {
        Duration::from_millis(self.draft_debounce_ms)
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Treat a blank variable as unset.
fn optional(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
