//! Draft persistence for onboarding sessions.
//!
//! - [`DraftSlot`]: the durable key-value slot, with a Postgres and an
//!   in-memory implementation.
//! - [`DraftStore`]: versioned save/load/clear over a slot, applying the
//!   expiry and salvage rules from [`onboard_core::draft`].
//! - [`DebouncedDraftWriter`]: latest-wins coalescing writer task.

use sqlx::postgres::PgPoolOptions;

pub mod debounce;
pub mod draft_store;
pub mod slot;

pub use debounce::DebouncedDraftWriter;
pub use draft_store::{DraftStore, LoadedDraft};
pub use slot::{DraftSlot, DraftStoreError, MemoryDraftSlot, PgDraftSlot};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query to verify connectivity.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
