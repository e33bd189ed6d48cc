use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use onboard_db::{DraftSlot, DraftStore, MemoryDraftSlot, PgDraftSlot};
use onboard_events::{EventBus, ProgressForwarder};
use onboard_session::{SessionRegistry, SessionSettings};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onboard_api::background::draft_retention;
use onboard_api::collaborators::build_collaborators;
use onboard_api::config::ServerConfig;
use onboard_api::router::build_app_router;
use onboard_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "onboard_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Draft store ---
    let (pool, slot): (Option<onboard_db::DbPool>, Arc<dyn DraftSlot>) =
        match &config.database_url {
            Some(database_url) => {
                let pool = onboard_db::create_pool(database_url)
                    .await
                    .expect("Failed to connect to database");
                tracing::info!("Database connection pool created");

                onboard_db::health_check(&pool)
                    .await
                    .expect("Database health check failed");
                tracing::info!("Database health check passed");

                onboard_db::run_migrations(&pool)
                    .await
                    .expect("Failed to run database migrations");
                tracing::info!("Database migrations applied");

                let slot: Arc<dyn DraftSlot> = Arc::new(PgDraftSlot::new(pool.clone()));
                (Some(pool), slot)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, drafts are kept in memory");
                let slot: Arc<dyn DraftSlot> = Arc::new(MemoryDraftSlot::new());
                (None, slot)
            }
        };
    let store = DraftStore::new(slot).with_retention_days(config.draft_retention_days);

    // --- Event bus and collaborators ---
    let event_bus = Arc::new(EventBus::default());
    let collaborators = build_collaborators(&config, Arc::clone(&event_bus))
        .expect("Failed to build collaborator HTTP client");

    // Forward progress pings to the CRM off the request path.
    let forwarder_handle = tokio::spawn(ProgressForwarder::run(
        Arc::clone(&collaborators.crm),
        event_bus.subscribe(),
    ));

    // --- Sessions ---
    let registry = Arc::new(SessionRegistry::new(
        store.clone(),
        collaborators,
        SessionSettings {
            debounce: config.draft_debounce(),
        },
    ));

    // --- Draft retention ---
    let retention_cancel = CancellationToken::new();
    let retention_handle = tokio::spawn(draft_retention::run(
        store,
        draft_retention::CLEANUP_INTERVAL,
        retention_cancel.clone(),
    ));

    tracing::info!("Background services started (progress forwarder, draft retention)");

    // --- App state ---
    let state = AppState {
        registry: Arc::clone(&registry),
        config: Arc::new(config.clone()),
        pool,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Flush pending autosaves before anything else goes away.
    let flush_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(flush_timeout, registry.shutdown())
        .await
        .is_err()
    {
        tracing::error!(
            timeout_secs = config.shutdown_timeout_secs,
            "Timed out flushing live sessions"
        );
    }

    retention_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Draft retention job stopped");

    // The registry holds the last bus handle besides ours. Dropping both
    // closes the channel and lets the forwarder drain and exit.
    drop(registry);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), forwarder_handle).await;
    tracing::info!("Progress forwarder shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
