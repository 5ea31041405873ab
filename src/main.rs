use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use warden::{
    config::{Config, SessionBackend},
    crypto::password::PasswordHasher,
    db,
    repositories::user::PgUserRepository,
    router::build_router,
    session::{
        manager::SessionManager, memory::MemorySessionStore, postgres::PgSessionStore,
        store::SessionStore,
    },
    state::AppState,
};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("❌ Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("🛑 Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let pool = db::create_pool(&config.database_url, config.db_pool_max_size)?;
    db::ensure_schema(&pool).await?;
    tracing::info!("✅ PostgreSQL pool initialized (max {} connections)", config.db_pool_max_size);

    let shutdown = CancellationToken::new();
    let session_config = config.session.clone();

    let (sessions, cleanup) = match config.session_backend {
        SessionBackend::Memory => {
            let store = MemorySessionStore::new(session_config.session_duration);
            let cleanup = store.spawn_cleanup(session_config.cleanup_interval, shutdown.clone());
            let store: Arc<dyn SessionStore> = Arc::new(store);
            (SessionManager::new(store, session_config), cleanup)
        }
        SessionBackend::Postgres => {
            let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(
                pool.clone(),
                session_config.session_duration,
                session_config.store_timeout,
            ));
            let sessions = SessionManager::new(store, session_config);
            let cleanup = sessions.spawn_gc(sessions.config().cleanup_interval, shutdown.clone());
            (sessions, cleanup)
        }
    };
    tracing::info!("✅ Session store ready: {:?}", config.session_backend);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let shutdown_timeout = config.shutdown_timeout;

    let state = AppState::new(
        config,
        sessions,
        Arc::new(PgUserRepository::new(pool)),
        PasswordHasher::default(),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown.cancel();
    match tokio::time::timeout(shutdown_timeout, cleanup).await {
        Ok(Ok(())) => tracing::info!("✅ Session cleanup task stopped"),
        Ok(Err(e)) => tracing::error!("❌ Session cleanup task panicked: {}", e),
        Err(_) => tracing::warn!("Session cleanup task did not stop within {:?}", shutdown_timeout),
    }

    tracing::info!("👋 Server stopped");
    Ok(())
}
