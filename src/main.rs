use profiles_service::core::config::Config;
use profiles_service::core::db;
use profiles_service::core::requesters::Requesters;
use profiles_service::core::{AppState, app_router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load application config from environment variables
    let config = Config::from_env()?;

    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: database={}, requesters={:?}, local_jwt={}",
        config.has_database(),
        config.requesters_mode,
        config.has_jwt_secret()
    );

    let requesters = Requesters::from_config(&config)?;

    let state = match &config.database_url {
        Some(url) => {
            let pool = db::connect(url, config.db_max_connections).await?;
            tracing::info!("Connected to PostgreSQL, migrations applied");
            AppState::postgres(pool, requesters)
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, data lives in memory only");
            AppState::in_memory(requesters)
        }
    };

    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
