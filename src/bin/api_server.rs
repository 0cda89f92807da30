// API server binary entry point
//
// Usage: DATA_DIR=/opt/ecobenefits/data cargo run --release --bin api_server

use ecobenefits::{create_router, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Default log level: info for our crate, warn for others
                "ecobenefits=info,tower_http=debug,axum=debug,warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Configuration:");
    tracing::info!("  DATA_DIR: {:?}", config.data_dir);
    tracing::info!("  SPECIES_FILE: {:?}", config.species_file);
    tracing::info!("  BIND: {}", config.bind_address());

    let state = AppState::new(&config);

    // Load the first generation up front so bad data fails at startup
    tracing::info!("Loading benefit data...");
    let generation = state
        .reload()
        .await
        .map_err(|e| anyhow::anyhow!("initial data load failed: {:?}", e))?;
    tracing::info!("Data generation {} ready", generation);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!("Server listening on {}", config.bind_address());

    axum::serve(listener, app).await?;

    Ok(())
}
