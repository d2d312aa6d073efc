//! Example consumer: serves the resources described in `RESOURCE_CONFIG`.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Without `DATABASE_URL` the rows live in memory for the life of the process.

use resource_sdk::{
    api_router, load_from_path, resolve, AppState, MemoryStore, PgStore, Registry, ResourceService, Settings, Store,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_sdk=info,tower_http=info")),
        )
        .init();

    let config = load_from_path(&settings.resource_config).await?;
    let model = Arc::new(resolve(&config)?);
    tracing::info!(entities = model.entities.len(), path = %settings.resource_config, "resource config loaded");

    let store: Arc<dyn Store> = match &settings.database_url {
        Some(url) => Arc::new(PgStore::connect(url, settings.db_max_connections, model.clone()).await?),
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(MemoryStore::new(model.clone()))
        }
    };

    let service = ResourceService::new(store, model, Registry::new());
    let app = api_router(AppState::new(service), &settings.api_prefix, settings.body_limit_bytes);

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!("listening on http://{}{}", listener.local_addr()?, settings.api_prefix);
    axum::serve(listener, app).await?;
    Ok(())
}
