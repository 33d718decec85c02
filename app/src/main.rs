mod config;
mod error;
mod handlers;
mod logging;
mod models;
mod relay;
mod rest;
mod storage;

use std::sync::Arc;
use tracing::info;

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    logging::init(config.otel_stdout());

    let db_conn =
        models::establish_db_connection(config.database_url(), config.db_max_connections())
            .await?;
    models::run_migrations(&db_conn).await?;
    info!("Database ready");

    let store = Arc::new(models::PgStore::new(db_conn));
    let objects = Arc::new(storage::FsObjectStore::new(
        config.storage_dir(),
        config.storage_public_url(),
    ));
    let relay = relay::Relay::new(config.relay().clone())?;
    let state = handlers::AppState::new(
        store,
        objects,
        relay,
        config.audio_bucket(),
        config.admin_role(),
    );

    rest::dispatch_server(state, &config).await?;
    opentelemetry::global::shutdown_tracer_provider();
    Ok(())
}
