//! schooldoor-sd - School Discovery service
//!
//! Serves the discovery API and runs discovery jobs as background tasks.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use schooldoor_sd::services::{HttpSearchTransport, JobRunner, SearchClient};
use schooldoor_sd::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting schooldoor-sd (School Discovery) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = schooldoor_common::config::ServiceConfig::load()?;

    // Discovery cannot run without upstream credentials; fail fast
    let api_key = config.require_api_key()?;

    let db_pool = schooldoor_common::db::init_database_pool(Path::new(&config.database_path)).await?;
    info!("Database: {}", config.database_path);

    let transport = HttpSearchTransport::new(&config.search, api_key)
        .map_err(|e| anyhow::anyhow!("Failed to build search transport: {}", e))?;
    let search_client = Arc::new(SearchClient::new(Arc::new(transport), &config.search));
    let runner = Arc::new(JobRunner::new(db_pool.clone(), search_client));

    let state = AppState {
        db: db_pool,
        runner,
    };
    let app = schooldoor_sd::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
