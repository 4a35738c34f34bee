use std::sync::Arc;

use cinematch_api::{
    api::{create_router, AppState},
    config::Config,
    db::{create_pool, Cache, PgMovieStore},
    services::{HttpVectorIndex, HybridRecommender},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cinematch_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let store = Arc::new(PgMovieStore::new(pool));
    let index = Arc::new(HttpVectorIndex::new(
        config.vector_index_url.clone(),
        config.embedding_dimension,
        config.source_timeout(),
    )?);

    let cache = Cache::with_capacity(config.cache_ttls(), config.cache_region_capacity);

    let recommender = HybridRecommender::new(store, index, cache, config.source_timeout());
    let app = create_router(AppState::new(recommender));

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    tracing::info!(address = %config.bind_address(), "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
