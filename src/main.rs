use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use marquee_api::{
    api::{create_router, AppState, QuerySettings},
    config::Config,
    db::{create_pool, create_redis_client, run_migrations, Cache, PgCatalogStore},
    services::{rebuild_index, spawn_periodic_rebuild},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Connected to database");

    if config.run_migrations {
        run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let store = Arc::new(PgCatalogStore::new(pool));
    let mut state = AppState::new(store).with_settings(QuerySettings::from_config(&config));

    let cache_handle = match &config.redis_url {
        Some(redis_url) => {
            let (cache, handle) = Cache::new(create_redis_client(redis_url)?);
            state = state.with_cache(cache);
            tracing::info!("Similarity cache enabled");
            Some(handle)
        }
        None => None,
    };

    // Serve the empty generation rather than refusing to start
    if let Err(e) = rebuild_index(
        state.store.clone(),
        state.registry.clone(),
        state.settings.build_timeout,
        state.build_signal.clone(),
    )
    .await
    {
        tracing::warn!(error = %e, "Initial index build failed, serving an empty index");
    }

    let rebuild_task = config.rebuild_interval_secs.map(|secs| {
        spawn_periodic_rebuild(
            state.store.clone(),
            state.registry.clone(),
            Duration::from_secs(secs),
            state.settings.build_timeout,
            state.build_signal.clone(),
        )
    });

    let build_signal = state.build_signal.clone();
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    build_signal.cancel();
    if let Some(task) = rebuild_task {
        task.abort();
    }
    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
