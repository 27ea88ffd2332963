use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::{
    db::CatalogStore,
    engine::{BuildSignal, Generation, IndexRegistry},
    error::{AppError, AppResult},
};

/// Builds a new generation from the full catalog and publishes it
///
/// Builds are serialised through the registry. The corpus fetch and the fit
/// share one deadline; the fit runs on the blocking pool and polls `signal`,
/// so a timeout or cancellation stops it without publishing anything. On
/// any failure the current generation keeps serving.
pub async fn rebuild_index(
    store: Arc<dyn CatalogStore>,
    registry: Arc<IndexRegistry>,
    timeout: Duration,
    signal: BuildSignal,
) -> AppResult<Arc<Generation>> {
    let _build_guard = registry.lock_builds().await;

    let started = Instant::now();
    let deadline = started
        .checked_add(timeout)
        .ok_or_else(|| AppError::InvalidInput("Build timeout is too large".to_string()))?;
    let bounded = signal.with_deadline(deadline);

    let result = build_generation(store, &registry, timeout, deadline, bounded).await;

    match result.and_then(|generation| registry.publish(generation)) {
        Ok(published) => {
            tracing::info!(
                generation = %published.id(),
                movies = published.index().len(),
                vocabulary = published.model().len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Index rebuild completed"
            );
            Ok(published)
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                current = %registry.current().id(),
                "Index rebuild failed, current generation keeps serving"
            );
            Err(e)
        }
    }
}

async fn build_generation(
    store: Arc<dyn CatalogStore>,
    registry: &IndexRegistry,
    timeout: Duration,
    deadline: Instant,
    signal: BuildSignal,
) -> AppResult<Generation> {
    let tokio_deadline = tokio::time::Instant::from_std(deadline);
    let timed_out = || AppError::BuildFailure(format!("build timed out after {:?}", timeout));

    let movies = tokio::time::timeout_at(tokio_deadline, store.list_movies())
        .await
        .map_err(|_| timed_out())?
        .map_err(|e| AppError::BuildFailure(format!("failed to load corpus: {}", e)))?;

    let id = registry.allocate_id();
    tracing::info!(generation = %id, movies = movies.len(), "Building index generation");

    let task = tokio::task::spawn_blocking(move || Generation::build(id, &movies, &signal));

    match tokio::time::timeout_at(tokio_deadline, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(AppError::BuildFailure(format!("build task failed: {}", e))),
        // The blocking task sees the same deadline and stops on its own
        Err(_) => Err(timed_out()),
    }
}

/// Rebuilds the index every `interval` until `signal` is cancelled
///
/// `interval` must be non-zero; `Config` rejects a zero `REBUILD_INTERVAL_SECS`.
pub fn spawn_periodic_rebuild(
    store: Arc<dyn CatalogStore>,
    registry: Arc<IndexRegistry>,
    interval: Duration,
    timeout: Duration,
    signal: BuildSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; startup already built once
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if signal.is_cancelled() {
                tracing::info!("Periodic index rebuild stopped");
                break;
            }
            // Failures are logged inside rebuild_index
            let _ = rebuild_index(store.clone(), registry.clone(), timeout, signal.clone()).await;
        }
    })
}
