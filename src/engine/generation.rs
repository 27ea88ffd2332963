//! Build generations and the registry that publishes them.
//!
//! A [`Generation`] is immutable once built. The registry swaps the current
//! `Arc<Generation>` under a write lock held only for the pointer store, so
//! readers clone the pointer and never observe a partial build.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, MutexGuard};

use crate::error::{AppError, AppResult};
use crate::models::{Movie, MovieId};

use super::features::{extract_features, extract_query_features};
use super::index::{Neighbor, SimilarityIndex};
use super::vectorizer::{fit, FeatureVector, VocabularyModel};

/// Movies featurized between cancellation checks
const EXTRACT_CHECK_INTERVAL: usize = 1024;

/// Monotonic identifier of a build
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct GenerationId(pub u64);

impl Display for GenerationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cancellation and deadline for an index build
#[derive(Debug, Clone, Default)]
pub struct BuildSignal {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl BuildSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a signal sharing this one's cancellation flag that also expires at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            cancelled: self.cancelled.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with `BuildFailure` once cancelled or past the deadline
    pub fn check(&self) -> AppResult<()> {
        if self.is_cancelled() {
            return Err(AppError::BuildFailure("build cancelled".to_string()));
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(AppError::BuildFailure(
                "build exceeded its deadline".to_string(),
            ));
        }
        Ok(())
    }
}

/// Summary of a generation, as reported by the API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationInfo {
    pub generation: GenerationId,
    pub built_at: DateTime<Utc>,
    pub build_duration_ms: u64,
    pub movie_count: usize,
    pub vocabulary_size: usize,
}

/// One immutable snapshot of the fitted vector space and its index
#[derive(Debug)]
pub struct Generation {
    id: GenerationId,
    built_at: DateTime<Utc>,
    build_duration: Duration,
    model: VocabularyModel,
    index: SimilarityIndex,
    ratings: HashMap<MovieId, f64>,
}

impl Generation {
    /// The generation served before any build has completed
    pub fn empty(id: GenerationId) -> Self {
        Self {
            id,
            built_at: Utc::now(),
            build_duration: Duration::ZERO,
            model: VocabularyModel::empty(id),
            index: SimilarityIndex::empty(id),
            ratings: HashMap::new(),
        }
    }

    /// Extracts features, fits the vector space and indexes it.
    ///
    /// Runs to completion or fails; `signal` is polled throughout.
    pub fn build(id: GenerationId, movies: &[Movie], signal: &BuildSignal) -> AppResult<Self> {
        let started = Instant::now();
        signal.check()?;

        let corpus = extract_corpus(movies, signal)?;

        let fitted = fit(id, &corpus, signal)?;
        let index = SimilarityIndex::new(id, fitted.model.len(), fitted.vectors, signal)?;

        let ratings = movies
            .iter()
            .filter_map(|movie| movie.avg_rating.map(|r| (movie.id.clone(), r)))
            .collect();

        Ok(Self {
            id,
            built_at: Utc::now(),
            build_duration: started.elapsed(),
            model: fitted.model,
            index,
            ratings,
        })
    }

    pub fn id(&self) -> GenerationId {
        self.id
    }

    pub fn model(&self) -> &VocabularyModel {
        &self.model
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    pub fn contains(&self, movie_id: &str) -> bool {
        self.index.contains(movie_id)
    }

    /// Aggregate rating captured when this generation was built
    pub fn rating(&self, movie_id: &str) -> Option<f64> {
        self.ratings.get(movie_id).copied()
    }

    pub fn similar_to(&self, movie_id: &str, k: usize) -> AppResult<Vec<Neighbor>> {
        self.index.similar_to(movie_id, k)
    }

    pub fn similarity(&self, a: &str, b: &str) -> AppResult<f64> {
        self.index.similarity(a, b)
    }

    /// Vectorizes free text with this generation's model
    pub fn transform(&self, text: &str) -> FeatureVector {
        self.model.transform(&extract_query_features(text))
    }

    pub fn rank_vector(&self, vector: &FeatureVector, k: usize) -> AppResult<Vec<Neighbor>> {
        self.index.rank_vector(vector, k)
    }

    pub fn info(&self) -> GenerationInfo {
        GenerationInfo {
            generation: self.id,
            built_at: self.built_at,
            build_duration_ms: self.build_duration.as_millis() as u64,
            movie_count: self.index.len(),
            vocabulary_size: self.model.len(),
        }
    }
}

/// Feature strings for every movie, polling `signal` as it goes
fn extract_corpus(movies: &[Movie], signal: &BuildSignal) -> AppResult<Vec<(MovieId, String)>> {
    let mut corpus = Vec::with_capacity(movies.len());
    for (position, movie) in movies.iter().enumerate() {
        if position % EXTRACT_CHECK_INTERVAL == 0 {
            signal.check()?;
        }
        corpus.push((movie.id.clone(), extract_features(movie)));
    }
    Ok(corpus)
}

/// Holds the generation served to new queries
pub struct IndexRegistry {
    current: RwLock<Arc<Generation>>,
    next_id: AtomicU64,
    build_lock: Mutex<()>,
}

impl Default for IndexRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexRegistry {
    /// Starts with an empty generation 0 so queries are always answerable
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Generation::empty(GenerationId(0)))),
            next_id: AtomicU64::new(1),
            build_lock: Mutex::new(()),
        }
    }

    pub fn current(&self) -> Arc<Generation> {
        self.current.read().clone()
    }

    /// The current generation, or `StaleGeneration` if the caller pinned another one
    pub fn pinned(&self, requested: Option<GenerationId>) -> AppResult<Arc<Generation>> {
        let current = self.current();
        match requested {
            Some(requested) if requested != current.id() => Err(AppError::StaleGeneration {
                requested,
                current: current.id(),
            }),
            _ => Ok(current),
        }
    }

    pub fn allocate_id(&self) -> GenerationId {
        GenerationId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Serialises builders; the guard is held for a whole build
    pub async fn lock_builds(&self) -> MutexGuard<'_, ()> {
        self.build_lock.lock().await
    }

    /// Atomically replaces the current generation.
    ///
    /// Rejects a generation older than the one being served.
    pub fn publish(&self, generation: Generation) -> AppResult<Arc<Generation>> {
        let generation = Arc::new(generation);
        let mut current = self.current.write();
        if generation.id() <= current.id() {
            return Err(AppError::BuildFailure(format!(
                "generation {} is older than current generation {}",
                generation.id(),
                current.id()
            )));
        }
        let previous = std::mem::replace(&mut *current, generation.clone());
        drop(current);

        tracing::info!(
            previous = %previous.id(),
            current = %generation.id(),
            movies = generation.index().len(),
            "Published index generation"
        );
        Ok(generation)
    }
}
