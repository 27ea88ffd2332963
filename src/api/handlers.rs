use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::{
    cached,
    db::{CacheKey, CatalogStore},
    engine::{GenerationId, GenerationInfo, Neighbor},
    error::{AppError, AppResult},
    middleware::{RequestId, GENERATION_HEADER},
    models::{Movie, MovieId, User},
    services::{self, recommendations::get_recommendations, similar},
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
    pub limit: Option<usize>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RankingQuery {
    pub limit: Option<usize>,
    /// Pins the query to a generation; anything but the current one is stale
    pub generation: Option<GenerationId>,
}

#[derive(Debug, Deserialize)]
pub struct TextQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
    pub generation: Option<GenerationId>,
}

#[derive(Debug, Deserialize)]
pub struct GenerationQuery {
    pub generation: Option<GenerationId>,
}

/// A ranked movie with the details a client needs to render it
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ScoredMovie {
    pub id: MovieId,
    pub title: String,
    pub genres: Vec<String>,
    pub avg_rating: Option<f64>,
    pub score: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarMoviesResponse {
    pub movie_id: MovieId,
    pub generation: GenerationId,
    pub results: Vec<ScoredMovie>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarTextResponse {
    pub query: String,
    pub generation: GenerationId,
    pub results: Vec<ScoredMovie>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SimilarityResponse {
    pub movie_id: MovieId,
    pub other_movie_id: MovieId,
    pub generation: GenerationId,
    /// `null` when either movie is not indexed yet
    pub score: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationsResponse {
    pub user_id: Uuid,
    pub generation: GenerationId,
    pub results: Vec<ScoredMovie>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryItem {
    pub movie_id: MovieId,
    pub title: Option<String>,
    pub watch_date: chrono::NaiveDate,
    pub watch_duration_minutes: Option<i32>,
}

fn offset(requested: Option<i64>) -> AppResult<i64> {
    match requested.unwrap_or(0) {
        o if o < 0 => Err(AppError::InvalidInput(
            "offset must not be negative".to_string(),
        )),
        o => Ok(o),
    }
}

/// Attaches catalog details to a ranking, keeping its order
///
/// Ranked ids the catalog no longer has are dropped.
async fn hydrate(
    store: &dyn CatalogStore,
    ranked: Vec<(MovieId, f64)>,
) -> AppResult<Vec<ScoredMovie>> {
    let ids: Vec<MovieId> = ranked.iter().map(|(id, _)| id.clone()).collect();
    let mut movies: HashMap<MovieId, Movie> = store
        .get_movies(&ids)
        .await?
        .into_iter()
        .map(|movie| (movie.id.clone(), movie))
        .collect();

    Ok(ranked
        .into_iter()
        .filter_map(|(id, score)| {
            movies.remove(&id).map(|movie| ScoredMovie {
                id,
                title: movie.title,
                genres: movie.genres,
                avg_rating: movie.avg_rating,
                score,
            })
        })
        .collect())
}

/// A JSON body tagged with the generation that produced it
type Stamped<T> = ([(&'static str, String); 1], Json<T>);

fn stamped<T>(generation: GenerationId, body: T) -> Stamped<T> {
    ([(GENERATION_HEADER, generation.to_string())], Json(body))
}

fn neighbor_scores(neighbors: Vec<Neighbor>) -> Vec<(MovieId, f64)> {
    neighbors
        .into_iter()
        .map(|n| (n.movie_id, n.score))
        .collect()
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Describe the generation currently served
pub async fn index_info(State(state): State<AppState>) -> Stamped<GenerationInfo> {
    let info = state.registry.current().info();
    stamped(info.generation, info)
}

/// Rebuild the index from the catalog and publish it
pub async fn rebuild_index(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Stamped<GenerationInfo>> {
    tracing::info!(request_id = %request_id, "Index rebuild requested");

    let generation = services::rebuild_index(
        state.store.clone(),
        state.registry.clone(),
        state.settings.build_timeout,
        state.build_signal.clone(),
    )
    .await?;

    Ok(stamped(generation.id(), generation.info()))
}

/// Browse movies
pub async fn list_movies(
    State(state): State<AppState>,
    Query(params): Query<PageQuery>,
) -> AppResult<Json<Vec<Movie>>> {
    let limit = state.settings.limit(params.limit) as i64;
    let movies = state
        .store
        .list_movies_page(limit, offset(params.offset)?)
        .await?;
    Ok(Json(movies))
}

/// Search movies by title
pub async fn search_movies(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<Vec<Movie>>> {
    let limit = state.settings.limit(params.limit) as i64;
    let movies = state
        .store
        .search_movies(params.query.trim(), limit, offset(params.offset)?)
        .await?;
    Ok(Json(movies))
}

/// Get one movie
pub async fn get_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> AppResult<Json<Movie>> {
    let movie_id = MovieId::from(movie_id);
    state
        .store
        .get_movie(&movie_id)
        .await?
        .map(Json)
        .ok_or(AppError::MovieNotFound(movie_id))
}

/// Movies most similar to one movie
pub async fn similar_movies(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(movie_id): Path<String>,
    Query(params): Query<RankingQuery>,
) -> AppResult<Stamped<SimilarMoviesResponse>> {
    let movie_id = MovieId::from(movie_id);
    let limit = state.settings.limit(params.limit);
    let generation = state.registry.pinned(params.generation)?;

    tracing::info!(
        request_id = %request_id,
        movie_id = %movie_id,
        limit,
        generation = %generation.id(),
        "Finding similar movies"
    );

    let store = state.store.as_ref();
    let neighbors: Vec<Neighbor> = match &state.cache {
        Some(cache) => {
            let key = CacheKey::SimilarMovies {
                generation: generation.id(),
                movie_id: movie_id.clone(),
                limit,
            };
            cached!(
                cache,
                key,
                state.settings.similar_cache_ttl_secs,
                similar::similar_movies(store, &generation, &movie_id, limit)
            )?
        }
        None => similar::similar_movies(store, &generation, &movie_id, limit).await?,
    };

    let results = hydrate(store, neighbor_scores(neighbors)).await?;

    Ok(stamped(
        generation.id(),
        SimilarMoviesResponse {
            movie_id,
            generation: generation.id(),
            results,
        },
    ))
}

/// Movies most similar to a free-text title
pub async fn similar_to_text(
    State(state): State<AppState>,
    Query(params): Query<TextQuery>,
) -> AppResult<Stamped<SimilarTextResponse>> {
    let limit = state.settings.limit(params.limit);
    let generation = state.registry.pinned(params.generation)?;

    let neighbors: Vec<Neighbor> = match &state.cache {
        Some(cache) => {
            let key = CacheKey::SimilarText {
                generation: generation.id(),
                query: params.q.clone(),
                limit,
            };
            cached!(
                cache,
                key,
                state.settings.similar_cache_ttl_secs,
                async { similar::similar_to_text(&generation, &params.q, limit) }
            )?
        }
        None => similar::similar_to_text(&generation, &params.q, limit)?,
    };

    let results = hydrate(state.store.as_ref(), neighbor_scores(neighbors)).await?;

    Ok(stamped(
        generation.id(),
        SimilarTextResponse {
            query: params.q,
            generation: generation.id(),
            results,
        },
    ))
}

/// Cosine similarity between two movies
pub async fn movie_similarity(
    State(state): State<AppState>,
    Path((movie_id, other_movie_id)): Path<(String, String)>,
    Query(params): Query<GenerationQuery>,
) -> AppResult<Stamped<SimilarityResponse>> {
    let movie_id = MovieId::from(movie_id);
    let other_movie_id = MovieId::from(other_movie_id);
    let generation = state.registry.pinned(params.generation)?;

    let score = similar::pairwise_similarity(
        state.store.as_ref(),
        &generation,
        &movie_id,
        &other_movie_id,
    )
    .await?;

    Ok(stamped(
        generation.id(),
        SimilarityResponse {
            movie_id,
            other_movie_id,
            generation: generation.id(),
            score,
        },
    ))
}

/// Get one user
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    state
        .store
        .get_user(user_id)
        .await?
        .map(Json)
        .ok_or(AppError::UserNotFound(user_id))
}

/// A user's viewing history, newest first
pub async fn viewing_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<HistoryItem>>> {
    if state.store.get_user(user_id).await?.is_none() {
        return Err(AppError::UserNotFound(user_id));
    }

    let history = state.store.get_viewing_history(user_id).await?;

    let ids: Vec<MovieId> = history.iter().map(|entry| entry.movie_id.clone()).collect();
    let titles: HashMap<MovieId, String> = state
        .store
        .get_movies(&ids)
        .await?
        .into_iter()
        .map(|movie| (movie.id, movie.title))
        .collect();

    let items = history
        .into_iter()
        .map(|entry| HistoryItem {
            title: titles.get(&entry.movie_id).cloned(),
            movie_id: entry.movie_id,
            watch_date: entry.watch_date,
            watch_duration_minutes: entry.watch_duration_minutes,
        })
        .collect();

    Ok(Json(items))
}

/// Personalized recommendations for a user
pub async fn recommendations(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<RankingQuery>,
) -> AppResult<Stamped<RecommendationsResponse>> {
    let limit = state.settings.limit(params.limit);
    let generation = state.registry.pinned(params.generation)?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user_id,
        limit,
        generation = %generation.id(),
        "Processing recommendation request"
    );

    let ranked = get_recommendations(
        state.store.as_ref(),
        &generation,
        user_id,
        limit,
        state.settings.fan_out,
    )
    .await?;

    tracing::info!(
        request_id = %request_id,
        count = ranked.len(),
        "Recommendations computed"
    );

    let scores = ranked.into_iter().map(|r| (r.movie_id, r.score)).collect();
    let results = hydrate(state.store.as_ref(), scores).await?;

    Ok(stamped(
        generation.id(),
        RecommendationsResponse {
            user_id,
            generation: generation.id(),
            results,
        },
    ))
}
