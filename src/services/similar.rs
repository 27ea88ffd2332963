use crate::{
    db::CatalogStore,
    engine::{Generation, Neighbor},
    error::{AppError, AppResult},
    models::MovieId,
};

/// Finds the movies most similar to `movie_id` in the given generation
///
/// Fails with `MovieNotFound` when the catalog has never seen the id. A movie
/// that exists but was ingested after this generation was built has no
/// neighbours yet and yields an empty list.
pub async fn similar_movies(
    store: &dyn CatalogStore,
    generation: &Generation,
    movie_id: &MovieId,
    limit: usize,
) -> AppResult<Vec<Neighbor>> {
    if !store.movie_exists(movie_id).await? {
        return Err(AppError::MovieNotFound(movie_id.clone()));
    }

    if !generation.contains(movie_id.as_str()) {
        tracing::warn!(
            movie_id = %movie_id,
            generation = %generation.id(),
            "Movie is not in the current index yet"
        );
        return Ok(Vec::new());
    }

    generation.similar_to(movie_id.as_str(), limit)
}

/// Ranks the catalog against free text, treated like a movie title
///
/// Text sharing no term with the vocabulary yields an empty list.
pub fn similar_to_text(
    generation: &Generation,
    query: &str,
    limit: usize,
) -> AppResult<Vec<Neighbor>> {
    if query.trim().is_empty() {
        return Err(AppError::InvalidInput("Query must not be empty".to_string()));
    }

    let vector = generation.transform(query);
    if vector.is_zero() {
        return Ok(Vec::new());
    }

    generation.rank_vector(&vector, limit)
}

/// Cosine similarity of two catalog movies
///
/// `None` when either movie exists but is not indexed in this generation.
pub async fn pairwise_similarity(
    store: &dyn CatalogStore,
    generation: &Generation,
    a: &MovieId,
    b: &MovieId,
) -> AppResult<Option<f64>> {
    for movie_id in [a, b] {
        if !store.movie_exists(movie_id).await? {
            return Err(AppError::MovieNotFound(movie_id.clone()));
        }
    }

    if !generation.contains(a.as_str()) || !generation.contains(b.as_str()) {
        return Ok(None);
    }

    generation.similarity(a.as_str(), b.as_str()).map(Some)
}
