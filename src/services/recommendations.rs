use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use crate::{
    db::CatalogStore,
    engine::Generation,
    error::{AppError, AppResult},
    models::{seen_set, MovieId},
};

/// A recommended movie with its aggregated score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub movie_id: MovieId,
    /// Sum of similarities to every watched movie that proposed this one
    pub score: f64,
    /// How many watched movies proposed this one
    pub supporting_movies: usize,
}

/// Generates personalized recommendations from a user's viewing history
///
/// Each distinct watched movie proposes its `fan_out` nearest neighbours;
/// proposals for the same movie are summed, so a title close to several
/// watched movies outranks one close to a single movie. Watched movies are
/// never recommended.
///
/// Fails with `UserNotFound` for an unknown user. A known user with no
/// history gets an empty list.
pub async fn get_recommendations(
    store: &dyn CatalogStore,
    generation: &Generation,
    user_id: Uuid,
    limit: usize,
    fan_out: usize,
) -> AppResult<Vec<Recommendation>> {
    if store.get_user(user_id).await?.is_none() {
        return Err(AppError::UserNotFound(user_id));
    }

    let history = store.get_viewing_history(user_id).await?;
    let seen = seen_set(&history);

    tracing::debug!(
        user_id = %user_id,
        history_entries = history.len(),
        distinct_movies = seen.len(),
        generation = %generation.id(),
        "Aggregating recommendations"
    );

    aggregate(generation, &seen, limit, fan_out)
}

/// Scores candidates proposed by the seen set against one generation.
///
/// Watched movies missing from the generation (ingested after it was built)
/// propose nothing but are still excluded from the result.
pub fn aggregate(
    generation: &Generation,
    seen: &BTreeSet<MovieId>,
    limit: usize,
    fan_out: usize,
) -> AppResult<Vec<Recommendation>> {
    if limit == 0 || seen.is_empty() {
        return Ok(Vec::new());
    }

    let mut pool: HashMap<MovieId, (f64, usize)> = HashMap::new();
    let mut unindexed = 0usize;

    for watched in seen {
        if !generation.contains(watched.as_str()) {
            unindexed += 1;
            continue;
        }
        for neighbor in generation.similar_to(watched.as_str(), fan_out)? {
            if seen.contains(&neighbor.movie_id) {
                continue;
            }
            let entry = pool.entry(neighbor.movie_id).or_insert((0.0, 0));
            entry.0 += neighbor.score;
            entry.1 += 1;
        }
    }

    if unindexed > 0 {
        tracing::warn!(
            unindexed,
            generation = %generation.id(),
            "Watched movies missing from the current index"
        );
    }

    let mut ranked: Vec<Recommendation> = pool
        .into_iter()
        .map(|(movie_id, (score, supporting_movies))| Recommendation {
            movie_id,
            score,
            supporting_movies,
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| {
                compare_ratings(
                    generation.rating(a.movie_id.as_str()),
                    generation.rating(b.movie_id.as_str()),
                )
            })
            .then_with(|| a.movie_id.cmp(&b.movie_id))
    });
    ranked.truncate(limit);

    Ok(ranked)
}

/// Higher rating first; unrated movies last
fn compare_ratings(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
