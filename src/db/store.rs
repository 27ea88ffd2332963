use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Movie, MovieId, User, ViewingHistoryEntry},
};

/// Read access to the catalog the engine is built from
///
/// The ingestion pipeline owns these tables; nothing here writes to them.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every movie, used only when building a generation
    async fn list_movies(&self) -> AppResult<Vec<Movie>>;

    /// One page of movies in id order
    async fn list_movies_page(&self, limit: i64, offset: i64) -> AppResult<Vec<Movie>>;

    /// Case-insensitive title search, most-voted first
    async fn search_movies(&self, query: &str, limit: i64, offset: i64) -> AppResult<Vec<Movie>>;

    async fn get_movie(&self, movie_id: &MovieId) -> AppResult<Option<Movie>>;

    /// Movies for the given ids, in no particular order; unknown ids are skipped
    async fn get_movies(&self, movie_ids: &[MovieId]) -> AppResult<Vec<Movie>>;

    async fn movie_exists(&self, movie_id: &MovieId) -> AppResult<bool>;

    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>>;

    /// Viewing history of one user, newest first
    async fn get_viewing_history(&self, user_id: Uuid) -> AppResult<Vec<ViewingHistoryEntry>>;
}
