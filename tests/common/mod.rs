use std::sync::Arc;

use axum_test::TestServer;
use chrono::NaiveDate;
use parking_lot::RwLock;
use uuid::Uuid;

use marquee_api::{
    api::{create_router, AppState},
    db::CatalogStore,
    error::AppResult,
    models::{Movie, MovieId, User, ViewingHistoryEntry},
    services::rebuild_index,
};

pub const WATCHED_M1: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0001);
pub const NEW_USER: Uuid = Uuid::from_u128(0x0000_0000_0000_4000_8000_0000_0000_0002);

/// Catalog held in memory, mutable so tests can simulate ingestion
#[derive(Default)]
pub struct InMemoryCatalog {
    movies: RwLock<Vec<Movie>>,
    users: Vec<User>,
    history: Vec<ViewingHistoryEntry>,
}

impl InMemoryCatalog {
    pub fn add_movie(&self, movie: Movie) {
        self.movies.write().push(movie);
    }
}

#[async_trait::async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn list_movies(&self) -> AppResult<Vec<Movie>> {
        Ok(self.movies.read().clone())
    }

    async fn list_movies_page(&self, limit: i64, offset: i64) -> AppResult<Vec<Movie>> {
        let mut movies = self.movies.read().clone();
        movies.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(movies
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn search_movies(&self, query: &str, limit: i64, offset: i64) -> AppResult<Vec<Movie>> {
        let query = query.to_lowercase();
        Ok(self
            .movies
            .read()
            .iter()
            .filter(|m| m.title.to_lowercase().contains(&query))
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_movie(&self, movie_id: &MovieId) -> AppResult<Option<Movie>> {
        Ok(self.movies.read().iter().find(|m| &m.id == movie_id).cloned())
    }

    async fn get_movies(&self, movie_ids: &[MovieId]) -> AppResult<Vec<Movie>> {
        Ok(self
            .movies
            .read()
            .iter()
            .filter(|m| movie_ids.contains(&m.id))
            .cloned()
            .collect())
    }

    async fn movie_exists(&self, movie_id: &MovieId) -> AppResult<bool> {
        Ok(self.movies.read().iter().any(|m| &m.id == movie_id))
    }

    async fn get_user(&self, user_id: Uuid) -> AppResult<Option<User>> {
        Ok(self.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn get_viewing_history(&self, user_id: Uuid) -> AppResult<Vec<ViewingHistoryEntry>> {
        let mut history: Vec<_> = self
            .history
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.watch_date.cmp(&a.watch_date));
        Ok(history)
    }
}

/// M1/M2/M3 catalog with one user who watched M1 and one with no history
pub fn sample_catalog() -> InMemoryCatalog {
    InMemoryCatalog {
        movies: RwLock::new(vec![
            Movie::new("M1", "Inception", &["Sci-Fi"]).with_rating(8.8, 2_400_000),
            Movie::new("M2", "Interstellar", &["Sci-Fi"]).with_rating(8.7, 2_000_000),
            Movie::new("M3", "Titanic", &["Romance"]).with_rating(7.9, 1_200_000),
        ]),
        users: vec![
            User {
                id: WATCHED_M1,
                name: "Ada".to_string(),
                birth_year: Some(1990),
            },
            User {
                id: NEW_USER,
                name: "Grace".to_string(),
                birth_year: None,
            },
        ],
        history: vec![ViewingHistoryEntry {
            user_id: WATCHED_M1,
            movie_id: MovieId::from("M1"),
            watch_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            watch_duration_minutes: Some(148),
        }],
    }
}

/// Server over `catalog` with one generation already published
pub async fn indexed_server(catalog: Arc<InMemoryCatalog>) -> TestServer {
    let state = AppState::new(catalog);
    tokio_test::assert_ok!(
        rebuild_index(
            state.store.clone(),
            state.registry.clone(),
            state.settings.build_timeout,
            state.build_signal.clone(),
        )
        .await
    );

    TestServer::new(create_router(state)).unwrap()
}
