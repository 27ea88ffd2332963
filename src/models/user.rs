use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::MovieId;

/// A viewer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub birth_year: Option<i32>,
}

/// One watch of one movie; rewatches on other dates are separate entries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewingHistoryEntry {
    pub user_id: Uuid,
    pub movie_id: MovieId,
    pub watch_date: NaiveDate,
    pub watch_duration_minutes: Option<i32>,
}

/// Raw `viewing_history` row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ViewingHistoryRow {
    pub user_id: Uuid,
    pub movie_id: String,
    pub watch_date: NaiveDate,
    pub watch_duration: Option<i32>,
}

impl From<ViewingHistoryRow> for ViewingHistoryEntry {
    fn from(row: ViewingHistoryRow) -> Self {
        Self {
            user_id: row.user_id,
            movie_id: MovieId::from(row.movie_id),
            watch_date: row.watch_date,
            watch_duration_minutes: row.watch_duration,
        }
    }
}

/// Distinct movie ids across a viewing history, in id order
pub fn seen_set(history: &[ViewingHistoryEntry]) -> BTreeSet<MovieId> {
    history.iter().map(|entry| entry.movie_id.clone()).collect()
}
