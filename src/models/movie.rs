use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt::Display;

/// IMDb-style marker the bulk datasets use for a missing value
const NULL_MARKER: &str = "\\N";

/// Stable short identifier of a movie (e.g. "tt1375666")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovieId(String);

impl MovieId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MovieId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MovieId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MovieId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for MovieId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A movie as ingested from the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub original_title: Option<String>,
    pub title_type: Option<String>,
    pub is_adult: bool,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub runtime_minutes: Option<i32>,
    pub genres: Vec<String>,
    pub avg_rating: Option<f64>,
    pub num_votes: Option<i64>,
}

impl Movie {
    /// Creates a movie with only the attributes the similarity engine reads
    pub fn new(id: impl Into<MovieId>, title: impl Into<String>, genres: &[&str]) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            original_title: None,
            title_type: None,
            is_adult: false,
            start_year: None,
            end_year: None,
            runtime_minutes: None,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            avg_rating: None,
            num_votes: None,
        }
    }

    pub fn with_rating(mut self, avg_rating: f64, num_votes: i64) -> Self {
        self.avg_rating = Some(avg_rating);
        self.num_votes = Some(num_votes);
        self
    }
}

/// Parses the comma-joined genre column into a list.
///
/// NULL, the `\N` marker and blank entries all collapse to nothing.
pub fn parse_genres(raw: Option<&str>) -> Vec<String> {
    match raw.map(str::trim) {
        None | Some("") | Some(NULL_MARKER) => Vec::new(),
        Some(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty() && *g != NULL_MARKER)
            .map(str::to_string)
            .collect(),
    }
}

/// Raw `movies` row as stored by the ingestion pipeline
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovieRow {
    pub id: String,
    pub title: Option<String>,
    pub original_title: Option<String>,
    pub title_type: Option<String>,
    pub is_adult: Option<bool>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub runtime: Option<i32>,
    pub genres: Option<String>,
    pub avg_rating: Option<f64>,
    pub num_votes: Option<i32>,
}

impl From<MovieRow> for Movie {
    fn from(row: MovieRow) -> Self {
        let original_title = row
            .original_title
            .filter(|t| !t.is_empty() && t != NULL_MARKER);

        Movie {
            id: MovieId(row.id),
            title: row.title.unwrap_or_default(),
            original_title,
            title_type: row.title_type,
            is_adult: row.is_adult.unwrap_or(false),
            start_year: row.start_year,
            end_year: row.end_year,
            runtime_minutes: row.runtime,
            genres: parse_genres(row.genres.as_deref()),
            avg_rating: row.avg_rating,
            num_votes: row.num_votes.map(i64::from),
        }
    }
}
