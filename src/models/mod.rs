pub mod movie;
pub mod user;

pub use movie::{parse_genres, Movie, MovieId, MovieRow};
pub use user::{seen_set, User, ViewingHistoryEntry, ViewingHistoryRow};
