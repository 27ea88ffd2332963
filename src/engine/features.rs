//! Feature extraction: turns a movie's title and genres into the token
//! stream the vectorizer fits over.

use crate::models::Movie;

/// Title words dropped before fitting. Genre tokens are never filtered.
const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "but", "by", "can", "did", "do", "does", "for", "from", "had", "has", "have", "he",
    "her", "him", "his", "how", "if", "in", "into", "is", "it", "its", "me", "my", "no", "not",
    "of", "off", "on", "or", "our", "out", "over", "she", "so", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "to", "too", "up", "us", "was",
    "we", "were", "what", "when", "where", "which", "who", "why", "will", "with", "you", "your",
];

const MIN_TITLE_TOKEN_CHARS: usize = 2;

/// Builds the feature string for a movie: title tokens followed by genre tokens.
///
/// Never fails; a movie with no title and no genres yields an empty string.
pub fn extract_features(movie: &Movie) -> String {
    let mut tokens = title_tokens(&movie.title);
    tokens.extend(genre_tokens(&movie.genres));
    tokens.join(" ")
}

/// Tokenizes free text the same way titles are, for ad-hoc queries.
pub fn extract_query_features(text: &str) -> String {
    title_tokens(text).join(" ")
}

fn title_tokens(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .replace(['\'', '\u{2019}'], "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_TITLE_TOKEN_CHARS)
        .filter(|token| STOP_WORDS.binary_search(token).is_err())
        .map(str::to_string)
        .collect()
}

/// Whole-genre tokens: "Sci-Fi" stays "sci-fi", "Film Noir" becomes "film_noir".
fn genre_tokens(genres: &[String]) -> Vec<String> {
    let mut tokens: Vec<String> = genres
        .iter()
        .map(|genre| {
            genre
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("_")
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}
