//! Cosine-similarity queries over one generation of feature vectors.
//!
//! Similarity is computed on demand: an inverted index (term -> postings)
//! gives the dot product of a query vector against every movie sharing a
//! term, and precomputed norms turn those into cosines. Products are summed
//! in ascending term order, the same order [`FeatureVector::dot`] uses, so a
//! ranked score and a pairwise score for the same two movies are identical.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AppError, AppResult};
use crate::models::MovieId;

use super::generation::{BuildSignal, GenerationId};
use super::vectorizer::{cosine, FeatureVector};

const SIGNAL_CHECK_INTERVAL: usize = 1024;

/// A ranked neighbour and its cosine similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub movie_id: MovieId,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    generation: GenerationId,
    ids: Vec<MovieId>,
    positions: HashMap<MovieId, usize>,
    vectors: Vec<FeatureVector>,
    postings: Vec<Vec<(usize, f64)>>,
}

impl SimilarityIndex {
    pub fn empty(generation: GenerationId) -> Self {
        Self {
            generation,
            ids: Vec::new(),
            positions: HashMap::new(),
            vectors: Vec::new(),
            postings: Vec::new(),
        }
    }

    /// Indexes the vectors of one fit. Every vector must belong to `generation`.
    pub fn new(
        generation: GenerationId,
        vocabulary_len: usize,
        vectors: Vec<(MovieId, FeatureVector)>,
        signal: &BuildSignal,
    ) -> AppResult<Self> {
        let mut index = Self::empty(generation);
        index.postings = vec![Vec::new(); vocabulary_len];
        index.ids.reserve(vectors.len());
        index.vectors.reserve(vectors.len());

        for (position, (movie_id, vector)) in vectors.into_iter().enumerate() {
            if position % SIGNAL_CHECK_INTERVAL == 0 {
                signal.check()?;
            }
            if vector.generation() != generation {
                return Err(AppError::BuildFailure(format!(
                    "vector for {} belongs to generation {}, not {}",
                    movie_id,
                    vector.generation(),
                    generation
                )));
            }
            for &(term, weight) in vector.entries() {
                let postings = index.postings.get_mut(term as usize).ok_or_else(|| {
                    AppError::BuildFailure(format!(
                        "term {} of {} is outside the vocabulary",
                        term, movie_id
                    ))
                })?;
                postings.push((position, weight));
            }
            index.positions.insert(movie_id.clone(), position);
            index.ids.push(movie_id);
            index.vectors.push(vector);
        }

        Ok(index)
    }

    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, movie_id: &str) -> bool {
        self.positions.contains_key(movie_id)
    }

    pub fn ids(&self) -> &[MovieId] {
        &self.ids
    }

    pub fn vector(&self, movie_id: &str) -> Option<&FeatureVector> {
        self.positions.get(movie_id).map(|&p| &self.vectors[p])
    }

    fn position(&self, movie_id: &str) -> AppResult<usize> {
        self.positions
            .get(movie_id)
            .copied()
            .ok_or_else(|| AppError::MovieNotFound(MovieId::from(movie_id)))
    }

    /// Cosine similarity of two indexed movies, in `[0, 1]`
    pub fn similarity(&self, a: &str, b: &str) -> AppResult<f64> {
        let va = &self.vectors[self.position(a)?];
        let vb = &self.vectors[self.position(b)?];
        Ok(cosine(va.dot(vb), va.norm(), vb.norm()))
    }

    /// The `k` movies most similar to `movie_id`, excluding itself.
    ///
    /// Ordered by score descending, then movie id ascending.
    pub fn similar_to(&self, movie_id: &str, k: usize) -> AppResult<Vec<Neighbor>> {
        let position = self.position(movie_id)?;
        self.rank(&self.vectors[position], k, Some(position))
    }

    /// Ranks every indexed movie against `vector`.
    ///
    /// Fails with `StaleGeneration` when `vector` was produced by another
    /// generation's model.
    pub fn rank_vector(&self, vector: &FeatureVector, k: usize) -> AppResult<Vec<Neighbor>> {
        if vector.generation() != self.generation {
            return Err(AppError::StaleGeneration {
                requested: vector.generation(),
                current: self.generation,
            });
        }
        self.rank(vector, k, None)
    }

    fn rank(
        &self,
        query: &FeatureVector,
        k: usize,
        exclude: Option<usize>,
    ) -> AppResult<Vec<Neighbor>> {
        if k == 0 || self.ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut dots = vec![0.0f64; self.ids.len()];
        for &(term, weight) in query.entries() {
            if let Some(postings) = self.postings.get(term as usize) {
                for &(position, doc_weight) in postings {
                    dots[position] += weight * doc_weight;
                }
            }
        }

        let mut scored: Vec<(f64, usize)> = dots
            .into_iter()
            .enumerate()
            .filter(|(position, _)| Some(*position) != exclude)
            .map(|(position, dot)| {
                let score = cosine(dot, query.norm(), self.vectors[position].norm());
                (score, position)
            })
            .collect();

        let order = |a: &(f64, usize), b: &(f64, usize)| {
            b.0.total_cmp(&a.0)
                .then_with(|| self.ids[a.1].cmp(&self.ids[b.1]))
        };
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, order);
            scored.truncate(k);
        }
        scored.sort_by(order);

        Ok(scored
            .into_iter()
            .map(|(score, position)| Neighbor {
                movie_id: self.ids[position].clone(),
                score,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::vectorizer::fit;

    const GEN: GenerationId = GenerationId(7);

    fn build(docs: &[(&str, &str)]) -> SimilarityIndex {
        let corpus: Vec<(MovieId, String)> = docs
            .iter()
            .map(|(id, text)| (MovieId::from(*id), text.to_string()))
            .collect();
        let signal = BuildSignal::new();
        let fitted = fit(GEN, &corpus, &signal).unwrap();
        SimilarityIndex::new(GEN, fitted.model.len(), fitted.vectors, &signal).unwrap()
    }

    fn sample() -> SimilarityIndex {
        build(&[
            ("M1", "inception sci-fi"),
            ("M2", "interstellar sci-fi"),
            ("M3", "titanic romance"),
            ("M4", "inception interstellar sci-fi"),
            ("M5", ""),
        ])
    }

    fn ids(neighbors: &[Neighbor]) -> Vec<&str> {
        neighbors.iter().map(|n| n.movie_id.as_str()).collect()
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let index = sample();
        for a in index.ids() {
            for b in index.ids() {
                assert_eq!(
                    index.similarity(a.as_str(), b.as_str()).unwrap(),
                    index.similarity(b.as_str(), a.as_str()).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_self_similarity_is_one() {
        let index = sample();
        for id in ["M1", "M2", "M3", "M4"] {
            assert!((index.similarity(id, id).unwrap() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_zero_vector_similarity_is_zero() {
        let index = sample();
        assert_eq!(index.similarity("M5", "M1").unwrap(), 0.0);
        assert_eq!(index.similarity("M5", "M5").unwrap(), 0.0);
    }

    #[test]
    fn test_scores_are_bounded() {
        let index = sample();
        for a in index.ids() {
            for n in index.similar_to(a.as_str(), 10).unwrap() {
                assert!((0.0..=1.0).contains(&n.score));
            }
        }
    }

    #[test]
    fn test_similar_to_prefers_shared_genre() {
        let index = build(&[
            ("M1", "inception sci-fi"),
            ("M2", "interstellar sci-fi"),
            ("M3", "titanic romance"),
        ]);
        let top = index.similar_to("M1", 1).unwrap();
        assert_eq!(ids(&top), vec!["M2"]);
    }

    #[test]
    fn test_similar_to_excludes_self_and_bounds_k() {
        let index = sample();
        let neighbors = index.similar_to("M1", 3).unwrap();
        assert_eq!(neighbors.len(), 3);
        assert!(!ids(&neighbors).contains(&"M1"));
        for n in &neighbors {
            assert!(index.contains(n.movie_id.as_str()));
        }
        assert_eq!(index.similar_to("M1", 100).unwrap().len(), 4);
    }

    #[test]
    fn test_similar_to_matches_pairwise_scores() {
        let index = sample();
        for n in index.similar_to("M4", 10).unwrap() {
            assert_eq!(n.score, index.similarity("M4", n.movie_id.as_str()).unwrap());
        }
    }

    #[test]
    fn test_ties_break_by_movie_id() {
        let index = build(&[("b", "heat"), ("c", "heat"), ("a", "heat"), ("q", "heat")]);
        let neighbors = index.similar_to("q", 3).unwrap();
        assert_eq!(ids(&neighbors), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_zero_similarity_movies_rank_last() {
        let index = sample();
        let neighbors = index.similar_to("M1", 4).unwrap();
        assert_eq!(ids(&neighbors)[..2], ["M4", "M2"]);
        assert_eq!(ids(&neighbors)[2..], ["M3", "M5"]);
        assert_eq!(neighbors[3].score, 0.0);
    }

    #[test]
    fn test_similar_to_is_deterministic() {
        let index = sample();
        assert_eq!(
            index.similar_to("M2", 4).unwrap(),
            index.similar_to("M2", 4).unwrap()
        );
    }

    #[test]
    fn test_unknown_movie_is_not_found() {
        let index = sample();
        assert!(matches!(
            index.similar_to("nope", 3),
            Err(AppError::MovieNotFound(_))
        ));
        assert!(matches!(
            index.similarity("M1", "nope"),
            Err(AppError::MovieNotFound(_))
        ));
    }

    #[test]
    fn test_single_movie_has_no_neighbors() {
        let index = build(&[("M1", "heat")]);
        assert!(index.similar_to("M1", 5).unwrap().is_empty());
    }

    #[test]
    fn test_k_zero_is_empty() {
        assert!(sample().similar_to("M1", 0).unwrap().is_empty());
    }

    #[test]
    fn test_rank_vector_rejects_other_generation() {
        let index = sample();
        let other = {
            let corpus = vec![(MovieId::from("x"), "inception".to_string())];
            fit(GenerationId(8), &corpus, &BuildSignal::new()).unwrap()
        };
        let foreign = other.model.transform("inception");
        assert!(matches!(
            index.rank_vector(&foreign, 3),
            Err(AppError::StaleGeneration { requested: GenerationId(8), current: GenerationId(7) })
        ));
    }

    #[test]
    fn test_new_rejects_foreign_vectors() {
        let corpus = vec![(MovieId::from("x"), "heat".to_string())];
        let fitted = fit(GenerationId(2), &corpus, &BuildSignal::new()).unwrap();
        let result = SimilarityIndex::new(GEN, fitted.model.len(), fitted.vectors, &BuildSignal::new());
        assert!(matches!(result, Err(AppError::BuildFailure(_))));
    }
}
