//! TF-IDF vector space over the feature strings of one corpus.
//!
//! Weights follow the smoothed formulation: `tf * (ln((1 + n) / (1 + df)) + 1)`
//! with `tf` the raw term count. The vocabulary is ordered lexicographically,
//! so a term's index is its rank and a fixed corpus always fits to the same
//! model.

use std::collections::{BTreeMap, HashSet};

use crate::error::AppResult;
use crate::models::MovieId;

use super::generation::{BuildSignal, GenerationId};

/// How many documents are processed between cancellation checks
const SIGNAL_CHECK_INTERVAL: usize = 1024;

/// Sparse TF-IDF vector, entries sorted by term index
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    generation: GenerationId,
    entries: Vec<(u32, f64)>,
    norm: f64,
}

impl FeatureVector {
    fn new(generation: GenerationId, entries: Vec<(u32, f64)>) -> Self {
        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        Self {
            generation,
            entries,
            norm,
        }
    }

    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    pub fn entries(&self) -> &[(u32, f64)] {
        &self.entries
    }

    /// L2 norm
    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn is_zero(&self) -> bool {
        self.norm == 0.0
    }

    /// Dot product, accumulated in ascending term order
    pub fn dot(&self, other: &FeatureVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.entries.len() && j < other.entries.len() {
            let (ta, wa) = self.entries[i];
            let (tb, wb) = other.entries[j];
            match ta.cmp(&tb) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += wa * wb;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// Cosine similarity from a precomputed dot product and the two norms.
///
/// Zero norms short-circuit to 0.0; the result is clamped to `[0, 1]`.
pub fn cosine(dot: f64, norm_a: f64, norm_b: f64) -> f64 {
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Fitted vocabulary and inverse document frequencies
#[derive(Debug, Clone)]
pub struct VocabularyModel {
    generation: GenerationId,
    terms: Vec<String>,
    idf: Vec<f64>,
    document_count: usize,
}

impl VocabularyModel {
    pub fn empty(generation: GenerationId) -> Self {
        Self {
            generation,
            terms: Vec::new(),
            idf: Vec::new(),
            document_count: 0,
        }
    }

    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn term_index(&self, term: &str) -> Option<u32> {
        self.terms
            .binary_search_by(|t| t.as_str().cmp(term))
            .ok()
            .map(|i| i as u32)
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.term_index(term).map(|i| self.idf[i as usize])
    }

    /// Projects a feature string onto this vocabulary. Unknown terms are ignored.
    pub fn transform(&self, features: &str) -> FeatureVector {
        let mut counts: BTreeMap<u32, u32> = BTreeMap::new();
        for token in features.split_whitespace() {
            if let Some(index) = self.term_index(token) {
                *counts.entry(index).or_default() += 1;
            }
        }
        let entries = counts
            .into_iter()
            .map(|(index, tf)| (index, f64::from(tf) * self.idf[index as usize]))
            .collect();
        FeatureVector::new(self.generation, entries)
    }
}

/// Result of fitting one corpus
#[derive(Debug, Clone)]
pub struct FittedCorpus {
    pub model: VocabularyModel,
    /// One vector per distinct movie, in corpus order
    pub vectors: Vec<(MovieId, FeatureVector)>,
}

fn smoothed_idf(document_count: usize, document_frequency: usize) -> f64 {
    ((1.0 + document_count as f64) / (1.0 + document_frequency as f64)).ln() + 1.0
}

/// Fits the vector space over `corpus` in one pass.
///
/// Empty and single-document corpora are valid. A duplicate movie id keeps
/// its first occurrence. Fails only when `signal` is cancelled or expires.
pub fn fit(
    generation: GenerationId,
    corpus: &[(MovieId, String)],
    signal: &BuildSignal,
) -> AppResult<FittedCorpus> {
    let mut seen: HashSet<&MovieId> = HashSet::with_capacity(corpus.len());
    let mut documents: Vec<(&MovieId, BTreeMap<&str, u32>)> = Vec::with_capacity(corpus.len());
    let mut document_frequency: BTreeMap<&str, usize> = BTreeMap::new();

    for (position, (movie_id, features)) in corpus.iter().enumerate() {
        if position % SIGNAL_CHECK_INTERVAL == 0 {
            signal.check()?;
        }
        if !seen.insert(movie_id) {
            tracing::warn!(movie_id = %movie_id, "Duplicate movie in corpus, keeping first");
            continue;
        }

        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for token in features.split_whitespace() {
            *counts.entry(token).or_default() += 1;
        }
        for term in counts.keys() {
            *document_frequency.entry(*term).or_default() += 1;
        }
        documents.push((movie_id, counts));
    }

    let document_count = documents.len();
    let (terms, idf): (Vec<String>, Vec<f64>) = document_frequency
        .iter()
        .map(|(term, df)| (term.to_string(), smoothed_idf(document_count, *df)))
        .unzip();

    let model = VocabularyModel {
        generation,
        terms,
        idf,
        document_count,
    };

    let mut vectors = Vec::with_capacity(document_count);
    for (position, (movie_id, counts)) in documents.into_iter().enumerate() {
        if position % SIGNAL_CHECK_INTERVAL == 0 {
            signal.check()?;
        }
        // BTreeMap iteration is already in vocabulary order
        let entries = counts
            .into_iter()
            .filter_map(|(term, tf)| {
                model
                    .term_index(term)
                    .map(|index| (index, f64::from(tf) * model.idf[index as usize]))
            })
            .collect();
        vectors.push((movie_id.clone(), FeatureVector::new(generation, entries)));
    }

    tracing::debug!(
        generation = %generation,
        documents = document_count,
        vocabulary = model.len(),
        "Fitted vector space"
    );

    Ok(FittedCorpus { model, vectors })
}
