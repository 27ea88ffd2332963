//! Content-based similarity engine
//!
//! Feature extraction, TF-IDF fit and a cosine index, packaged as immutable
//! generations published through an [`IndexRegistry`].

pub mod features;
pub mod generation;
pub mod index;
pub mod vectorizer;

pub use features::extract_features;
pub use generation::{BuildSignal, Generation, GenerationId, GenerationInfo, IndexRegistry};
pub use index::{Neighbor, SimilarityIndex};
pub use vectorizer::{fit, FeatureVector, FittedCorpus, VocabularyModel};
