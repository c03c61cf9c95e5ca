//! Title suggestions for a book catalog.
//!
//! The offline half ([`vectorizer`], [`persist`]) fits a TF-IDF index over
//! book summaries and writes it as versioned artifacts. The online half
//! ([`ranker`], [`suggest`]) loads those artifacts next to the catalog and
//! answers as-you-type queries: prefix matches on titles first, then
//! cosine-similarity matches over summaries.

pub mod catalog;
pub mod config;
pub mod error;
pub mod genre;
pub mod keywords;
pub mod persist;
pub mod ranker;
pub mod suggest;
pub mod tokenizer;
pub mod vectorizer;

pub use catalog::{BookId, BookRecord, Catalog};
pub use error::{IndexStaleError, LoadError, QueryError};
pub use genre::{GenreClassifier, LinearGenreModel, PredictionError};
pub use keywords::{ExtractionError, KeywordExtractor, TfidfKeywordExtractor};
pub use ranker::{QueryRanker, ScoredRow};
pub use suggest::{EngineOptions, SuggestionEngine, SuggestionResult};
pub use vectorizer::{DocumentVector, StopWords, Vectorizer, VectorizerConfig, Vocabulary};
