//! Defaults for indexing and serving.
//!
//! These are compile-time constants; runtime overrides come from CLI
//! arguments and environment variables in the `indexer` and `server`
//! binaries.

/// Upper bound on vocabulary size when fitting the vectorizer.
pub const DEFAULT_MAX_FEATURES: usize = 5000;

/// Number of suggestions returned when the caller does not ask for a count.
pub const DEFAULT_K: usize = 10;

/// Largest `k` the HTTP layer will honour.
pub const MAX_K: usize = 100;

/// Maximum number of postings the ranker visits while collecting
/// candidates for one query. Stop-word-like terms with huge posting lists
/// would otherwise turn a one-letter query into a full scan.
pub const DEFAULT_SCAN_BUDGET: usize = 50_000;

/// Queries longer than this (in characters) are rejected and treated as empty.
pub const MAX_QUERY_CHARS: usize = 256;

/// Version written to, and required from, `meta.json`.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Format tag written to `meta.json`.
pub const ARTIFACT_FORMAT_NAME: &str = "booksuggest-tfidf";

/// Tags written per book by `indexer tags`.
pub const DEFAULT_TAGS_PER_BOOK: usize = 5;

/// Tags returned by the `/extract-tags` endpoint.
pub const DEFAULT_TAGS_PER_REQUEST: usize = 10;
