use crate::catalog::{BookId, Catalog};
use crate::config::{DEFAULT_SCAN_BUDGET, MAX_QUERY_CHARS};
use crate::error::{IndexStaleError, LoadError, QueryError};
use crate::persist::{load_index_for, IndexPaths};
use crate::ranker::QueryRanker;
use crate::vectorizer::{TfidfIndex, Vectorizer, VectorizerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Score reported for title-prefix matches. Similarity scores are cosines
/// and never exceed it.
pub const PREFIX_SCORE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Postings visited per query before semantic candidates are truncated.
    pub scan_budget: usize,
}

impl Default for EngineOptions {
    fn default() -> Self { Self { scan_budget: DEFAULT_SCAN_BUDGET } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionResult {
    pub id: BookId,
    pub title: String,
    pub score: f32,
}

/// Normalized titles sorted for binary-search prefix lookup.
#[derive(Debug)]
struct TitleIndex {
    entries: Vec<(String, BookId)>,
}

impl TitleIndex {
    fn new(catalog: &Catalog) -> Self {
        let mut entries: Vec<(String, BookId)> =
            catalog.records().iter().map(|r| (normalize(&r.title), r.id)).collect();
        entries.sort();
        Self { entries }
    }

    fn prefix_matches(&self, prefix: &str) -> &[(String, BookId)] {
        let start = self.entries.partition_point(|(t, _)| t.as_str() < prefix);
        let len = self.entries[start..].partition_point(|(t, _)| t.starts_with(prefix));
        &self.entries[start..start + len]
    }
}

fn normalize(s: &str) -> String { s.trim().to_lowercase() }

/// Trim and lower-case a raw query.
pub fn normalize_query(raw: &str) -> Result<String, QueryError> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len > MAX_QUERY_CHARS {
        return Err(QueryError::TooLong { len, max: MAX_QUERY_CHARS });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(QueryError::ControlCharacters);
    }
    Ok(trimmed.to_lowercase())
}

/// Read-only suggestion service. Construct once at startup and share
/// (`Arc<SuggestionEngine>`) across request handlers; `suggest` takes
/// `&self` and touches no mutable state.
#[derive(Debug)]
pub struct SuggestionEngine {
    catalog: Catalog,
    titles: TitleIndex,
    vectorizer: Vectorizer,
    ranker: QueryRanker,
    options: EngineOptions,
}

impl SuggestionEngine {
    /// Load the catalog and its persisted index. Missing, corrupt or stale
    /// artifacts are an error; the engine never starts half-initialized.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(catalog_path: P, index_dir: Q, options: EngineOptions) -> Result<Self, LoadError> {
        let catalog = Catalog::load(catalog_path)?;
        let index = load_index_for(&IndexPaths::new(index_dir), &catalog)?;
        let engine = Self::from_index(catalog, index, options)?;
        tracing::info!(
            books = engine.catalog.size(),
            vocab_size = engine.vectorizer.dim(),
            scan_budget = engine.options.scan_budget,
            "suggestion engine ready"
        );
        Ok(engine)
    }

    /// Fit the index in memory instead of reading artifacts.
    pub fn build(catalog: Catalog, config: VectorizerConfig, options: EngineOptions) -> Self {
        let index = Vectorizer::fit(&catalog, config);
        let TfidfIndex { vectorizer, vectors, ids, .. } = index;
        let ranker = QueryRanker::new(vectorizer.dim(), vectors, ids);
        let titles = TitleIndex::new(&catalog);
        Self { catalog, titles, vectorizer, ranker, options }
    }

    pub fn from_index(catalog: Catalog, index: TfidfIndex, options: EngineOptions) -> Result<Self, LoadError> {
        if index.catalog_fingerprint != catalog.fingerprint() {
            return Err(IndexStaleError {
                expected: index.catalog_fingerprint,
                found: catalog.fingerprint().to_string(),
            }
            .into());
        }
        if index.vectors.len() != catalog.size() || !index.ids.iter().copied().eq(catalog.ids()) {
            return Err(LoadError::corrupt("<index>", "rows are not aligned with the catalog"));
        }
        let TfidfIndex { vectorizer, vectors, ids, .. } = index;
        let ranker = QueryRanker::new(vectorizer.dim(), vectors, ids);
        let titles = TitleIndex::new(&catalog);
        Ok(Self { catalog, titles, vectorizer, ranker, options })
    }

    pub fn catalog(&self) -> &Catalog { &self.catalog }

    pub fn vectorizer(&self) -> &Vectorizer { &self.vectorizer }

    /// Up to `k` suggestions: titles starting with the query (ascending id),
    /// then books whose summaries are most similar to it (descending
    /// cosine, ascending id). Bad or empty input yields an empty list.
    pub fn suggest(&self, query: &str, k: usize) -> Vec<SuggestionResult> {
        if k == 0 {
            return Vec::new();
        }
        let q = normalize_query(query).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "rejected query treated as empty");
            String::new()
        });
        if q.is_empty() {
            return Vec::new();
        }

        let mut prefix_ids: Vec<BookId> = self.titles.prefix_matches(&q).iter().map(|(_, id)| *id).collect();
        prefix_ids.sort_unstable();
        prefix_ids.truncate(k);

        let mut results: Vec<SuggestionResult> = prefix_ids
            .iter()
            .filter_map(|&id| self.catalog.get(id))
            .map(|r| SuggestionResult { id: r.id, title: r.title.clone(), score: PREFIX_SCORE })
            .collect();
        if results.len() == k {
            return results;
        }

        let seen: HashSet<BookId> = prefix_ids.into_iter().collect();
        let query_vector = self.vectorizer.transform(&q);
        for hit in self.ranker.rank(&query_vector, self.options.scan_budget) {
            if seen.contains(&hit.id) {
                continue;
            }
            if let Some(r) = self.catalog.get(hit.id) {
                results.push(SuggestionResult { id: r.id, title: r.title.clone(), score: hit.score });
            }
            if results.len() == k {
                break;
            }
        }
        results
    }
}
