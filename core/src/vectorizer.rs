use crate::catalog::{BookId, Catalog};
use crate::config::DEFAULT_MAX_FEATURES;
use crate::tokenizer::tokenize;
pub use crate::tokenizer::StopWords;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

pub type TermId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorizerConfig {
    pub max_features: usize,
    pub stop_words: StopWords,
    /// idf = ln((1 + n) / (1 + df)) + 1 instead of ln(n / df) + 1
    pub smooth_idf: bool,
    /// tf = 1 + ln(count) instead of the raw count
    pub sublinear_tf: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self { max_features: DEFAULT_MAX_FEATURES, stop_words: StopWords::English, smooth_idf: true, sublinear_tf: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabEntry {
    pub term: String,
    pub df: u32,
    pub idf: f32,
}

/// Ordered term table. A term's position is its column in every vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    entries: Vec<VocabEntry>,
    index: HashMap<String, TermId>,
}

impl Vocabulary {
    /// Fails with the offending term if it appears twice.
    pub fn from_entries(entries: Vec<VocabEntry>) -> Result<Self, String> {
        let mut index = HashMap::with_capacity(entries.len());
        for (col, e) in entries.iter().enumerate() {
            if index.insert(e.term.clone(), col as TermId).is_some() {
                return Err(e.term.clone());
            }
        }
        Ok(Self { entries, index })
    }

    // Selected terms are distinct keys of a map.
    fn from_distinct(entries: Vec<VocabEntry>) -> Self {
        let index = entries.iter().enumerate().map(|(col, e)| (e.term.clone(), col as TermId)).collect();
        Self { entries, index }
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, term: &str) -> Option<TermId> { self.index.get(term).copied() }

    pub fn entries(&self) -> &[VocabEntry] { &self.entries }

    pub fn term(&self, col: TermId) -> Option<&str> { self.entries.get(col as usize).map(|e| e.term.as_str()) }

    pub fn idf(&self, col: TermId) -> f32 { self.entries[col as usize].idf }

    pub fn max_idf(&self) -> f32 { self.entries.iter().map(|e| e.idf).fold(0.0, f32::max) }

    /// Hex SHA-1 over terms, document frequencies and the exact idf bits.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha1::new();
        for e in &self.entries {
            hasher.update(e.term.as_bytes());
            hasher.update([0]);
            hasher.update(e.df.to_le_bytes());
            hasher.update(e.idf.to_bits().to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Sparse L2-normalized tf-idf vector, entries sorted by column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentVector {
    entries: Vec<(TermId, f32)>,
}

impl DocumentVector {
    /// Caller guarantees strictly ascending columns.
    pub(crate) fn from_sorted(entries: Vec<(TermId, f32)>) -> Self { Self { entries } }

    pub fn entries(&self) -> &[(TermId, f32)] { &self.entries }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn terms(&self) -> impl Iterator<Item = TermId> + '_ { self.entries.iter().map(|(t, _)| *t) }

    /// Cosine similarity; both sides are already normalized.
    pub fn dot(&self, other: &DocumentVector) -> f32 {
        let (a, b) = (&self.entries, &other.entries);
        let (mut i, mut j, mut sum) = (0, 0, 0.0f32);
        while i < a.len() && j < b.len() {
            match a[i].0.cmp(&b[j].0) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += a[i].1 * b[j].1;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vectorizer {
    config: VectorizerConfig,
    vocabulary: Vocabulary,
}

/// Output of the offline fit: the vectorizer plus one vector per catalog
/// row, and the ids aligning rows to books.
#[derive(Debug, Clone, PartialEq)]
pub struct TfidfIndex {
    pub vectorizer: Vectorizer,
    pub vectors: Vec<DocumentVector>,
    pub ids: Vec<BookId>,
    pub catalog_fingerprint: String,
}

impl Vectorizer {
    pub fn new(config: VectorizerConfig, vocabulary: Vocabulary) -> Self { Self { config, vocabulary } }

    pub fn config(&self) -> &VectorizerConfig { &self.config }

    pub fn vocabulary(&self) -> &Vocabulary { &self.vocabulary }

    pub fn dim(&self) -> usize { self.vocabulary.len() }

    /// Fit over catalog summaries. Deterministic: the same catalog and
    /// config always yield bit-identical vocabulary and vectors.
    pub fn fit(catalog: &Catalog, config: VectorizerConfig) -> TfidfIndex {
        let doc_counts: Vec<HashMap<String, u32>> = catalog
            .records()
            .iter()
            .map(|r| count_terms(tokenize(&r.summary, config.stop_words)))
            .collect();

        let mut df: HashMap<&str, u32> = HashMap::new();
        for counts in &doc_counts {
            for term in counts.keys() {
                *df.entry(term.as_str()).or_insert(0) += 1;
            }
        }
        let mut selected: Vec<(&str, u32)> = df.into_iter().collect();
        selected.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        selected.truncate(config.max_features);

        let n = catalog.size();
        let entries = selected
            .into_iter()
            .map(|(term, df_t)| VocabEntry { term: term.to_string(), df: df_t, idf: idf(n, df_t, config.smooth_idf) })
            .collect();
        let vocabulary = Vocabulary::from_distinct(entries);
        let vectorizer = Self { config, vocabulary };
        let vectors = doc_counts.iter().map(|c| vectorizer.weigh(c)).collect();
        tracing::debug!(num_docs = n, vocab_size = vectorizer.dim(), "vectorizer fitted");

        TfidfIndex {
            vectorizer,
            vectors,
            ids: catalog.ids().collect(),
            catalog_fingerprint: catalog.fingerprint().to_string(),
        }
    }

    /// Vectorize free text. Out-of-vocabulary tokens are ignored.
    pub fn transform(&self, text: &str) -> DocumentVector {
        self.weigh(&count_terms(tokenize(text, self.config.stop_words)))
    }

    fn weigh(&self, counts: &HashMap<String, u32>) -> DocumentVector {
        let mut weighted: Vec<(TermId, f64)> = counts
            .iter()
            .filter_map(|(term, &count)| {
                let col = self.vocabulary.get(term)?;
                let tf = if self.config.sublinear_tf { 1.0 + (count as f64).ln() } else { count as f64 };
                Some((col, tf * self.vocabulary.idf(col) as f64))
            })
            .collect();
        weighted.sort_by_key(|(col, _)| *col);

        let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm == 0.0 {
            return DocumentVector::default();
        }
        DocumentVector::from_sorted(weighted.into_iter().map(|(c, w)| (c, (w / norm) as f32)).collect())
    }
}

fn count_terms(tokens: Vec<String>) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for t in tokens {
        *counts.entry(t).or_insert(0) += 1;
    }
    counts
}

fn idf(n: usize, df: u32, smooth: bool) -> f32 {
    let (n, df) = (n as f64, df as f64);
    let ratio = if smooth { (1.0 + n) / (1.0 + df) } else { n / df.max(1.0) };
    (ratio.ln() + 1.0) as f32
}
