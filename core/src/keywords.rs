use crate::tokenizer::tokenize;
use crate::vectorizer::Vectorizer;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("text is empty")]
    EmptyInput,
}

pub trait KeywordExtractor: Send + Sync {
    /// At most `top_n` terms, most representative first.
    fn extract(&self, text: &str, top_n: usize) -> Result<Vec<String>, ExtractionError>;
}

/// Ranks the distinct tokens of a text by `count × idf` against a fitted
/// vocabulary. Tokens the vocabulary has never seen get the largest idf
/// in it, since they are rarer than anything it holds.
#[derive(Debug, Clone)]
pub struct TfidfKeywordExtractor {
    vectorizer: Vectorizer,
}

impl TfidfKeywordExtractor {
    pub fn new(vectorizer: Vectorizer) -> Self { Self { vectorizer } }
}

impl KeywordExtractor for TfidfKeywordExtractor {
    fn extract(&self, text: &str, top_n: usize) -> Result<Vec<String>, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        let vocab = self.vectorizer.vocabulary();
        let unseen_idf = match vocab.max_idf() {
            m if m > 0.0 => m,
            _ => 1.0,
        };

        let mut counts: HashMap<String, u32> = HashMap::new();
        for t in tokenize(text, self.vectorizer.config().stop_words) {
            *counts.entry(t).or_insert(0) += 1;
        }
        let mut scored: Vec<(String, f32)> = counts
            .into_iter()
            .map(|(term, count)| {
                let idf = vocab.get(&term).map(|c| vocab.idf(c)).unwrap_or(unseen_idf);
                (term, count as f32 * idf)
            })
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(scored.into_iter().take(top_n).map(|(t, _)| t).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BookRecord, Catalog};
    use crate::vectorizer::VectorizerConfig;

    fn extractor() -> TfidfKeywordExtractor {
        let recs = vec![
            BookRecord { id: 1, title: "A".into(), summary: "planet empire war".into() },
            BookRecord { id: 2, title: "B".into(), summary: "planet ocean".into() },
            BookRecord { id: 3, title: "C".into(), summary: "planet spice".into() },
        ];
        let index = Vectorizer::fit(&Catalog::from_records(recs).unwrap(), VectorizerConfig::default());
        TfidfKeywordExtractor::new(index.vectorizer)
    }

    #[test]
    fn rare_terms_outrank_common_ones() {
        let tags = extractor().extract("The planet of spice, spice and more spice.", 2).unwrap();
        assert_eq!(tags, vec!["spice", "planet"]);
    }

    #[test]
    fn ties_are_alphabetical_and_top_n_is_respected() {
        let tags = extractor().extract("war empire ocean", 10).unwrap();
        assert_eq!(tags, vec!["empire", "ocean", "war"]);
        assert_eq!(extractor().extract("war empire ocean", 1).unwrap().len(), 1);
    }

    #[test]
    fn unseen_terms_are_kept() {
        let tags = extractor().extract("zeppelin planet", 5).unwrap();
        assert_eq!(tags[0], "zeppelin");
    }

    #[test]
    fn empty_text_is_an_error() {
        assert_eq!(extractor().extract("   ", 5), Err(ExtractionError::EmptyInput));
    }
}
