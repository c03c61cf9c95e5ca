use crate::catalog::BookId;
use crate::vectorizer::{DocumentVector, TermId};
use std::cmp::Ordering;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRow {
    pub row: usize,
    pub id: BookId,
    pub score: f32,
}

/// Cosine ranking over the document matrix, restricted through an inverted
/// index to rows sharing at least one term with the query. Immutable after
/// construction.
#[derive(Debug)]
pub struct QueryRanker {
    vectors: Vec<DocumentVector>,
    ids: Vec<BookId>,
    /// term id → ascending row indices
    postings: Vec<Vec<u32>>,
}

impl QueryRanker {
    /// `vectors` and `ids` are row-aligned; every column is `< dim`.
    pub fn new(dim: usize, vectors: Vec<DocumentVector>, ids: Vec<BookId>) -> Self {
        let mut postings: Vec<Vec<u32>> = vec![Vec::new(); dim];
        for (row, v) in vectors.iter().enumerate() {
            for term in v.terms() {
                postings[term as usize].push(row as u32);
            }
        }
        Self { vectors, ids, postings }
    }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    pub fn id(&self, row: usize) -> Option<BookId> { self.ids.get(row).copied() }

    pub fn vector(&self, row: usize) -> Option<&DocumentVector> { self.vectors.get(row) }

    fn posting(&self, term: TermId) -> &[u32] {
        self.postings.get(term as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows sharing a term with `query`, collected rarest term first and
    /// capped at `budget` visited postings.
    pub fn candidates(&self, query: &DocumentVector, budget: usize) -> Vec<usize> {
        let mut terms: Vec<TermId> = query.terms().collect();
        terms.sort_by_key(|&t| (self.posting(t).len(), t));

        let mut seen: HashSet<u32> = HashSet::new();
        let mut visited = 0usize;
        for t in terms {
            let list = self.posting(t);
            let take = list.len().min(budget - visited);
            seen.extend(&list[..take]);
            visited += take;
            if take < list.len() {
                tracing::debug!(budget, candidates = seen.len(), "scan budget exhausted, truncating candidates");
                break;
            }
        }
        let mut rows: Vec<usize> = seen.into_iter().map(|r| r as usize).collect();
        rows.sort_unstable();
        rows
    }

    /// Candidates with a positive score, ordered by descending score then
    /// ascending book id.
    pub fn rank(&self, query: &DocumentVector, budget: usize) -> Vec<ScoredRow> {
        if query.is_empty() {
            return Vec::new();
        }
        let mut scored: Vec<ScoredRow> = self
            .candidates(query, budget)
            .into_iter()
            .map(|row| ScoredRow { row, id: self.ids[row], score: query.dot(&self.vectors[row]) })
            .filter(|s| s.score > 0.0)
            .collect();
        scored.sort_by(rank_order);
        scored
    }
}

fn rank_order(a: &ScoredRow, b: &ScoredRow) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BookRecord, Catalog};
    use crate::vectorizer::{TfidfIndex, Vectorizer, VectorizerConfig};

    fn ranker(rows: &[(i64, &str)]) -> (QueryRanker, Vectorizer) {
        let recs = rows
            .iter()
            .map(|(id, s)| BookRecord { id: *id, title: String::new(), summary: s.to_string() })
            .collect();
        let TfidfIndex { vectorizer, vectors, ids, .. } =
            Vectorizer::fit(&Catalog::from_records(recs).unwrap(), VectorizerConfig::default());
        (QueryRanker::new(vectorizer.dim(), vectors, ids), vectorizer)
    }

    #[test]
    fn ranks_by_similarity() {
        let (r, v) = ranker(&[(1, "desert planet"), (2, "spice spice desert"), (3, "ocean waves")]);
        let hits = r.rank(&v.transform("spice"), usize::MAX);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 2);
        let hits = r.rank(&v.transform("desert spice"), usize::MAX);
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn equal_scores_break_ties_by_id() {
        let (r, v) = ranker(&[(9, "spice worm"), (4, "spice worm"), (7, "ocean")]);
        let hits = r.rank(&v.transform("spice"), usize::MAX);
        assert_eq!(hits.iter().map(|h| h.id).collect::<Vec<_>>(), vec![4, 9]);
        assert_eq!(hits[0].score.to_bits(), hits[1].score.to_bits());
    }

    #[test]
    fn only_rows_sharing_a_term_are_candidates() {
        let (r, v) = ranker(&[(1, "spice"), (2, "ocean"), (3, "spice ocean")]);
        assert_eq!(r.candidates(&v.transform("spice"), usize::MAX), vec![0, 2]);
        assert!(r.rank(&v.transform("nothing here"), usize::MAX).is_empty());
    }

    #[test]
    fn budget_truncates_without_failing() {
        let (r, v) = ranker(&[(1, "common rare"), (2, "common"), (3, "common"), (4, "common")]);
        let q = v.transform("common rare");
        // rarest term first: "rare" costs one posting, "common" is cut short
        assert_eq!(r.candidates(&q, 3), vec![0, 1]);
        assert_eq!(r.rank(&q, 3)[0].id, 1);
        assert_eq!(r.candidates(&q, 1), vec![0]);
        assert_eq!(r.candidates(&q, usize::MAX).len(), 4);
        assert!(r.rank(&q, 0).is_empty());
    }
}
