//! TF-IDF over unigrams and bigrams.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Default vocabulary cap.
pub const DEFAULT_MAX_FEATURES: usize = 10_000;

/// Sparse row: (feature index, weight), sorted by index.
pub type SparseVec = Vec<(usize, f64)>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

/// Unigrams and bigrams of a cleaned document. Single-character tokens are ignored.
fn terms(doc: &str) -> Vec<String> {
    let tokens: Vec<&str> = doc
        .split_whitespace()
        .filter(|t| t.chars().count() >= 2)
        .collect();

    let mut terms: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    for pair in tokens.windows(2) {
        terms.push(format!("{} {}", pair[0], pair[1]));
    }
    terms
}

impl TfidfVectorizer {
    /// Build the vocabulary and IDF weights from a corpus.
    ///
    /// Keeps the `max_features` most frequent terms across the corpus,
    /// ties broken lexicographically, then indexes them in sorted order.
    pub fn fit<S: AsRef<str>>(docs: &[S], max_features: usize) -> Self {
        let mut term_freq: HashMap<String, usize> = HashMap::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in docs {
            let mut seen = HashSet::new();
            for term in terms(doc.as_ref()) {
                if seen.insert(term.clone()) {
                    *doc_freq.entry(term.clone()).or_default() += 1;
                }
                *term_freq.entry(term).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);

        let mut selected: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        selected.sort();

        // Smoothed IDF: ln((1 + n) / (1 + df)) + 1
        let n = docs.len() as f64;
        let idf = selected
            .iter()
            .map(|term| {
                let df = doc_freq.get(term).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let vocabulary = selected
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term, idx))
            .collect();

        Self { vocabulary, idf }
    }

    /// L2-normalized TF-IDF row for one document. Unknown terms are dropped.
    pub fn transform(&self, doc: &str) -> SparseVec {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in terms(doc) {
            if let Some(&idx) = self.vocabulary.get(&term) {
                *counts.entry(idx).or_default() += 1.0;
            }
        }

        let mut row: SparseVec = counts
            .into_iter()
            .filter_map(|(idx, tf)| self.idf.get(idx).map(|idf| (idx, tf * idf)))
            .collect();
        row.sort_by_key(|&(idx, _)| idx);

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in row.iter_mut() {
                *v /= norm;
            }
        }
        row
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.idf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }

    /// A vocabulary term whose index has no IDF entry, if any.
    pub fn dangling_term(&self) -> Option<(&str, usize)> {
        self.vocabulary
            .iter()
            .find(|&(_, &idx)| idx >= self.idf.len())
            .map(|(term, &idx)| (term.as_str(), idx))
    }
}
