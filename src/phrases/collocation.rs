use std::collections::HashMap;

use super::stopwords::is_stopword;
use super::tokenize::clauses;
use super::{CandidatePhrase, PhraseCandidateGenerator};

/// Statistical strategy: repeated n-grams ranked by pointwise mutual
/// information weighted by frequency.
#[derive(Debug, Clone)]
pub struct CollocationGenerator {
    min_word_chars: usize,
    min_frequency: usize,
    max_candidates: usize,
}

impl CollocationGenerator {
    pub fn new(min_word_chars: usize, min_frequency: usize, max_candidates: usize) -> Self {
        Self {
            min_word_chars,
            min_frequency: min_frequency.max(1),
            max_candidates,
        }
    }

    fn edge_ok(&self, word: &str) -> bool {
        !is_stopword(word)
            && word.chars().count() >= self.min_word_chars
            && word.chars().any(char::is_alphabetic)
    }
}

impl PhraseCandidateGenerator for CollocationGenerator {
    fn name(&self) -> &'static str {
        "collocation"
    }

    fn generate(&self, text: &str) -> Vec<CandidatePhrase> {
        let mut unigrams: HashMap<String, usize> = HashMap::new();
        let mut ngrams: HashMap<Vec<String>, usize> = HashMap::new();
        let mut total = 0usize;

        for clause in clauses(text) {
            let words = clause
                .iter()
                .map(|word| word.text.to_lowercase())
                .collect::<Vec<_>>();
            total += words.len();
            for word in &words {
                *unigrams.entry(word.clone()).or_default() += 1;
            }
            for n in 2..=3 {
                for window in words.windows(n) {
                    let (first, last) = (&window[0], &window[n - 1]);
                    if self.edge_ok(first) && self.edge_ok(last) {
                        *ngrams.entry(window.to_vec()).or_default() += 1;
                    }
                }
            }
        }

        if total == 0 {
            return Vec::new();
        }
        let total = total as f64;

        let mut scored = ngrams
            .into_iter()
            .filter(|(_, count)| *count >= self.min_frequency)
            .map(|(gram, count)| {
                let joint = count as f64 / total;
                let independent = gram
                    .iter()
                    .map(|word| unigrams.get(word).copied().unwrap_or(1) as f64 / total)
                    .product::<f64>();
                let pmi = (joint / independent).log2();
                let score = pmi * (1.0 + count as f64).ln();
                (gram.join(" "), score)
            })
            .collect::<Vec<_>>();

        scored.sort_by(|(a_text, a_score), (b_text, b_score)| {
            b_score.total_cmp(a_score).then_with(|| a_text.cmp(b_text))
        });
        scored.truncate(self.max_candidates);

        let mut phrases = scored
            .into_iter()
            .map(|(text, _)| CandidatePhrase::new(text))
            .collect::<Vec<_>>();
        phrases.sort_by(|a, b| a.text.cmp(&b.text));
        phrases
    }
}
