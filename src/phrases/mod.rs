use std::sync::Arc;

use crate::config::{PhraseConfig, PhraseStrategy};

mod collocation;
mod pos;
mod stopwords;
mod tokenize;

pub use collocation::CollocationGenerator;
pub use pos::PosPatternGenerator;
pub use stopwords::is_stopword;
pub(crate) use tokenize::sentences;

/// A 2-3 word phrase proposed from the page text, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CandidatePhrase {
    pub text: String,
    pub length: usize,
}

impl CandidatePhrase {
    pub fn new(text: String) -> Self {
        let length = text.split_whitespace().count();
        Self { text, length }
    }
}

/// One phrase-extraction strategy. Output is deduplicated and sorted by text.
pub trait PhraseCandidateGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    fn generate(&self, text: &str) -> Vec<CandidatePhrase>;
}

pub fn generator_for(config: &PhraseConfig) -> Arc<dyn PhraseCandidateGenerator> {
    match config.strategy {
        PhraseStrategy::Pos => Arc::new(PosPatternGenerator::new(config.min_word_chars)),
        PhraseStrategy::Collocation => Arc::new(CollocationGenerator::new(
            config.min_word_chars,
            config.min_frequency,
            config.max_candidates,
        )),
    }
}
