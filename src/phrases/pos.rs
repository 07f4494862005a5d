use std::collections::BTreeSet;

use super::stopwords::is_stopword;
use super::tokenize::{Word, clauses};
use super::{CandidatePhrase, PhraseCandidateGenerator};

/// Coarse part-of-speech classes, enough to tell noun phrases apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Noun,
    PluralNoun,
    ProperNoun,
    Adjective,
    Gerund,
    Preposition,
    Determiner,
    Pronoun,
    Conjunction,
    Verb,
    Adverb,
    Number,
}

use Tag::{Adjective, Gerund, Noun, PluralNoun, Preposition, ProperNoun};

const BIGRAMS: &[[Tag; 2]] = &[
    [Adjective, Noun],
    [Noun, Noun],
    [ProperNoun, ProperNoun],
    [Adjective, PluralNoun],
    [Gerund, Noun],
    [Noun, PluralNoun],
    [Gerund, PluralNoun],
    [ProperNoun, Noun],
    [ProperNoun, PluralNoun],
];

const TRIGRAMS: &[[Tag; 3]] = &[
    [Adjective, Adjective, Noun],
    [Adjective, Noun, Noun],
    [Noun, Preposition, Noun],
    [ProperNoun, ProperNoun, ProperNoun],
    [Adjective, Adjective, PluralNoun],
    [Adjective, Noun, PluralNoun],
    [Noun, Noun, PluralNoun],
    [Noun, Preposition, PluralNoun],
    [PluralNoun, Preposition, Noun],
];

const DETERMINERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "each", "every", "either", "neither",
    "some", "any", "no", "another", "all", "both", "such", "what", "which", "whose", "many",
    "much", "several", "few", "more", "most", "other",
];

const PREPOSITIONS: &[&str] = &[
    "of", "in", "on", "at", "for", "with", "from", "by", "about", "into", "onto", "over", "under",
    "between", "through", "during", "without", "within", "across", "after", "before", "among",
    "against", "toward", "towards", "upon", "via", "per", "near", "behind", "beyond", "around",
    "along", "despite", "inside", "outside", "than", "to", "up", "down", "off", "until",
];

const CONJUNCTIONS: &[&str] = &[
    "and", "or", "but", "nor", "so", "yet", "because", "although", "though", "while", "if",
    "unless", "whereas", "whether",
];

const PRONOUNS: &[&str] = &[
    "i", "me", "my", "mine", "we", "us", "our", "ours", "you", "your", "yours", "he", "him",
    "his", "she", "her", "hers", "it", "its", "they", "them", "their", "theirs", "myself",
    "yourself", "itself", "themselves", "ourselves", "who", "whom", "something", "anything",
    "nothing", "everything", "someone", "anyone", "everyone",
];

const AUXILIARIES: &[&str] = &[
    "is", "are", "was", "were", "be", "been", "being", "am", "have", "has", "had", "do", "does",
    "did", "can", "could", "will", "would", "shall", "should", "may", "might", "must",
];

const ADVERBS: &[&str] = &[
    "not", "very", "also", "just", "only", "too", "really", "quite", "often", "always", "never",
    "sometimes", "usually", "still", "even", "already", "here", "there", "then", "now", "again",
    "ever", "almost", "soon", "well", "how", "why", "when", "where",
];

const VERBS: &[&str] = &[
    "includes", "include", "offers", "provides", "provide", "makes", "make", "gives", "give",
    "takes", "take", "gets", "get", "seems", "seem", "allows", "allow", "lets", "let",
    "becomes", "become", "explore", "explores", "discover", "discovers", "learn", "learns",
    "buy", "buys", "know", "knows", "want", "wants", "see", "sees", "find", "finds", "said",
    "says", "made", "went", "came", "got", "took", "gave", "contains", "contain", "requires",
    "require", "enjoy", "enjoys", "choose", "chooses",
];

const ADJECTIVES: &[&str] = &[
    "new", "good", "best", "better", "great", "high", "low", "large", "small", "big", "old",
    "young", "free", "full", "rare", "top", "main", "real", "easy", "hard", "simple", "common",
    "early", "late", "long", "short", "key", "latest", "modern", "classic", "digital", "local",
    "popular", "professional", "perfect", "unique", "beautiful", "essential", "special",
    "public", "private", "open", "whole", "different", "important", "available", "possible",
    "personal", "social", "natural", "general", "certain", "clear", "fresh", "quick", "fast",
    "slow", "strong", "light", "dark", "deep", "wide", "red", "blue", "green", "black", "white",
    "cheap", "expensive", "affordable", "organic", "original", "advanced", "basic", "complete",
    "final", "first", "last", "next", "daily", "weekly", "monthly", "annual", "online", "used",
];

/// Nouns that the suffix rules would otherwise misread.
const NOUN_EXCEPTIONS: &[&str] = &[
    "family", "supply", "assembly", "july", "italy", "anomaly", "butterfly", "thing", "king",
    "ring", "spring", "string", "ceiling", "wedding", "morning", "evening", "clothing",
];

fn closed_class(lower: &str) -> Option<Tag> {
    let lists: [(&[&str], Tag); 8] = [
        (DETERMINERS, Tag::Determiner),
        (PREPOSITIONS, Tag::Preposition),
        (CONJUNCTIONS, Tag::Conjunction),
        (PRONOUNS, Tag::Pronoun),
        (AUXILIARIES, Tag::Verb),
        (ADVERBS, Tag::Adverb),
        (VERBS, Tag::Verb),
        (ADJECTIVES, Tag::Adjective),
    ];
    lists
        .iter()
        .find(|(words, _)| words.contains(&lower))
        .map(|(_, tag)| *tag)
}

fn suffix_tag(lower: &str) -> Tag {
    let len = lower.chars().count();
    if NOUN_EXCEPTIONS.contains(&lower) {
        return Noun;
    }
    if lower.contains('-') {
        return if lower.ends_with('s') && !lower.ends_with("ss") {
            PluralNoun
        } else {
            Adjective
        };
    }
    if len >= 5 && lower.ends_with("ing") {
        return Gerund;
    }
    if len >= 4 && lower.ends_with("ly") {
        return Tag::Adverb;
    }
    const ADJECTIVE_SUFFIXES: &[&str] = &["ous", "ful", "able", "ible", "less", "ical", "ish"];
    if len >= 6 && ADJECTIVE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix)) {
        return Adjective;
    }
    if len >= 5 && lower.ends_with("ed") && !lower.ends_with("eed") {
        return Adjective;
    }
    if len >= 4
        && lower.ends_with('s')
        && !["ss", "us", "is", "'s", "\u{2019}s"]
            .iter()
            .any(|suffix| lower.ends_with(suffix))
    {
        return PluralNoun;
    }
    Noun
}

pub fn tag(word: &Word<'_>) -> Tag {
    let lower = word.text.to_lowercase();
    if let Some(tag) = closed_class(&lower) {
        return tag;
    }
    if !word.text.chars().any(char::is_alphabetic) {
        return Tag::Number;
    }

    let mut chars = word.text.chars();
    let capitalized = chars.next().is_some_and(char::is_uppercase);
    let acronym = word.text.chars().count() > 1
        && word
            .text
            .chars()
            .filter(|ch| ch.is_alphabetic())
            .all(char::is_uppercase);
    if acronym || (capitalized && !word.sentence_initial) {
        return ProperNoun;
    }
    suffix_tag(&lower)
}

/// Candidate phrases from adjective/noun/gerund tag patterns ending in a noun.
#[derive(Debug, Clone)]
pub struct PosPatternGenerator {
    min_word_chars: usize,
}

impl PosPatternGenerator {
    pub fn new(min_word_chars: usize) -> Self {
        Self { min_word_chars }
    }

    fn accept(&self, words: &[Word<'_>]) -> Option<String> {
        let (first, last) = (words.first()?, words.last()?);
        let edges_ok = [first, last].iter().all(|word| {
            !is_stopword(word.text) && word.text.chars().count() >= self.min_word_chars
        });
        if !(2..=3).contains(&words.len()) || !edges_ok {
            return None;
        }
        Some(
            words
                .iter()
                .map(|word| word.text.to_lowercase())
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}

impl PhraseCandidateGenerator for PosPatternGenerator {
    fn name(&self) -> &'static str {
        "pos"
    }

    fn generate(&self, text: &str) -> Vec<CandidatePhrase> {
        let mut phrases = BTreeSet::new();
        for clause in clauses(text) {
            let tags = clause.iter().map(tag).collect::<Vec<_>>();

            for (window, tags) in clause.windows(2).zip(tags.windows(2)) {
                if BIGRAMS.iter().any(|pattern| pattern[..] == *tags)
                    && let Some(phrase) = self.accept(window)
                {
                    phrases.insert(phrase);
                }
            }
            for (window, tags) in clause.windows(3).zip(tags.windows(3)) {
                if TRIGRAMS.iter().any(|pattern| pattern[..] == *tags)
                    && let Some(phrase) = self.accept(window)
                {
                    phrases.insert(phrase);
                }
            }
        }
        phrases.into_iter().map(CandidatePhrase::new).collect()
    }
}
