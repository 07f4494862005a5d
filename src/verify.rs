use regex::Regex;

use crate::phrases::CandidatePhrase;

/// Case-insensitive, word-boundary matcher for one phrase. Inner whitespace
/// matches spaces and tabs but never a newline, so a match stays inside one
/// paragraph or heading.
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    regex: Regex,
}

impl PhraseMatcher {
    pub fn new(phrase: &str) -> Result<Self, regex::Error> {
        let body = phrase
            .split_whitespace()
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(r"[^\S\n]+");
        if body.is_empty() {
            return Err(regex::Error::Syntax("empty phrase".to_owned()));
        }
        let regex = Regex::new(&format!(r"(?i)\b{body}\b"))?;
        Ok(Self { regex })
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }

    /// Byte range of the first match.
    pub fn find(&self, haystack: &str) -> Option<(usize, usize)> {
        self.regex.find(haystack).map(|m| (m.start(), m.end()))
    }

    pub fn count(&self, haystack: &str) -> usize {
        self.regex.find_iter(haystack).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPhrase {
    /// Lowercased phrase.
    pub text: String,
    /// The first match exactly as written in the source.
    pub surface: String,
    /// Character offset of the first match.
    pub first_offset: usize,
    pub occurrence_count: usize,
}

impl VerifiedPhrase {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Verification {
    pub verified: Vec<VerifiedPhrase>,
    pub rejected: usize,
}

/// Keeps only candidates found verbatim in `source`.
pub fn verify(candidates: &[CandidatePhrase], source: &str) -> Verification {
    let mut out = Verification::default();
    for candidate in candidates {
        match verify_one(candidate, source) {
            Some(phrase) => out.verified.push(phrase),
            None => {
                tracing::debug!(phrase = %candidate.text, "candidate not found verbatim; dropped");
                out.rejected += 1;
            }
        }
    }
    out
}

fn verify_one(candidate: &CandidatePhrase, source: &str) -> Option<VerifiedPhrase> {
    if !(2..=3).contains(&candidate.length) {
        return None;
    }
    let matcher = PhraseMatcher::new(&candidate.text).ok()?;
    let (start, end) = matcher.find(source)?;
    Some(VerifiedPhrase {
        text: candidate.text.to_lowercase(),
        surface: source[start..end].to_owned(),
        first_offset: crate::text::char_offset(source, start),
        occurrence_count: matcher.count(source),
    })
}
