/// A word token with enough position info for capitalization heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word<'a> {
    pub text: &'a str,
    pub sentence_initial: bool,
}

/// Splits text into clauses: runs of words not separated by sentence or
/// clause punctuation. Phrases never span a clause boundary.
pub fn clauses(text: &str) -> Vec<Vec<Word<'_>>> {
    let mut out = Vec::new();
    for sentence in sentences(text) {
        let mut sentence_initial = true;
        for clause in sentence.split(is_clause_break) {
            let words = words(clause)
                .map(|text| {
                    let word = Word {
                        text,
                        sentence_initial,
                    };
                    sentence_initial = false;
                    word
                })
                .collect::<Vec<_>>();
            if !words.is_empty() {
                out.push(words);
            }
        }
    }
    out
}

/// Sentence split on newlines and on `.`/`!`/`?` followed by whitespace.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    for line in text.lines() {
        let mut start = 0;
        let mut chars = line.char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if !matches!(ch, '.' | '!' | '?') {
                continue;
            }
            let at_break = chars
                .peek()
                .map(|(_, next)| next.is_whitespace())
                .unwrap_or(true);
            if at_break {
                let end = idx + ch.len_utf8();
                push_trimmed(&mut out, &line[start..end]);
                start = end;
            }
        }
        push_trimmed(&mut out, &line[start..]);
    }
    out
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, sentence: &'a str) {
    let sentence = sentence.trim();
    if !sentence.is_empty() {
        out.push(sentence);
    }
}

fn is_clause_break(ch: char) -> bool {
    matches!(
        ch,
        ',' | ';'
            | ':'
            | '('
            | ')'
            | '['
            | ']'
            | '"'
            | '/'
            | '.'
            | '!'
            | '?'
            | '&'
            | '+'
            | '\u{201c}'
            | '\u{201d}'
            | '\u{2013}'
            | '\u{2014}'
    )
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '\'' | '\u{2019}' | '-')
}

/// Word tokens: alphanumeric runs, keeping inner apostrophes and hyphens.
pub fn words(clause: &str) -> impl Iterator<Item = &str> {
    clause
        .split(|ch: char| !is_word_char(ch))
        .map(|token| token.trim_matches(|ch: char| !ch.is_alphanumeric()))
        .filter(|token| !token.is_empty())
}
