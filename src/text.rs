const KEPT_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '\'', '"', '(', ')', '-', '&', '%', '$', '/', '+', '#', '@',
    '\u{2018}', '\u{2019}', '\u{201c}', '\u{201d}', '\u{2013}', '\u{2014}',
];

/// Drops characters outside a conservative alphanumeric/punctuation set and
/// collapses whitespace runs to a single space.
pub fn clean_text(raw: &str) -> String {
    let filtered = raw
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch.is_whitespace() || KEPT_PUNCTUATION.contains(&ch) {
                ch
            } else {
                ' '
            }
        })
        .collect::<String>();
    collapse_whitespace(&filtered)
}

pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Byte offset of the char `chars` positions before `byte_idx` (clamped to 0).
pub fn back_chars(text: &str, byte_idx: usize, chars: usize) -> usize {
    if chars == 0 {
        return byte_idx;
    }
    text[..byte_idx]
        .char_indices()
        .rev()
        .nth(chars - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

/// Byte offset of the char `chars` positions after `byte_idx` (clamped to the end).
pub fn forward_chars(text: &str, byte_idx: usize, chars: usize) -> usize {
    text[byte_idx..]
        .char_indices()
        .nth(chars)
        .map(|(idx, _)| byte_idx + idx)
        .unwrap_or(text.len())
}

/// Last `chars` characters of `text`.
pub fn tail_chars(text: &str, chars: usize) -> &str {
    &text[back_chars(text, text.len(), chars)..]
}

/// First `chars` characters of `text`.
pub fn head_chars(text: &str, chars: usize) -> &str {
    &text[..forward_chars(text, 0, chars)]
}

pub fn char_offset(text: &str, byte_idx: usize) -> usize {
    text[..byte_idx].chars().count()
}
