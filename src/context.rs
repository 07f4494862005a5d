use crate::text::{back_chars, collapse_whitespace, forward_chars};
use crate::verify::PhraseMatcher;

const ELLIPSIS: &str = "...";

/// Window of up to `window` characters on each side of the first
/// word-boundary match of `phrase`, with the match (original casing) in
/// `[..]`. Empty when the phrase does not occur.
pub fn extract_context(phrase: &str, source: &str, window: usize) -> String {
    let Ok(matcher) = PhraseMatcher::new(phrase) else {
        return String::new();
    };
    let Some((start, end)) = matcher.find(source) else {
        return String::new();
    };
    highlight(source, start, end, window)
}

fn highlight(source: &str, start: usize, end: usize, window: usize) -> String {
    let left = snap_left(source, back_chars(source, start, window), start);
    let right = snap_right(source, forward_chars(source, end, window), end);

    let body = collapse_whitespace(&format!(
        "{}[{}]{}",
        &source[left..start],
        &source[start..end],
        &source[end..right]
    ));

    let mut out = String::with_capacity(body.len() + 2 * ELLIPSIS.len());
    if left > 0 {
        out.push_str(ELLIPSIS);
    }
    out.push_str(&body);
    if right < source.len() {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Moves a cut that lands mid-word forward to the next word start.
fn snap_left(source: &str, left: usize, start: usize) -> usize {
    if left == 0 || source[..left].ends_with(char::is_whitespace) {
        return left;
    }
    match source[left..start].find(char::is_whitespace) {
        Some(idx) => {
            let rest = &source[left + idx..start];
            start - rest.trim_start().len()
        }
        None => start,
    }
}

/// Moves a cut that lands mid-word back to the previous word end.
fn snap_right(source: &str, right: usize, end: usize) -> usize {
    if right >= source.len() || source[right..].starts_with(char::is_whitespace) {
        return right;
    }
    match source[end..right].rfind(char::is_whitespace) {
        Some(idx) => end + source[end..end + idx].trim_end().len(),
        None => end,
    }
}
