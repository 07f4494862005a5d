use crate::verify::VerifiedPhrase;

/// `occurrences * phrase_words / total_words`, clamped to `[0, 1]`.
pub fn raw_density(occurrences: usize, phrase_words: usize, total_words: usize) -> f64 {
    if total_words == 0 || occurrences == 0 || phrase_words == 0 {
        return 0.0;
    }
    let density = (occurrences * phrase_words) as f64 / total_words as f64;
    density.clamp(0.0, 1.0)
}

/// Density per phrase, in input order. With `normalize`, values are divided
/// by the page maximum so the densest phrase scores 1.0.
pub fn densities(phrases: &[VerifiedPhrase], content: &str, normalize: bool) -> Vec<f64> {
    let total_words = crate::text::word_count(content);
    let raw = phrases
        .iter()
        .map(|phrase| raw_density(phrase.occurrence_count, phrase.word_count(), total_words))
        .collect::<Vec<_>>();
    if !normalize {
        return raw;
    }
    let max = raw.iter().copied().fold(0.0_f64, f64::max);
    if max <= 0.0 {
        return raw;
    }
    raw.into_iter().map(|value| (value / max).clamp(0.0, 1.0)).collect()
}
