use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Instant;

use crate::config::{ScoringConfig, ThemeConfig};
use crate::formats::DetectedTheme;
use crate::relevance::RelevanceScorer;
use crate::retry::Outcome;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemeOutcome {
    pub themes: Vec<DetectedTheme>,
    pub degraded: bool,
}

/// Classifies the page summary against the configured labels, keeping those
/// scoring above `min_score`, best first. A failed or late classification
/// yields no themes.
pub async fn detect_themes(
    scorer: Arc<dyn RelevanceScorer>,
    content: &str,
    config: &ThemeConfig,
    scoring: &ScoringConfig,
    deadline: Instant,
) -> ThemeOutcome {
    let labels = config
        .labels
        .iter()
        .map(|label| crate::text::collapse_whitespace(label))
        .filter(|label| !label.is_empty())
        .collect::<Vec<_>>();
    if labels.is_empty() {
        return ThemeOutcome::default();
    }

    let summary = crate::relevance::content_summary(
        content,
        scoring.summary_sentences,
        scoring.max_content_chars,
    );
    let label = format!("{} themes", scorer.name());
    let attempt = scoring.retry.run_or_degrade(&label, HashMap::new(), |_| {
        scorer.classify_themes(&summary, &labels)
    });
    let result = match tokio::time::timeout_at(deadline, attempt).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("theme deadline reached; continuing without themes");
            Outcome::Degraded {
                value: HashMap::new(),
                error: "deadline exceeded".to_owned(),
            }
        }
    };
    let degraded = result.is_degraded();

    let by_key = labels
        .iter()
        .map(|label| (label.to_lowercase(), label))
        .collect::<HashMap<_, _>>();
    let mut themes = result
        .into_value()
        .into_iter()
        .filter_map(|(key, score)| {
            let label = by_key.get(&crate::text::collapse_whitespace(&key).to_lowercase())?;
            (score.is_finite() && score > config.min_score).then(|| DetectedTheme {
                label: (*label).clone(),
                score: score.min(1.0),
            })
        })
        .collect::<Vec<_>>();
    themes.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.label.cmp(&b.label))
    });
    themes.truncate(config.max_themes);

    tracing::info!(
        labels = labels.len(),
        themes = ?themes.iter().map(|t| t.label.as_str()).collect::<Vec<_>>(),
        degraded,
        "themes detected"
    );
    ThemeOutcome { themes, degraded }
}

/// Word overlap between `phrase` and the detected themes, in `[0, 1]`.
///
/// An exact label match counts two; otherwise each phrase word that contains,
/// or is contained in, some word of a theme counts one. The total is divided
/// by twice the number of themes. Words under three characters are ignored.
pub fn theme_affinity(phrase: &str, themes: &[DetectedTheme]) -> f64 {
    if themes.is_empty() {
        return 0.0;
    }
    let phrase = phrase.to_lowercase();
    let phrase_words = phrase
        .split_whitespace()
        .filter(|word| word.chars().count() >= 3)
        .collect::<Vec<_>>();

    let mut matches = 0usize;
    for theme in themes {
        let label = theme.label.to_lowercase();
        if crate::text::collapse_whitespace(&label) == crate::text::collapse_whitespace(&phrase) {
            matches += 2;
            continue;
        }
        let theme_words = label
            .split_whitespace()
            .filter(|word| word.chars().count() >= 3)
            .collect::<Vec<_>>();
        matches += phrase_words
            .iter()
            .filter(|word| {
                theme_words
                    .iter()
                    .any(|theme_word| theme_word.contains(*word) || word.contains(theme_word))
            })
            .count();
    }

    (matches as f64 / (themes.len() * 2) as f64).min(1.0)
}
