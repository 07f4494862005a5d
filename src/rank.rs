use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::config::RankingConfig;
use crate::formats::{MatchType, PageContent, Suggestion};
use crate::targets::TargetPage;
use crate::text::collapse_whitespace;
use crate::urls::canonical_str;
use crate::verify::VerifiedPhrase;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPhrase {
    pub phrase: VerifiedPhrase,
    pub density: f64,
    pub relevance: f64,
    pub combined_score: f64,
    /// Overlap with the page's detected themes, in `[0, 1]`.
    pub theme_affinity: f64,
}

impl ScoredPhrase {
    /// Clamps both inputs to `[0, 1]`, so the product is in range too.
    pub fn new(phrase: VerifiedPhrase, density: f64, relevance: f64) -> Self {
        let clamp = |value: f64| {
            if value.is_finite() {
                value.clamp(0.0, 1.0)
            } else {
                0.0
            }
        };
        let (density, relevance) = (clamp(density), clamp(relevance));
        Self {
            phrase,
            density,
            relevance,
            combined_score: density * relevance,
            theme_affinity: 0.0,
        }
    }

    pub fn with_theme_affinity(mut self, affinity: f64) -> Self {
        self.theme_affinity = if affinity.is_finite() {
            affinity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }
}

pub fn match_type_for(score: f64, config: &RankingConfig) -> Option<MatchType> {
    if score >= config.exact_threshold {
        Some(MatchType::Exact)
    } else if score >= config.broad_threshold {
        Some(MatchType::Broad)
    } else if score >= config.related_threshold {
        Some(MatchType::Related)
    } else {
        None
    }
}

/// Category for a scored phrase. Phrases below the related threshold are
/// still `theme` suggestions when they overlap the page's themes enough.
pub fn classify(scored: &ScoredPhrase, config: &RankingConfig) -> Option<MatchType> {
    match_type_for(scored.combined_score, config).or_else(|| {
        (scored.theme_affinity > 0.0
            && scored.theme_affinity >= config.theme_min_affinity
            && scored.combined_score > 0.0)
            .then_some(MatchType::Theme)
    })
}

fn anchor_key(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

fn compare(a: &Suggestion, b: &Suggestion) -> Ordering {
    b.relevance_score
        .total_cmp(&a.relevance_score)
        .then_with(|| b.match_type.priority().cmp(&a.match_type.priority()))
        .then_with(|| {
            a.suggested_anchor_text
                .chars()
                .count()
                .cmp(&b.suggested_anchor_text.chars().count())
        })
        .then_with(|| a.target_url.cmp(&b.target_url))
        .then_with(|| a.suggested_anchor_text.cmp(&b.suggested_anchor_text))
}

/// Builds the final suggestion list for `page`.
///
/// `targets` maps phrase text to candidate target pages, best first. Phrases
/// [`classify`] rejects, phrases already used as anchors on the page, and
/// phrases without a context are dropped. The analyzed page and pages it
/// already links to are never targets.
pub fn rank(
    scored: &[ScoredPhrase],
    page: &PageContent,
    targets: &HashMap<String, Vec<TargetPage>>,
    config: &RankingConfig,
) -> Vec<Suggestion> {
    let existing_anchors = page
        .outbound_links()
        .map(|edge| anchor_key(&edge.anchor_text))
        .filter(|anchor| !anchor.is_empty())
        .collect::<HashSet<_>>();

    let mut excluded_targets = page
        .outbound_links()
        .filter_map(|edge| canonical_str(&edge.target_url))
        .collect::<HashSet<_>>();
    excluded_targets.extend(canonical_str(&page.url));

    let mut candidates = Vec::new();
    for scored in scored {
        let Some(match_type) = classify(scored, config) else {
            continue;
        };
        let anchor = &scored.phrase.surface;
        if existing_anchors.contains(&anchor_key(anchor)) {
            tracing::debug!(anchor = %anchor, "phrase already used as an anchor; skipped");
            continue;
        }
        let context =
            crate::context::extract_context(&scored.phrase.text, &page.cleaned_text, config.context_chars);
        if context.is_empty() {
            continue;
        }

        let suggestion = |target: Option<&TargetPage>| Suggestion {
            suggested_anchor_text: anchor.clone(),
            context: context.clone(),
            match_type,
            relevance_score: scored.combined_score,
            source_url: Some(page.url.clone()),
            target_url: target.map(|t| t.url.clone()),
            target_title: target.map(|t| t.title.clone()),
        };

        let phrase_targets = targets
            .get(&scored.phrase.text)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter(|target| {
                canonical_str(&target.url)
                    .map(|url| !excluded_targets.contains(&url))
                    .unwrap_or(false)
            })
            .take(config.targets_per_phrase.max(1))
            .collect::<Vec<_>>();

        if phrase_targets.is_empty() {
            candidates.push(suggestion(None));
        } else {
            candidates.extend(phrase_targets.into_iter().map(|t| suggestion(Some(t))));
        }
    }

    candidates.sort_by(compare);

    let mut seen = HashSet::new();
    let mut per_category: HashMap<MatchType, usize> = HashMap::new();
    let mut out = Vec::new();
    for suggestion in candidates {
        let key = (
            anchor_key(&suggestion.suggested_anchor_text),
            suggestion
                .target_url
                .as_deref()
                .and_then(canonical_str)
                .or_else(|| suggestion.target_url.clone()),
        );
        if !seen.insert(key) {
            continue;
        }
        let count = per_category.entry(suggestion.match_type).or_default();
        if *count >= config.per_category_cap {
            continue;
        }
        *count += 1;
        out.push(suggestion);
        if out.len() >= config.max_suggestions {
            break;
        }
    }
    out
}
