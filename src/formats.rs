use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkEdge {
    pub source_url: String,
    pub target_url: String,
    pub anchor_text: String,
    /// Text around the anchor in its block, with the anchor in `[..]`.
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent {
    pub url: String,
    pub title: String,
    pub cleaned_text: String,
    pub paragraphs: Vec<String>,
    pub internal_links: Vec<LinkEdge>,
    pub external_links: Vec<LinkEdge>,
}

impl PageContent {
    pub fn is_empty(&self) -> bool {
        self.cleaned_text.trim().is_empty()
    }

    pub fn outbound_links(&self) -> impl Iterator<Item = &LinkEdge> {
        self.internal_links.iter().chain(self.external_links.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    Broad,
    Related,
    Theme,
    Keyword,
}

impl MatchType {
    pub fn priority(self) -> u8 {
        match self {
            Self::Exact => 5,
            Self::Broad => 4,
            Self::Related => 3,
            Self::Theme => 2,
            Self::Keyword => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Exact text of the first occurrence in the page content.
    pub suggested_anchor_text: String,
    pub context: String,
    pub match_type: MatchType,
    /// Combined score (density x relevance).
    pub relevance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_title: Option<String>,
}

/// A configured theme label the page content was classified under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedTheme {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetrics {
    pub word_count: usize,
    pub paragraph_count: usize,
    pub candidate_phrases: usize,
    pub verified_phrases: usize,
    pub rejected_phrases: usize,
    pub scoring_batches: usize,
    pub degraded_batches: usize,
    pub pages_crawled: usize,
    pub crawl_failures: usize,
    pub crawl_truncated: bool,
    #[serde(default)]
    pub sitemap_urls: usize,
    pub inbound_links: usize,
    /// Theme classification was attempted and fell back to no themes.
    #[serde(default)]
    pub themes_degraded: bool,
    pub suggestions: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub analyzed_at: String,
    pub page: PageContent,
    /// Best first; empty when no theme labels are configured.
    #[serde(default)]
    pub themes: Vec<DetectedTheme>,
    pub suggestions: Vec<Suggestion>,
    pub inbound_links: Vec<LinkEdge>,
    pub metrics: AnalysisMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    pub start_url: String,
    /// Every URL a fetch was dispatched for, in dispatch order.
    pub visited: Vec<String>,
    pub failed: Vec<String>,
    /// Internal outbound edges per successfully crawled page.
    pub link_graph: BTreeMap<String, Vec<LinkEdge>>,
    pub inbound_links: Vec<LinkEdge>,
    /// Stopped by the deadline with work still pending.
    pub truncated: bool,
    /// Sitemap documents that seeded the frontier.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sitemaps: Vec<String>,
    /// Pages queued from sitemaps that links had not already queued.
    #[serde(default)]
    pub sitemap_urls: usize,
}
