use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzeConfig {
    pub fetch: FetchConfig,
    pub crawl: CrawlConfig,
    pub extract: ExtractConfig,
    pub phrases: PhraseConfig,
    pub scoring: ScoringConfig,
    pub themes: ThemeConfig,
    pub ranking: RankingConfig,
    /// Overall budget for one analysis; work still in flight afterwards is abandoned.
    pub deadline_secs: Option<u64>,
}

impl AnalyzeConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("parse config: {}", path.display()))
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs.unwrap_or(120))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_redirects: 10,
            user_agent: concat!("interlinker/", env!("CARGO_PKG_VERSION")).to_owned(),
            retry: RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    pub enabled: bool,
    pub max_pages: usize,
    pub concurrency: usize,
    /// Delay before each request (politeness).
    pub delay_ms: u64,
    pub sitemap: SitemapConfig,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_pages: 50,
            concurrency: 4,
            delay_ms: 200,
            sitemap: SitemapConfig::default(),
        }
    }
}

/// Seeding the crawl frontier from the site's XML sitemaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SitemapConfig {
    pub enabled: bool,
    /// Sitemap or sitemap index to load. When unset, `robots.txt` and the
    /// usual locations on the site's origin are tried.
    pub url: Option<String>,
    /// Sitemap documents fetched, index children included.
    pub max_sources: usize,
    pub max_urls: usize,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            max_sources: 8,
            max_urls: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// Paragraphs shorter than this do not count as main content.
    pub min_paragraph_chars: usize,
    /// Characters of text kept on each side of a link anchor.
    pub link_context_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_paragraph_chars: 40,
            link_context_chars: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PhraseStrategy {
    Pos,
    Collocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhraseConfig {
    pub strategy: PhraseStrategy,
    /// Minimum length of the first and last word of a phrase.
    pub min_word_chars: usize,
    /// Collocation strategy: minimum n-gram frequency.
    pub min_frequency: usize,
    /// Collocation strategy: keep at most this many candidates.
    pub max_candidates: usize,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            strategy: PhraseStrategy::Pos,
            min_word_chars: 3,
            min_frequency: 2,
            max_candidates: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScorerEngine {
    Noop,
    Openai,
    Huggingface,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    pub engine: ScorerEngine,
    pub batch_size: usize,
    pub concurrency: usize,
    /// Sentences of content sent along with each batch.
    pub summary_sentences: usize,
    /// Per-call content size limit.
    pub max_content_chars: usize,
    /// Score each batch against every content chunk instead of the summary
    /// when the content exceeds `max_content_chars`.
    pub chunk_content: bool,
    pub max_chunks: usize,
    pub normalize_density: bool,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
    pub openai: OpenAiConfig,
    pub huggingface: HuggingFaceConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            engine: ScorerEngine::Noop,
            batch_size: 25,
            concurrency: 2,
            summary_sentences: 5,
            max_content_chars: 2000,
            chunk_content: false,
            max_chunks: 4,
            normalize_density: true,
            timeout_secs: 60,
            retry: RetryPolicy::default(),
            openai: OpenAiConfig::default(),
            huggingface: HuggingFaceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_owned()),
            model: "gpt-4o-mini".to_owned(),
            temperature: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HuggingFaceConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co/models".to_owned(),
            model: "facebook/bart-large-mnli".to_owned(),
        }
    }
}

/// Zero-shot classification of the page against a fixed label set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThemeConfig {
    /// Candidate labels; theme detection is skipped when empty.
    pub labels: Vec<String>,
    /// Labels must score above this to count as a page theme.
    pub min_score: f64,
    pub max_themes: usize,
    /// Relevance added per unit of theme affinity.
    pub weight: f64,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            min_score: 0.3,
            max_themes: 5,
            weight: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RankingConfig {
    pub exact_threshold: f64,
    pub broad_threshold: f64,
    pub related_threshold: f64,
    pub per_category_cap: usize,
    pub max_suggestions: usize,
    /// Characters of context kept on each side of a highlighted phrase.
    pub context_chars: usize,
    pub targets_per_phrase: usize,
    /// Phrases below `related_threshold` still become `theme` suggestions
    /// at this theme affinity.
    pub theme_min_affinity: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            exact_threshold: 0.8,
            broad_threshold: 0.6,
            related_threshold: 0.4,
            per_category_cap: 10,
            max_suggestions: 30,
            context_chars: 100,
            targets_per_phrase: 3,
            theme_min_affinity: 0.25,
        }
    }
}
