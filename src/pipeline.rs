use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::Instant;
use url::Url;

use crate::config::AnalyzeConfig;
use crate::crawl::{CrawlOutput, SiteCrawler};
use crate::error::{AnalyzeError, FetchError};
use crate::extract::ContentExtractor;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::formats::{AnalysisMetrics, AnalysisReport, PageContent};
use crate::phrases::PhraseCandidateGenerator;
use crate::rank::ScoredPhrase;
use crate::relevance::RelevanceScorer;
use crate::targets::{InMemoryPageStore, PageStore, TargetPage};
use crate::verify::Verification;

/// Runs extraction, phrase discovery, scoring and ranking for one page.
/// External collaborators are injected so tests can hold them fixed.
pub struct Analyzer {
    fetcher: Arc<dyn Fetcher>,
    scorer: Arc<dyn RelevanceScorer>,
    generator: Arc<dyn PhraseCandidateGenerator>,
    page_store: Option<Arc<dyn PageStore>>,
    extractor: Arc<ContentExtractor>,
    config: AnalyzeConfig,
}

struct PhraseStage {
    candidates: usize,
    verification: Verification,
    densities: Vec<f64>,
}

impl Analyzer {
    pub fn new(
        config: AnalyzeConfig,
        fetcher: Arc<dyn Fetcher>,
        scorer: Arc<dyn RelevanceScorer>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            fetcher,
            scorer,
            generator: crate::phrases::generator_for(&config.phrases),
            page_store: None,
            extractor: Arc::new(ContentExtractor::new(config.extract.clone())?),
            config,
        })
    }

    /// HTTP fetcher and the configured scoring engine.
    pub fn from_config(config: AnalyzeConfig) -> anyhow::Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        let scorer = crate::relevance::scorer_for(&config.scoring)?;
        Self::new(config, fetcher, scorer)
    }

    pub fn with_generator(mut self, generator: Arc<dyn PhraseCandidateGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Without a store, targets come from crawled pages (when crawling).
    pub fn with_page_store(mut self, store: Arc<dyn PageStore>) -> Self {
        self.page_store = Some(store);
        self
    }

    pub fn config(&self) -> &AnalyzeConfig {
        &self.config
    }

    pub async fn analyze(&self, url: &Url) -> Result<AnalysisReport, AnalyzeError> {
        let started = std::time::Instant::now();
        let deadline = Instant::now() + self.config.deadline();
        ensure_http(url)?;

        tracing::info!(url = %url, "fetch primary page");
        let fetch = crate::fetch::fetch_with_retry(&*self.fetcher, url, &self.config.fetch);
        let fetched = match tokio::time::timeout_at(deadline, fetch).await {
            Ok(result) => result.map_err(AnalyzeError::PrimaryFetch)?,
            Err(_) => {
                return Err(AnalyzeError::PrimaryFetch(FetchError::Timeout {
                    url: url.to_string(),
                }));
            }
        };

        let page = self.extractor.extract(&fetched.body, &fetched.url);
        self.finish(page, started, deadline).await
    }

    /// Analyzes `html` as if it had been fetched from `url`.
    pub async fn analyze_html(&self, url: &Url, html: &str) -> Result<AnalysisReport, AnalyzeError> {
        let started = std::time::Instant::now();
        let deadline = Instant::now() + self.config.deadline();
        ensure_http(url)?;

        let page = self.extractor.extract(html, url);
        self.finish(page, started, deadline).await
    }

    async fn finish(
        &self,
        page: PageContent,
        started: std::time::Instant,
        deadline: Instant,
    ) -> Result<AnalysisReport, AnalyzeError> {
        if page.is_empty() {
            return Err(AnalyzeError::EmptyContent { url: page.url });
        }

        let phrase_stage = {
            let generator = Arc::clone(&self.generator);
            let text = page.cleaned_text.clone();
            let normalize = self.config.scoring.normalize_density;
            tokio::task::spawn_blocking(move || {
                let candidates = generator.generate(&text);
                let verification = crate::verify::verify(&candidates, &text);
                let densities =
                    crate::density::densities(&verification.verified, &text, normalize);
                PhraseStage {
                    candidates: candidates.len(),
                    verification,
                    densities,
                }
            })
        };
        let (phrase_stage, crawl) = tokio::join!(phrase_stage, self.crawl(&page, deadline));

        let phrase_stage = phrase_stage.unwrap_or_else(|err| {
            tracing::warn!(?err, "phrase extraction task failed");
            PhraseStage {
                candidates: 0,
                verification: Verification::default(),
                densities: Vec::new(),
            }
        });
        tracing::info!(
            strategy = self.generator.name(),
            candidates = phrase_stage.candidates,
            verified = phrase_stage.verification.verified.len(),
            rejected = phrase_stage.verification.rejected,
            "phrases verified"
        );

        let texts = phrase_stage
            .verification
            .verified
            .iter()
            .map(|phrase| phrase.text.clone())
            .collect::<Vec<_>>();
        let (scoring, themes) = tokio::join!(
            crate::relevance::score_all(
                Arc::clone(&self.scorer),
                &page.cleaned_text,
                &texts,
                &self.config.scoring,
                deadline,
            ),
            crate::themes::detect_themes(
                Arc::clone(&self.scorer),
                &page.cleaned_text,
                &self.config.themes,
                &self.config.scoring,
                deadline,
            ),
        );

        let theme_weight = self.config.themes.weight.max(0.0);
        let scored = phrase_stage
            .verification
            .verified
            .iter()
            .zip(&phrase_stage.densities)
            .map(|(phrase, density)| {
                let relevance = scoring.scores.get(&phrase.text).copied().unwrap_or(0.0);
                let affinity = crate::themes::theme_affinity(&phrase.text, &themes.themes);
                ScoredPhrase::new(phrase.clone(), *density, relevance + theme_weight * affinity)
                    .with_theme_affinity(affinity)
            })
            .collect::<Vec<_>>();

        let targets = self.lookup_targets(&scored, &page, crawl.as_ref(), deadline).await;
        let suggestions = crate::rank::rank(&scored, &page, &targets, &self.config.ranking);

        let inbound_links = crawl
            .as_ref()
            .map(|crawl| crawl.report.inbound_links.clone())
            .unwrap_or_default();
        let metrics = AnalysisMetrics {
            word_count: crate::text::word_count(&page.cleaned_text),
            paragraph_count: page.paragraphs.len(),
            candidate_phrases: phrase_stage.candidates,
            verified_phrases: phrase_stage.verification.verified.len(),
            rejected_phrases: phrase_stage.verification.rejected,
            scoring_batches: scoring.batches,
            degraded_batches: scoring.degraded_batches,
            pages_crawled: crawl.as_ref().map(|c| c.report.visited.len()).unwrap_or(0),
            crawl_failures: crawl.as_ref().map(|c| c.report.failed.len()).unwrap_or(0),
            crawl_truncated: crawl.as_ref().is_some_and(|c| c.report.truncated),
            sitemap_urls: crawl.as_ref().map(|c| c.report.sitemap_urls).unwrap_or(0),
            inbound_links: inbound_links.len(),
            themes_degraded: themes.degraded,
            suggestions: suggestions.len(),
            elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        tracing::info!(
            url = %page.url,
            suggestions = metrics.suggestions,
            inbound_links = metrics.inbound_links,
            elapsed_ms = metrics.elapsed_ms,
            "analysis finished"
        );

        Ok(AnalysisReport {
            analyzed_at: chrono::Utc::now().to_rfc3339(),
            page,
            themes: themes.themes,
            suggestions,
            inbound_links,
            metrics,
        })
    }

    /// Sitemap seeding needs the crawl to fetch the pages it lists.
    async fn crawl(&self, page: &PageContent, deadline: Instant) -> Option<CrawlOutput> {
        if !(self.config.crawl.enabled || self.config.crawl.sitemap.enabled) {
            return None;
        }
        let start_url = Url::parse(&page.url).ok()?;
        let crawler = SiteCrawler::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.extractor),
            self.config.fetch.clone(),
            self.config.crawl.clone(),
        );
        match crawler.crawl(&start_url, Some(page.clone()), deadline).await {
            Ok(output) => Some(output),
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "crawl skipped");
                None
            }
        }
    }

    async fn lookup_targets(
        &self,
        scored: &[ScoredPhrase],
        page: &PageContent,
        crawl: Option<&CrawlOutput>,
        deadline: Instant,
    ) -> HashMap<String, Vec<TargetPage>> {
        let store: Arc<dyn PageStore> = match (&self.page_store, crawl) {
            (Some(store), _) => Arc::clone(store),
            (None, Some(crawl)) => {
                let own_url = crate::urls::canonical_str(&page.url);
                Arc::new(InMemoryPageStore::from_pages(crawl.pages.iter().filter(|other| {
                    crate::urls::canonical_str(&other.url) != own_url
                })))
            }
            (None, None) => return HashMap::new(),
        };

        // Room for targets the ranker will filter out (self and already-linked pages).
        let limit = self.config.ranking.targets_per_phrase.max(1) + page.internal_links.len() + 1;
        let mut targets = HashMap::new();
        for phrase in scored {
            if crate::rank::classify(phrase, &self.config.ranking).is_none() {
                continue;
            }
            let lookup = store.find_pages_containing(&phrase.phrase.text, limit);
            match tokio::time::timeout_at(deadline, lookup).await {
                Ok(Ok(pages)) => {
                    targets.insert(phrase.phrase.text.clone(), pages);
                }
                Ok(Err(err)) => {
                    tracing::warn!(phrase = %phrase.phrase.text, error = %format!("{err:#}"), "target lookup failed");
                }
                Err(_) => {
                    tracing::warn!("deadline reached during target lookup");
                    break;
                }
            }
        }
        targets
    }
}

fn ensure_http(url: &Url) -> Result<(), AnalyzeError> {
    if crate::urls::is_http(url) {
        Ok(())
    } else {
        Err(AnalyzeError::InvalidUrl {
            url: url.to_string(),
        })
    }
}
