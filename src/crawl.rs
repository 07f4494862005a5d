use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::task::JoinSet;
use tokio::time::Instant;
use url::Url;

use crate::cli::CrawlArgs;
use crate::config::{AnalyzeConfig, CrawlConfig, FetchConfig};
use crate::error::FetchError;
use crate::extract::ContentExtractor;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::formats::{CrawlReport, LinkEdge, PageContent};
use crate::sitemap::SitemapLoader;
use crate::urls::{canonical_str, canonical_url, is_crawlable_page, normalize_crawl_url, site_host};

#[derive(Debug, Clone)]
struct CrawlScope {
    host: String,
}

impl CrawlScope {
    fn new(start_url: &Url) -> anyhow::Result<Self> {
        let host = site_host(start_url)
            .ok_or_else(|| anyhow::anyhow!("start url must have host: {start_url}"))?;
        Ok(Self { host })
    }

    fn is_same_site(&self, url: &Url) -> bool {
        site_host(url).as_deref() == Some(self.host.as_str())
    }

    fn is_in_scope(&self, url: &Url) -> bool {
        self.is_same_site(url) && is_crawlable_page(url)
    }
}

/// Breadth-first frontier bounded by `max_pages` dispatched fetches.
#[derive(Debug)]
struct CrawlState {
    visited: Vec<String>,
    queued: HashSet<String>,
    landed: HashSet<String>,
    frontier: VecDeque<Url>,
    max_pages: usize,
}

impl CrawlState {
    fn new(max_pages: usize) -> Self {
        Self {
            visited: Vec::new(),
            queued: HashSet::new(),
            landed: HashSet::new(),
            frontier: VecDeque::new(),
            max_pages,
        }
    }

    fn enqueue(&mut self, url: &Url) -> bool {
        let normalized = normalize_crawl_url(url);
        if !self.queued.insert(canonical_url(&normalized).to_string()) {
            return false;
        }
        self.frontier.push_back(normalized);
        true
    }

    /// Marks a fetch that happened outside the frontier (the seed page).
    fn mark_visited(&mut self, url: &Url) {
        self.mark_landed(url);
        self.visited.push(normalize_crawl_url(url).to_string());
    }

    /// Records where a fetch ended up after redirects. Returns false when an
    /// earlier fetch already landed on the same page.
    fn mark_landed(&mut self, url: &Url) -> bool {
        let key = canonical_url(url).to_string();
        self.queued.insert(key.clone());
        self.landed.insert(key)
    }

    fn next_dispatch(&mut self) -> Option<Url> {
        if self.visited.len() >= self.max_pages {
            return None;
        }
        let url = self.frontier.pop_front()?;
        self.visited.push(url.to_string());
        Some(url)
    }

    fn has_pending(&self) -> bool {
        !self.frontier.is_empty() && self.visited.len() < self.max_pages
    }
}

#[derive(Debug, Clone, Default)]
pub struct CrawlOutput {
    pub report: CrawlReport,
    /// Pages fetched by the crawl itself; the seed page is not repeated here.
    pub pages: Vec<PageContent>,
}

pub struct SiteCrawler {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<ContentExtractor>,
    fetch_config: FetchConfig,
    config: CrawlConfig,
}

impl SiteCrawler {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<ContentExtractor>,
        fetch_config: FetchConfig,
        config: CrawlConfig,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            fetch_config,
            config,
        }
    }

    /// Crawls the start URL's site. `seed` is the already-extracted start page,
    /// if the caller has it; it counts as one visited page.
    pub async fn crawl(
        &self,
        start_url: &Url,
        seed: Option<PageContent>,
        deadline: Instant,
    ) -> anyhow::Result<CrawlOutput> {
        let scope = CrawlScope::new(start_url).context("build crawl scope")?;
        let mut state = CrawlState::new(self.config.max_pages);
        let mut report = CrawlReport {
            start_url: start_url.to_string(),
            ..CrawlReport::default()
        };
        let mut pages = Vec::new();

        match seed {
            Some(seed) if self.config.max_pages > 0 => {
                state.mark_visited(start_url);
                enqueue_links(&mut state, &scope, &seed);
                record_edges(&mut report, &scope, &seed);
            }
            _ => {
                state.enqueue(start_url);
            }
        }

        if self.config.sitemap.enabled {
            let loader = SitemapLoader::new(
                Arc::clone(&self.fetcher),
                self.fetch_config.clone(),
                self.config.sitemap.clone(),
            );
            let sitemap = loader.load(start_url, deadline).await;
            report.sitemap_urls = sitemap
                .urls()
                .iter()
                .filter(|url| scope.is_in_scope(url) && state.enqueue(url))
                .count();
            report.sitemaps = sitemap.sources;
        }

        let concurrency = self.config.concurrency.max(1);
        let delay = Duration::from_millis(self.config.delay_ms);
        let mut tasks: JoinSet<(Url, Result<PageContent, FetchError>)> = JoinSet::new();

        loop {
            while tasks.len() < concurrency {
                let Some(url) = state.next_dispatch() else {
                    break;
                };
                let fetcher = Arc::clone(&self.fetcher);
                let extractor = Arc::clone(&self.extractor);
                let fetch_config = self.fetch_config.clone();
                tasks.spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let result = crate::fetch::fetch_with_retry(&*fetcher, &url, &fetch_config)
                        .await
                        .map(|fetched| extractor.extract(&fetched.body, &fetched.url));
                    (url, result)
                });
            }

            if tasks.is_empty() {
                break;
            }

            let joined = match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        in_flight = tasks.len(),
                        queued = state.frontier.len(),
                        "crawl deadline reached; abandoning remaining pages"
                    );
                    tasks.abort_all();
                    report.truncated = true;
                    break;
                }
            };

            let (url, result) = match joined {
                Ok(done) => done,
                Err(err) => {
                    tracing::warn!(?err, "crawl task failed");
                    continue;
                }
            };

            match result {
                Ok(page) => {
                    let landed = Url::parse(&page.url).ok();
                    let Some(landed) = landed.filter(|landed| scope.is_same_site(landed)) else {
                        tracing::warn!(url = %url, landed = %page.url, "redirected off site; page skipped");
                        continue;
                    };
                    if !state.mark_landed(&landed) {
                        tracing::debug!(url = %url, landed = %landed, "already crawled under another url");
                        continue;
                    }
                    tracing::debug!(url = %url, links = page.internal_links.len(), "crawled page");
                    enqueue_links(&mut state, &scope, &page);
                    record_edges(&mut report, &scope, &page);
                    pages.push(page);
                }
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "crawl fetch failed");
                    report.failed.push(url.to_string());
                }
            }
        }

        if !report.truncated && state.has_pending() && Instant::now() >= deadline {
            report.truncated = true;
        }

        report.visited = state.visited;
        report.inbound_links = inbound_links(&report.link_graph, start_url.as_str());

        tracing::info!(
            start_url = %start_url,
            visited = report.visited.len(),
            failed = report.failed.len(),
            inbound = report.inbound_links.len(),
            sitemap_urls = report.sitemap_urls,
            truncated = report.truncated,
            "crawl finished"
        );

        Ok(CrawlOutput { report, pages })
    }
}

fn enqueue_links(state: &mut CrawlState, scope: &CrawlScope, page: &PageContent) {
    for edge in &page.internal_links {
        let Ok(target) = Url::parse(&edge.target_url) else {
            continue;
        };
        if scope.is_in_scope(&target) {
            state.enqueue(&target);
        }
    }
}

fn record_edges(report: &mut CrawlReport, scope: &CrawlScope, page: &PageContent) {
    let edges = page
        .internal_links
        .iter()
        .filter(|edge| {
            Url::parse(&edge.target_url)
                .map(|target| scope.is_same_site(&target))
                .unwrap_or(false)
        })
        .cloned()
        .collect::<Vec<_>>();
    let key = canonical_str(&page.url).unwrap_or_else(|| page.url.clone());
    report.link_graph.entry(key).or_default().extend(edges);
}

/// Edges from other pages whose target is `target_url`, compared canonically.
pub fn inbound_links(graph: &BTreeMap<String, Vec<LinkEdge>>, target_url: &str) -> Vec<LinkEdge> {
    let Some(target) = canonical_str(target_url) else {
        return Vec::new();
    };
    graph
        .values()
        .flatten()
        .filter(|edge| {
            canonical_str(&edge.target_url).as_deref() == Some(target.as_str())
                && canonical_str(&edge.source_url).as_deref() != Some(target.as_str())
        })
        .cloned()
        .collect()
}

pub async fn run(args: CrawlArgs) -> anyhow::Result<()> {
    let mut config = AnalyzeConfig::load(args.config.as_deref().map(Path::new))?;
    if let Some(max_pages) = args.max_pages {
        config.crawl.max_pages = max_pages;
    }
    if let Some(concurrency) = args.concurrency {
        config.crawl.concurrency = concurrency;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.crawl.delay_ms = delay_ms;
    }
    if args.sitemap {
        config.crawl.sitemap.enabled = true;
    }
    if let Some(sitemap_url) = args.sitemap_url {
        config.crawl.sitemap.enabled = true;
        config.crawl.sitemap.url = Some(sitemap_url);
    }

    let start_url = Url::parse(&args.url).context("parse --url")?;
    if !crate::urls::is_http(&start_url) {
        anyhow::bail!("--url must be http/https: {start_url}");
    }

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);
    let extractor = Arc::new(ContentExtractor::new(config.extract.clone())?);
    let crawler = SiteCrawler::new(fetcher, extractor, config.fetch.clone(), config.crawl.clone());

    let deadline = Instant::now() + config.deadline();
    let output = crawler.crawl(&start_url, None, deadline).await?;

    crate::output::write_json(args.out.as_deref(), &output.report, args.force)
}
