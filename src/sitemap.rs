use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use url::Url;

use crate::cli::SitemapArgs;
use crate::config::{AnalyzeConfig, FetchConfig, SitemapConfig};
use crate::error::SitemapError;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::urls::{canonical_url, is_crawlable_page, is_http, site_host};

/// Locations tried, in order, when neither the config nor `robots.txt`
/// names a sitemap.
const DEFAULT_LOCATIONS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/wp-sitemap.xml"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapEntry {
    pub loc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<urlset>`: page entries.
    UrlSet(Vec<SitemapEntry>),
    /// `<sitemapindex>`: locations of child sitemaps.
    Index(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    Lastmod,
}

/// Parses a sitemap protocol document. Namespace prefixes are ignored.
pub fn parse_sitemap(url: &str, xml: &str) -> Result<SitemapDocument, SitemapError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut is_index = None;
    let mut in_entry = false;
    let mut field = None;
    let mut text = String::new();
    let mut current = SitemapEntry {
        loc: String::new(),
        lastmod: None,
    };
    let mut entries = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"urlset" if is_index.is_none() => is_index = Some(false),
                b"sitemapindex" if is_index.is_none() => is_index = Some(true),
                b"url" | b"sitemap" => {
                    in_entry = true;
                    current = SitemapEntry {
                        loc: String::new(),
                        lastmod: None,
                    };
                }
                b"loc" if in_entry => {
                    field = Some(Field::Loc);
                    text.clear();
                }
                b"lastmod" if in_entry => {
                    field = Some(Field::Lastmod);
                    text.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if field.is_some() => {
                let unescaped = t.unescape().map_err(|err| SitemapError::Xml {
                    url: url.to_owned(),
                    message: err.to_string(),
                })?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(c)) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&c));
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"loc" if field == Some(Field::Loc) => {
                    current.loc = text.trim().to_owned();
                    field = None;
                }
                b"lastmod" if field == Some(Field::Lastmod) => {
                    let value = text.trim();
                    current.lastmod = (!value.is_empty()).then(|| value.to_owned());
                    field = None;
                }
                b"url" | b"sitemap" if in_entry => {
                    in_entry = false;
                    if !current.loc.is_empty() {
                        entries.push(current.clone());
                    }
                }
                _ => {}
            },
            Ok(_) => {}
            Err(err) => {
                return Err(SitemapError::Xml {
                    url: url.to_owned(),
                    message: err.to_string(),
                });
            }
        }
        buf.clear();
    }

    match is_index {
        Some(false) => Ok(SitemapDocument::UrlSet(entries)),
        Some(true) => Ok(SitemapDocument::Index(
            entries.into_iter().map(|entry| entry.loc).collect(),
        )),
        None => Err(SitemapError::NotSitemap {
            url: url.to_owned(),
        }),
    }
}

/// `Sitemap:` lines of a robots.txt, resolved against `base`.
pub fn robots_sitemaps(robots_txt: &str, base: &Url) -> Vec<Url> {
    robots_txt
        .lines()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once(':')?;
            if !key.trim().eq_ignore_ascii_case("sitemap") {
                return None;
            }
            let url = base.join(value.trim()).ok()?;
            is_http(&url).then_some(url)
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SitemapReport {
    pub site_url: String,
    /// Sitemap documents loaded, in load order.
    pub sources: Vec<String>,
    pub failed: Vec<String>,
    /// Crawlable same-site pages, deduplicated.
    pub entries: Vec<SitemapEntry>,
    /// Entries dropped as off-site, non-page, or duplicate.
    pub skipped: usize,
    /// Stopped early by `max_sources`, `max_urls` or the deadline.
    pub truncated: bool,
}

impl SitemapReport {
    pub fn urls(&self) -> Vec<Url> {
        self.entries
            .iter()
            .filter_map(|entry| Url::parse(&entry.loc).ok())
            .collect()
    }
}

/// Discovers and loads a site's sitemaps, following sitemap indexes.
pub struct SitemapLoader {
    fetcher: Arc<dyn Fetcher>,
    fetch_config: FetchConfig,
    config: SitemapConfig,
}

impl SitemapLoader {
    pub fn new(fetcher: Arc<dyn Fetcher>, fetch_config: FetchConfig, config: SitemapConfig) -> Self {
        Self {
            fetcher,
            fetch_config,
            config,
        }
    }

    /// Never fails: unreachable or malformed sitemaps end up in `failed`.
    pub async fn load(&self, site_url: &Url, deadline: Instant) -> SitemapReport {
        let mut report = SitemapReport {
            site_url: site_url.to_string(),
            ..SitemapReport::default()
        };
        let Some(host) = site_host(site_url) else {
            return report;
        };

        let (roots, mut probing) = self.roots(site_url, deadline).await;
        let mut queue = VecDeque::from(roots);
        let mut seen_sources = HashSet::new();
        let mut seen_pages = HashSet::new();

        while let Some(source) = queue.pop_front() {
            if !seen_sources.insert(canonical_url(&source).to_string()) {
                continue;
            }
            if report.sources.len() >= self.config.max_sources {
                report.truncated = true;
                break;
            }

            let load = crate::fetch::fetch_document_with_retry(
                &*self.fetcher,
                &source,
                &self.fetch_config,
            );
            let document = match tokio::time::timeout_at(deadline, load).await {
                Ok(Ok(fetched)) => parse_sitemap(source.as_str(), &fetched.body),
                Ok(Err(err)) => Err(SitemapError::Fetch(err)),
                Err(_) => {
                    tracing::warn!(url = %source, "deadline reached while loading sitemaps");
                    report.truncated = true;
                    break;
                }
            };

            let document = match document {
                Ok(document) => document,
                Err(err) if probing => {
                    tracing::debug!(url = %source, error = %format!("{err:#}"), "no sitemap here");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(url = %source, error = %format!("{err:#}"), "sitemap skipped");
                    report.failed.push(source.to_string());
                    continue;
                }
            };

            if probing {
                queue.clear();
                probing = false;
            }
            report.sources.push(source.to_string());

            match document {
                SitemapDocument::Index(children) => {
                    tracing::debug!(url = %source, children = children.len(), "sitemap index");
                    queue.extend(
                        children
                            .iter()
                            .filter_map(|child| source.join(child).ok())
                            .filter(is_http),
                    );
                }
                SitemapDocument::UrlSet(entries) => {
                    for entry in entries {
                        if report.entries.len() >= self.config.max_urls {
                            report.truncated = true;
                            break;
                        }
                        let keep = Url::parse(&entry.loc).ok().filter(|page| {
                            site_host(page).as_deref() == Some(host.as_str())
                                && is_crawlable_page(page)
                                && seen_pages.insert(canonical_url(page).to_string())
                        });
                        if keep.is_some() {
                            report.entries.push(entry);
                        } else {
                            report.skipped += 1;
                        }
                    }
                }
            }
        }

        tracing::info!(
            site = %site_url,
            sources = report.sources.len(),
            urls = report.entries.len(),
            skipped = report.skipped,
            failed = report.failed.len(),
            "sitemaps loaded"
        );
        report
    }

    /// Starting documents, and whether they are guesses to try one by one
    /// until the first that parses.
    async fn roots(&self, site_url: &Url, deadline: Instant) -> (Vec<Url>, bool) {
        if let Some(configured) = self.config.url.as_deref() {
            return match site_url.join(configured) {
                Ok(url) => (vec![url], false),
                Err(err) => {
                    tracing::warn!(url = configured, %err, "invalid sitemap url");
                    (Vec::new(), false)
                }
            };
        }
        if site_url.path().to_ascii_lowercase().ends_with(".xml") {
            return (vec![site_url.clone()], false);
        }

        let mut origin = site_url.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);

        if let Ok(robots_url) = origin.join("/robots.txt") {
            let fetch = crate::fetch::fetch_document_with_retry(
                &*self.fetcher,
                &robots_url,
                &self.fetch_config,
            );
            match tokio::time::timeout_at(deadline, fetch).await {
                Ok(Ok(robots)) => {
                    let listed = robots_sitemaps(&robots.body, &origin);
                    if !listed.is_empty() {
                        return (listed, false);
                    }
                }
                Ok(Err(err)) => tracing::debug!(error = %err, "robots.txt unavailable"),
                Err(_) => return (Vec::new(), false),
            }
        }

        let guesses = DEFAULT_LOCATIONS
            .iter()
            .filter_map(|path| origin.join(path).ok())
            .collect();
        (guesses, true)
    }
}

pub async fn run(args: SitemapArgs) -> anyhow::Result<()> {
    let mut config = AnalyzeConfig::load(args.config.as_deref().map(Path::new))?;
    if let Some(sitemap_url) = args.sitemap_url {
        config.crawl.sitemap.url = Some(sitemap_url);
    }

    let site_url = Url::parse(&args.url).context("parse --url")?;
    if !is_http(&site_url) {
        anyhow::bail!("--url must be http/https: {site_url}");
    }

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);
    let loader = SitemapLoader::new(fetcher, config.fetch.clone(), config.crawl.sitemap.clone());
    let report = loader.load(&site_url, Instant::now() + config.deadline()).await;
    if report.sources.is_empty() {
        anyhow::bail!("no sitemap found for {site_url}");
    }

    crate::output::write_json(args.out.as_deref(), &report, args.force)
}
