use std::fs::OpenOptions;
use std::io::{BufRead as _, BufReader};
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::formats::PageContent;
use crate::verify::PhraseMatcher;

/// A page that may receive a suggested link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPage {
    pub url: String,
    pub title: String,
    pub content: String,
}

/// Text-match lookup over known pages.
#[async_trait::async_trait]
pub trait PageStore: Send + Sync {
    /// Pages mentioning `phrase`, best match first.
    async fn find_pages_containing(
        &self,
        phrase: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<TargetPage>>;
}

/// 0.5 when the phrase is in the title, plus 0.1 per content occurrence up to 0.5.
pub fn target_relevance(in_title: bool, frequency: usize) -> f64 {
    let title = if in_title { 0.5 } else { 0.0 };
    title + (0.1 * frequency as f64).min(0.5)
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPageStore {
    pages: Vec<TargetPage>,
}

impl InMemoryPageStore {
    /// Keeps only http(s) URLs that look like web pages.
    pub fn new(pages: Vec<TargetPage>) -> Self {
        let pages = pages
            .into_iter()
            .filter(|page| {
                Url::parse(&page.url)
                    .map(|url| crate::urls::is_crawlable_page(&url))
                    .unwrap_or(false)
            })
            .collect();
        Self { pages }
    }

    pub fn from_pages<'a>(pages: impl IntoIterator<Item = &'a PageContent>) -> Self {
        Self::new(
            pages
                .into_iter()
                .map(|page| TargetPage {
                    url: page.url.clone(),
                    title: page.title.clone(),
                    content: page.cleaned_text.clone(),
                })
                .collect(),
        )
    }

    /// One `{url, title, content}` JSON object per line.
    pub fn from_jsonl(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .with_context(|| format!("open pages jsonl: {}", path.display()))?;
        let mut pages = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.context("read pages jsonl line")?;
            if line.trim().is_empty() {
                continue;
            }
            let page: TargetPage = serde_json::from_str(&line)
                .with_context(|| format!("parse page record at line {}", idx + 1))?;
            pages.push(page);
        }
        Ok(Self::new(pages))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[async_trait::async_trait]
impl PageStore for InMemoryPageStore {
    async fn find_pages_containing(
        &self,
        phrase: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<TargetPage>> {
        let matcher = PhraseMatcher::new(phrase)
            .with_context(|| format!("build matcher for phrase: {phrase}"))?;

        let mut matches = self
            .pages
            .iter()
            .filter_map(|page| {
                let in_title = matcher.is_match(&page.title);
                let frequency = matcher.count(&page.content);
                (in_title || frequency > 0)
                    .then(|| (target_relevance(in_title, frequency), page))
            })
            .collect::<Vec<_>>();

        matches.sort_by(|(a_score, a), (b_score, b)| {
            b_score.total_cmp(a_score).then_with(|| a.url.cmp(&b.url))
        });

        Ok(matches
            .into_iter()
            .take(limit)
            .map(|(_, page)| page.clone())
            .collect())
    }
}
