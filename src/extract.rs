use std::collections::HashSet;
use std::path::Path;

use anyhow::Context as _;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::cli::ExtractArgs;
use crate::config::{AnalyzeConfig, ExtractConfig};
use crate::fetch::HttpFetcher;
use crate::formats::{LinkEdge, PageContent};
use crate::text::{clean_text, collapse_whitespace, head_chars, tail_chars};

const BOILERPLATE: &str = "script, style, noscript, template, iframe, svg, canvas, form, button, \
     select, nav, header, footer, aside, pre, code, \
     [role=navigation], [role=banner], [role=contentinfo], [role=complementary], \
     [aria-hidden=true], .nav, .navbar, .menu, .sidebar, .breadcrumb, .breadcrumbs, \
     .cookie-banner, .advertisement, .ads, .share, .social, .comments";

/// Tried in order; the first one holding substantial paragraphs wins.
const MAIN_CONTENT: &[&str] = &[
    "article",
    "main",
    "[role=main]",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".post-body",
    ".content",
    "#content",
];

const PARAGRAPH_TAGS: &[&str] = &[
    "p",
    "li",
    "blockquote",
    "dd",
    "figcaption",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
];

const CONTEXT_BLOCK_TAGS: &[&str] = &[
    "p",
    "li",
    "blockquote",
    "dd",
    "dt",
    "td",
    "th",
    "figcaption",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "div",
    "section",
    "article",
    "main",
    "nav",
    "header",
    "footer",
    "aside",
    "body",
];

struct Selectors {
    boilerplate: Selector,
    main_content: Vec<Selector>,
    body: Selector,
    title: Selector,
    og_title: Selector,
    h1: Selector,
    anchors: Selector,
}

fn parse_selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("parse css selector `{css}`: {err}"))
}

impl Selectors {
    fn new() -> anyhow::Result<Self> {
        Ok(Self {
            boilerplate: parse_selector(BOILERPLATE)?,
            main_content: MAIN_CONTENT
                .iter()
                .map(|css| parse_selector(css))
                .collect::<anyhow::Result<Vec<_>>>()?,
            body: parse_selector("body")?,
            title: parse_selector("title")?,
            og_title: parse_selector("meta[property='og:title']")?,
            h1: parse_selector("h1")?,
            anchors: parse_selector("a[href]")?,
        })
    }
}

/// Turns raw HTML into a [`PageContent`]: title, main-content paragraphs,
/// and outbound links split by registered domain.
pub struct ContentExtractor {
    selectors: Selectors,
    config: ExtractConfig,
}

impl ContentExtractor {
    pub fn new(config: ExtractConfig) -> anyhow::Result<Self> {
        Ok(Self {
            selectors: Selectors::new()?,
            config,
        })
    }

    pub fn extract(&self, html: &str, url: &Url) -> PageContent {
        let mut doc = Html::parse_document(html);

        let title = self.title(&doc).unwrap_or_else(|| url.to_string());
        // Links come from the whole document, navigation included.
        let (internal_links, external_links) = self.links(&doc, url);

        self.strip_boilerplate(&mut doc);
        let paragraphs = self.paragraphs(&doc);
        let cleaned_text = paragraphs.join("\n");

        tracing::debug!(
            url = %url,
            paragraphs = paragraphs.len(),
            internal_links = internal_links.len(),
            external_links = external_links.len(),
            "extracted page"
        );

        PageContent {
            url: url.to_string(),
            title,
            cleaned_text,
            paragraphs,
            internal_links,
            external_links,
        }
    }

    fn title(&self, doc: &Html) -> Option<String> {
        let from_title = doc
            .select(&self.selectors.title)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()));
        let from_og = doc
            .select(&self.selectors.og_title)
            .next()
            .and_then(|el| el.value().attr("content"))
            .map(collapse_whitespace);
        let from_h1 = doc
            .select(&self.selectors.h1)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()));

        [from_title, from_og, from_h1]
            .into_iter()
            .flatten()
            .find(|title| !title.is_empty())
    }

    fn strip_boilerplate(&self, doc: &mut Html) {
        let ids = doc
            .select(&self.selectors.boilerplate)
            .map(|el| el.id())
            .collect::<Vec<_>>();
        for id in ids {
            if let Some(mut node) = doc.tree.get_mut(id) {
                node.detach();
            }
        }
    }

    fn paragraphs(&self, doc: &Html) -> Vec<String> {
        let min_chars = self.config.min_paragraph_chars;

        for selector in &self.selectors.main_content {
            let paragraphs = collect_paragraphs(doc.select(selector), min_chars);
            if !paragraphs.is_empty() {
                return paragraphs;
            }
        }

        let root = doc
            .select(&self.selectors.body)
            .next()
            .unwrap_or_else(|| doc.root_element());

        let paragraphs = collect_paragraphs([root], min_chars);
        if !paragraphs.is_empty() {
            return paragraphs;
        }

        // Short pages: any paragraph-level text at all.
        let paragraphs = collect_paragraphs([root], 1);
        if !paragraphs.is_empty() {
            return paragraphs;
        }

        let text = clean_text(&root.text().collect::<String>());
        if text.is_empty() {
            Vec::new()
        } else {
            vec![text]
        }
    }

    fn links(&self, doc: &Html, base: &Url) -> (Vec<LinkEdge>, Vec<LinkEdge>) {
        let mut internal = Vec::new();
        let mut external = Vec::new();
        let mut seen = HashSet::new();

        for anchor in doc.select(&self.selectors.anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(target) = crate::urls::resolve_href(base, href) else {
                continue;
            };
            let anchor_text = clean_text(&anchor.text().collect::<String>());
            if !seen.insert((target.to_string(), anchor_text.to_lowercase())) {
                continue;
            }

            let edge = LinkEdge {
                source_url: base.to_string(),
                target_url: target.to_string(),
                context: link_context(anchor, &anchor_text, self.config.link_context_chars),
                anchor_text,
            };
            if crate::urls::same_registered_domain(base, &target) {
                internal.push(edge);
            } else {
                external.push(edge);
            }
        }

        (internal, external)
    }
}

fn is_paragraph(el: &ElementRef<'_>) -> bool {
    PARAGRAPH_TAGS.contains(&el.value().name())
}

/// Leaf paragraph-level elements under `containers`, in document order.
fn collect_paragraphs<'a>(
    containers: impl IntoIterator<Item = ElementRef<'a>>,
    min_chars: usize,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for container in containers {
        for el in container.descendants().filter_map(ElementRef::wrap) {
            if !is_paragraph(&el) || seen.contains(&el.id()) {
                continue;
            }
            let has_nested = el
                .descendants()
                .skip(1)
                .filter_map(ElementRef::wrap)
                .any(|child| is_paragraph(&child));
            if has_nested {
                continue;
            }
            let text = clean_text(&el.text().collect::<String>());
            if text.chars().count() >= min_chars.max(1) {
                seen.insert(el.id());
                out.push(text);
            }
        }
    }
    out
}

/// `before [anchor] after`, from the text of the anchor's nearest block.
fn link_context(anchor: ElementRef<'_>, anchor_text: &str, chars: usize) -> String {
    let Some(block) = anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| CONTEXT_BLOCK_TAGS.contains(&el.value().name()))
    else {
        return format!("[{anchor_text}]");
    };

    let mut before = String::new();
    let mut after = String::new();
    let mut passed = false;
    for node in block.descendants() {
        if node.id() == anchor.id() {
            passed = true;
            continue;
        }
        let Node::Text(text) = node.value() else {
            continue;
        };
        if node.ancestors().any(|ancestor| ancestor.id() == anchor.id()) {
            continue;
        }
        if passed {
            after.push_str(text);
        } else {
            before.push_str(text);
        }
    }

    let before = clean_text(&before);
    let after = clean_text(&after);
    let mut context = String::new();
    let before = tail_chars(&before, chars).trim();
    if !before.is_empty() {
        context.push_str(before);
        context.push(' ');
    }
    context.push('[');
    context.push_str(anchor_text);
    context.push(']');
    let after = head_chars(&after, chars).trim();
    if !after.is_empty() {
        context.push(' ');
        context.push_str(after);
    }
    context
}

pub async fn run(args: ExtractArgs) -> anyhow::Result<()> {
    let config = AnalyzeConfig::load(args.config.as_deref().map(Path::new))?;
    let url = Url::parse(&args.url).context("parse --url")?;
    let extractor = ContentExtractor::new(config.extract.clone())?;

    let page = match args.html.as_deref() {
        Some(path) => {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("read html file: {path}"))?;
            extractor.extract(&html, &url)
        }
        None => {
            let fetcher = HttpFetcher::new(&config.fetch)?;
            let fetched = crate::fetch::fetch_with_retry(&fetcher, &url, &config.fetch)
                .await
                .with_context(|| format!("fetch {url}"))?;
            extractor.extract(&fetched.body, &fetched.url)
        }
    };

    if page.is_empty() {
        tracing::warn!(url = %page.url, "no readable content found");
    }
    tracing::info!(
        url = %page.url,
        paragraphs = page.paragraphs.len(),
        internal_links = page.internal_links.len(),
        "extract"
    );

    crate::output::write_json(args.out.as_deref(), &page, args.force)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(ExtractConfig::default()).expect("selectors")
    }

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("test url")
    }

    const ARTICLE_PAGE: &str = r#"<!doctype html>
<html><head><title>Vintage Cameras | Shop</title><script>var x = "camera";</script></head>
<body>
  <header><nav><a href="/">Home</a> <a href="/about">About us</a></nav></header>
  <article>
    <h1>Vintage cameras</h1>
    <p>Our vintage camera collection includes rangefinders and medium format bodies.</p>
    <p>Read the <a href="/guides/film">film photography guide</a> before buying your first roll of film.</p>
    <p>Short.</p>
  </article>
  <aside><p>Sidebar text that is long enough to count as a paragraph if it were kept.</p></aside>
  <footer><a href="https://twitter.example.org/shop">Follow</a></footer>
</body></html>"#;

    #[test]
    fn extracts_main_content_paragraphs() {
        let page = extractor().extract(ARTICLE_PAGE, &url("https://shop.example.com/cameras"));
        assert_eq!(page.title, "Vintage Cameras | Shop");
        assert_eq!(
            page.paragraphs,
            vec![
                "Our vintage camera collection includes rangefinders and medium format bodies."
                    .to_owned(),
                "Read the film photography guide before buying your first roll of film."
                    .to_owned(),
            ]
        );
        assert_eq!(page.cleaned_text, page.paragraphs.join("\n"));
        assert!(!page.cleaned_text.contains("Sidebar"));
        assert!(!page.cleaned_text.contains("var x"));
    }

    #[test]
    fn splits_links_by_registered_domain_with_context() {
        let page = extractor().extract(ARTICLE_PAGE, &url("https://shop.example.com/cameras"));
        let internal = page
            .internal_links
            .iter()
            .map(|edge| edge.target_url.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            internal,
            vec![
                "https://shop.example.com/",
                "https://shop.example.com/about",
                "https://shop.example.com/guides/film",
            ]
        );
        assert_eq!(page.external_links.len(), 1);
        assert_eq!(
            page.external_links[0].target_url,
            "https://twitter.example.org/shop"
        );

        let guide = &page.internal_links[2];
        assert_eq!(guide.anchor_text, "film photography guide");
        assert_eq!(
            guide.context,
            "Read the [film photography guide] before buying your first roll of film."
        );
        assert_eq!(guide.source_url, "https://shop.example.com/cameras");
    }

    #[test]
    fn neighbouring_pages_sites_are_external() {
        let html = r#"<html><body><article>
<p>See my <a href="/notes">own notes</a> and <a href="https://bob.github.io/">Bob's blog</a> for more.</p>
</article></body></html>"#;
        let page = extractor().extract(html, &url("https://alice.github.io/post"));
        assert_eq!(page.internal_links.len(), 1);
        assert_eq!(page.internal_links[0].target_url, "https://alice.github.io/notes");
        assert_eq!(page.external_links.len(), 1);
        assert_eq!(page.external_links[0].target_url, "https://bob.github.io/");
    }

    #[test]
    fn falls_back_to_body_paragraphs_without_main_container() {
        let html = r#"<html><body>
<div><p>This page has no article element but still carries a readable paragraph.</p></div>
</body></html>"#;
        let page = extractor().extract(html, &url("https://example.com/plain"));
        assert_eq!(page.paragraphs.len(), 1);
        assert_eq!(page.title, "https://example.com/plain");
    }

    #[test]
    fn falls_back_to_bare_text_and_handles_empty_pages() {
        let page = extractor().extract(
            "<html><body><div>Just some loose words</div></body></html>",
            &url("https://example.com/"),
        );
        assert_eq!(page.cleaned_text, "Just some loose words");

        let empty = extractor().extract(
            "<html><body><nav>Menu</nav><script>x()</script></body></html>",
            &url("https://example.com/"),
        );
        assert!(empty.is_empty());
    }

    #[test]
    fn skips_non_navigational_links_and_duplicates() {
        let html = r##"<html><body><p>
<a href="#top">top</a> <a href="mailto:a@example.com">mail</a>
<a href="/a">Alpha</a> <a href="/a#section">Alpha</a> <a href="javascript:void(0)">js</a>
</p></body></html>"##;
        let page = extractor().extract(html, &url("https://example.com/"));
        assert_eq!(page.internal_links.len(), 1);
        assert_eq!(page.internal_links[0].target_url, "https://example.com/a");
        assert!(page.external_links.is_empty());
    }
}
