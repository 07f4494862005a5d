use clap::{Args, Parser, Subcommand};

use crate::config::{PhraseStrategy, ScorerEngine};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Suggest internal links for one page.
    Analyze(AnalyzeArgs),
    /// Crawl a site and report its internal link graph.
    Crawl(CrawlArgs),
    /// Print the extracted content of one page.
    Extract(ExtractArgs),
    /// List the pages a site's XML sitemaps declare.
    Sitemap(SitemapArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Page URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Read the page from this HTML file instead of fetching it.
    #[arg(long)]
    pub html: Option<String>,

    /// YAML config file.
    #[arg(long)]
    pub config: Option<String>,

    /// Crawl the site for link targets.
    #[arg(long)]
    pub crawl: bool,

    /// Maximum pages to retrieve while crawling.
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Maximum concurrent HTTP requests while crawling.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Delay before each crawl request (politeness).
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Seed the crawl from the site's XML sitemaps.
    #[arg(long)]
    pub sitemap: bool,

    /// Sitemap or sitemap index to load (implies --sitemap).
    #[arg(long, value_name = "URL")]
    pub sitemap_url: Option<String>,

    /// Relevance scoring engine.
    #[arg(long, value_enum)]
    pub engine: Option<ScorerEngine>,

    /// OpenAI model name.
    #[arg(long)]
    pub openai_model: Option<String>,

    /// OpenAI-compatible API base URL.
    #[arg(long)]
    pub openai_base_url: Option<String>,

    /// Theme label to classify the page against (repeatable).
    #[arg(long = "theme", value_name = "LABEL")]
    pub themes: Vec<String>,

    /// Phrase candidate strategy.
    #[arg(long, value_enum)]
    pub strategy: Option<PhraseStrategy>,

    /// Overall time budget in seconds.
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// JSONL file of known pages (`{url,title,content}` per line) used as link targets.
    #[arg(long)]
    pub pages: Option<String>,

    /// Output file (stdout when omitted).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite the output file if it exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Start URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// YAML config file.
    #[arg(long)]
    pub config: Option<String>,

    /// Maximum pages to retrieve.
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Maximum concurrent HTTP requests.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Delay before each request (politeness).
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Seed the crawl from the site's XML sitemaps.
    #[arg(long)]
    pub sitemap: bool,

    /// Sitemap or sitemap index to load (implies --sitemap).
    #[arg(long, value_name = "URL")]
    pub sitemap_url: Option<String>,

    /// Output file (stdout when omitted).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite the output file if it exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Page URL (must be http/https).
    #[arg(long)]
    pub url: String,

    /// Read the page from this HTML file instead of fetching it.
    #[arg(long)]
    pub html: Option<String>,

    /// YAML config file.
    #[arg(long)]
    pub config: Option<String>,

    /// Output file (stdout when omitted).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite the output file if it exists.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct SitemapArgs {
    /// Site URL, or the sitemap itself when it ends in `.xml`.
    #[arg(long)]
    pub url: String,

    /// Sitemap or sitemap index to load instead of discovering one.
    #[arg(long, value_name = "URL")]
    pub sitemap_url: Option<String>,

    /// YAML config file.
    #[arg(long)]
    pub config: Option<String>,

    /// Output file (stdout when omitted).
    #[arg(long)]
    pub out: Option<String>,

    /// Overwrite the output file if it exists.
    #[arg(long)]
    pub force: bool,
}
