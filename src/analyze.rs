use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use url::Url;

use crate::cli::AnalyzeArgs;
use crate::config::AnalyzeConfig;
use crate::pipeline::Analyzer;
use crate::targets::InMemoryPageStore;

/// Applies CLI overrides on top of the config file.
pub fn resolve_config(args: &AnalyzeArgs) -> anyhow::Result<AnalyzeConfig> {
    let mut config = AnalyzeConfig::load(args.config.as_deref().map(Path::new))?;

    if args.crawl {
        config.crawl.enabled = true;
    }
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
    if let Some(sitemap_url) = &args.sitemap_url {
        config.crawl.sitemap.enabled = true;
        config.crawl.sitemap.url = Some(sitemap_url.clone());
    }
    if let Some(engine) = args.engine {
        config.scoring.engine = engine;
    }
    if let Some(model) = &args.openai_model {
        config.scoring.openai.model = model.clone();
    }
    if let Some(base_url) = &args.openai_base_url {
        config.scoring.openai.base_url = base_url.clone();
    }
    if !args.themes.is_empty() {
        config.themes.labels = args.themes.clone();
    }
    if let Some(strategy) = args.strategy {
        config.phrases.strategy = strategy;
    }
    if let Some(deadline_secs) = args.deadline_secs {
        config.deadline_secs = Some(deadline_secs);
    }

    Ok(config)
}

pub async fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let url = Url::parse(&args.url).context("parse --url")?;

    tracing::info!(
        url = %url,
        engine = ?config.scoring.engine,
        strategy = ?config.phrases.strategy,
        crawl = config.crawl.enabled,
        sitemap = config.crawl.sitemap.enabled,
        themes = config.themes.labels.len(),
        "analyze"
    );

    let mut analyzer = Analyzer::from_config(config)?;
    if let Some(path) = args.pages.as_deref() {
        let store = InMemoryPageStore::from_jsonl(Path::new(path))?;
        tracing::info!(pages = store.len(), path, "loaded link targets");
        analyzer = analyzer.with_page_store(Arc::new(store));
    }

    let report = match args.html.as_deref() {
        Some(path) => {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("read html file: {path}"))?;
            analyzer.analyze_html(&url, &html).await
        }
        None => analyzer.analyze(&url).await,
    }
    .with_context(|| format!("analyze {url}"))?;

    crate::output::write_json(args.out.as_deref(), &report, args.force)
}

#[cfg(test)]
mod tests {
    use clap::Parser as _;

    use super::*;
    use crate::cli::{Cli, Command};

    fn analyze_args(extra: &[&str]) -> AnalyzeArgs {
        let argv = ["interlinker", "analyze", "--url", "https://site.example/"]
            .into_iter()
            .chain(extra.iter().copied());
        match Cli::try_parse_from(argv).expect("parse cli").command {
            Command::Analyze(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn defaults_leave_optional_stages_off() -> anyhow::Result<()> {
        let config = resolve_config(&analyze_args(&[]))?;
        assert!(!config.crawl.enabled);
        assert!(!config.crawl.sitemap.enabled);
        assert!(config.themes.labels.is_empty());
        Ok(())
    }

    #[test]
    fn sitemap_url_and_themes_override_config() -> anyhow::Result<()> {
        let config = resolve_config(&analyze_args(&[
            "--sitemap-url",
            "https://site.example/sitemap_index.xml",
            "--theme",
            "film photography",
            "--theme",
            "camera repair",
        ]))?;
        assert!(config.crawl.sitemap.enabled);
        assert_eq!(
            config.crawl.sitemap.url.as_deref(),
            Some("https://site.example/sitemap_index.xml")
        );
        assert_eq!(config.themes.labels, vec!["film photography", "camera repair"]);
        Ok(())
    }
}
