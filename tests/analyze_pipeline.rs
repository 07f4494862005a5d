mod openai_stub;
mod site_stub;

use std::fs;
use std::path::Path;

use interlinker::formats::{AnalysisReport, CrawlReport, MatchType, PageContent};
use openai_stub::{OpenAiStub, OpenAiStubConfig};
use predicates::prelude::*;
use site_stub::SiteStub;

fn read_report(path: &Path) -> anyhow::Result<AnalysisReport> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

fn fast_retry_config(dir: &Path) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join("interlinker.yaml");
    fs::write(
        &path,
        "\
fetch:
  retry:
    base_delay_ms: 1
    max_delay_ms: 5
scoring:
  retry:
    base_delay_ms: 1
    max_delay_ms: 5
",
    )?;
    Ok(path)
}

#[test]
fn analyze_html_file_with_noop_scorer() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let html_path = temp.path().join("cameras.html");
    fs::write(&html_path, site_stub::CAMERAS_HTML)?;
    let out_path = temp.path().join("report.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.args([
        "analyze",
        "--url",
        "https://shop.example/blog/cameras",
        "--html",
        html_path.to_str().expect("utf-8 path"),
        "--out",
        out_path.to_str().expect("utf-8 path"),
    ])
    .assert()
    .success();

    let report = read_report(&out_path)?;
    assert_eq!(report.page.title, "Vintage Cameras | Shop");
    assert_eq!(report.page.paragraphs.len(), 3);
    assert!(!report.page.cleaned_text.contains("Copyright"));
    assert_eq!(report.page.external_links.len(), 1);
    assert_eq!(report.page.external_links[0].anchor_text, "the film shop");

    let first = report.suggestions.first().expect("at least one suggestion");
    assert_eq!(first.suggested_anchor_text, "vintage camera");
    assert_eq!(first.match_type, MatchType::Exact);
    assert!((first.relevance_score - 1.0).abs() < 1e-9);
    assert!(first.context.contains("[vintage camera]"));
    assert!(first.target_url.is_none());

    for suggestion in &report.suggestions {
        assert!(
            report.page.cleaned_text.to_lowercase().contains(&suggestion.suggested_anchor_text.to_lowercase()),
            "anchor not in page: {}",
            suggestion.suggested_anchor_text
        );
        assert!(suggestion.relevance_score >= 0.4);
        assert_ne!(suggestion.suggested_anchor_text, "lens buying guide");
    }
    assert_eq!(report.metrics.suggestions, report.suggestions.len());
    assert_eq!(report.metrics.pages_crawled, 0);
    Ok(())
}

#[test]
fn analyze_with_crawl_finds_targets_and_inbound_links() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    let temp = tempfile::TempDir::new()?;
    let config = fast_retry_config(temp.path())?;
    let out_path = temp.path().join("report.json");
    let page_url = site.url("/blog/cameras");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.args([
        "analyze",
        "--url",
        &page_url,
        "--config",
        config.to_str().expect("utf-8 path"),
        "--crawl",
        "--max-pages",
        "10",
        "--delay-ms",
        "0",
        "--out",
        out_path.to_str().expect("utf-8 path"),
    ])
    .assert()
    .success();

    let report = read_report(&out_path)?;

    let mut inbound_sources = report
        .inbound_links
        .iter()
        .map(|edge| edge.source_url.clone())
        .collect::<Vec<_>>();
    inbound_sources.sort();
    assert_eq!(
        inbound_sources,
        vec![site.url("/"), site.url("/blog/film"), site.url("/blog/lenses")]
    );
    assert!(report.inbound_links.iter().all(|edge| edge.target_url == page_url));
    assert_eq!(report.metrics.inbound_links, 3);
    assert_eq!(report.metrics.crawl_failures, 1);
    assert!(!report.metrics.crawl_truncated);
    assert!(report.metrics.pages_crawled <= 10);

    let first = report.suggestions.first().expect("at least one suggestion");
    assert_eq!(first.suggested_anchor_text, "vintage camera");
    // The lens guide mentions the phrase too, but the page already links to it.
    assert_eq!(first.target_url.as_deref(), Some(site.url("/blog/film").as_str()));
    assert_eq!(first.target_title.as_deref(), Some("Film Photography Basics"));
    assert!(
        report
            .suggestions
            .iter()
            .all(|s| s.target_url.as_deref() != Some(site.url("/blog/lenses").as_str()))
    );
    Ok(())
}

#[test]
fn analyze_uses_openai_scores_after_rate_limit() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    let stub = OpenAiStub::spawn(OpenAiStubConfig {
        rate_limit_first: 1,
        ..OpenAiStubConfig::default()
    });
    let temp = tempfile::TempDir::new()?;
    let out_path = temp.path().join("report.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.env("OPENAI_API_KEY", "test-key")
        .args([
            "analyze",
            "--url",
            &site.url("/blog/cameras"),
            "--engine",
            "openai",
            "--openai-base-url",
            &stub.base_url,
            "--openai-model",
            "stub-model",
            "--out",
            out_path.to_str().expect("utf-8 path"),
        ])
        .assert()
        .success();

    let report = read_report(&out_path)?;
    assert!(stub.requests() >= 2);
    assert_eq!(report.metrics.degraded_batches, 0);
    assert!(report.metrics.scoring_batches >= 1);

    let first = report.suggestions.first().expect("at least one suggestion");
    assert_eq!(first.suggested_anchor_text, "vintage camera");
    assert_eq!(first.match_type, MatchType::Exact);
    assert!((first.relevance_score - 0.9).abs() < 1e-9);
    assert!(
        report
            .suggestions
            .iter()
            .all(|s| s.suggested_anchor_text.contains("camera"))
    );
    Ok(())
}

#[test]
fn analyze_reports_detected_themes() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(OpenAiStubConfig::default());
    let temp = tempfile::TempDir::new()?;
    let html_path = temp.path().join("cameras.html");
    fs::write(&html_path, site_stub::CAMERAS_HTML)?;
    let out_path = temp.path().join("report.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.env("OPENAI_API_KEY", "test-key")
        .args([
            "analyze",
            "--url",
            "https://shop.example/blog/cameras",
            "--html",
            html_path.to_str().expect("utf-8 path"),
            "--engine",
            "openai",
            "--openai-base-url",
            &stub.base_url,
            "--theme",
            "camera collecting",
            "--theme",
            "gardening",
            "--out",
            out_path.to_str().expect("utf-8 path"),
        ])
        .assert()
        .success();

    let report = read_report(&out_path)?;
    let themes = report
        .themes
        .iter()
        .map(|theme| theme.label.as_str())
        .collect::<Vec<_>>();
    assert_eq!(themes, vec!["camera collecting"]);
    assert!((report.themes[0].score - 0.9).abs() < 1e-9);
    assert!(!report.metrics.themes_degraded);

    let first = report.suggestions.first().expect("at least one suggestion");
    assert_eq!(first.suggested_anchor_text, "vintage camera");
    assert_eq!(first.match_type, MatchType::Exact);
    Ok(())
}

#[test]
fn malformed_scores_degrade_instead_of_failing() -> anyhow::Result<()> {
    let stub = OpenAiStub::spawn(OpenAiStubConfig {
        garbled: true,
        ..OpenAiStubConfig::default()
    });
    let temp = tempfile::TempDir::new()?;
    let config = fast_retry_config(temp.path())?;
    let html_path = temp.path().join("cameras.html");
    fs::write(&html_path, site_stub::CAMERAS_HTML)?;
    let out_path = temp.path().join("report.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.env("OPENAI_API_KEY", "test-key")
        .args([
            "analyze",
            "--url",
            "https://shop.example/blog/cameras",
            "--html",
            html_path.to_str().expect("utf-8 path"),
            "--config",
            config.to_str().expect("utf-8 path"),
            "--engine",
            "openai",
            "--openai-base-url",
            &stub.base_url,
            "--out",
            out_path.to_str().expect("utf-8 path"),
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("degrading to fallback"));

    let report = read_report(&out_path)?;
    assert!(report.metrics.degraded_batches >= 1);
    assert_eq!(report.metrics.degraded_batches, report.metrics.scoring_batches);
    assert!(report.suggestions.is_empty());
    Ok(())
}

#[test]
fn missing_api_key_degrades_scoring() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let html_path = temp.path().join("cameras.html");
    fs::write(&html_path, site_stub::CAMERAS_HTML)?;
    let out_path = temp.path().join("report.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.env_remove("OPENAI_API_KEY")
        .args([
            "analyze",
            "--url",
            "https://shop.example/blog/cameras",
            "--html",
            html_path.to_str().expect("utf-8 path"),
            "--engine",
            "openai",
            "--openai-base-url",
            "http://127.0.0.1:9/v1",
            "--out",
            out_path.to_str().expect("utf-8 path"),
        ])
        .assert()
        .success();

    let report = read_report(&out_path)?;
    assert!(report.metrics.degraded_batches >= 1);
    assert!(report.suggestions.is_empty());
    Ok(())
}

#[test]
fn unreachable_primary_page_fails() {
    let site = SiteStub::spawn();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.args(["analyze", "--url", &site.url("/missing")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("404"));
}

#[test]
fn crawl_command_reports_link_graph() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    let temp = tempfile::TempDir::new()?;
    let out_path = temp.path().join("crawl.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.args([
        "crawl",
        "--url",
        &site.url("/blog/cameras"),
        "--max-pages",
        "3",
        "--delay-ms",
        "0",
        "--out",
        out_path.to_str().expect("utf-8 path"),
    ])
    .assert()
    .success();

    let report: CrawlReport = serde_json::from_str(&fs::read_to_string(&out_path)?)?;
    assert_eq!(report.visited.len(), 3);
    assert_eq!(report.visited[0], site.url("/blog/cameras"));
    assert!(report.visited.iter().all(|url| url.starts_with(&site.base_url)));
    assert!(report.link_graph.contains_key(&site.url("/blog/cameras")));
    Ok(())
}

#[test]
fn sitemap_seeds_targets_no_page_links_to() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    let temp = tempfile::TempDir::new()?;
    let config = fast_retry_config(temp.path())?;
    let out_path = temp.path().join("report.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.args([
        "analyze",
        "--url",
        &site.url("/blog/cameras"),
        "--config",
        config.to_str().expect("utf-8 path"),
        "--sitemap",
        "--max-pages",
        "10",
        "--delay-ms",
        "0",
        "--out",
        out_path.to_str().expect("utf-8 path"),
    ])
    .assert()
    .success();

    let report = read_report(&out_path)?;
    assert_eq!(report.metrics.sitemap_urls, 1);
    let tripods = site.url("/blog/tripods");
    assert!(
        report
            .suggestions
            .iter()
            .any(|s| s.suggested_anchor_text == "vintage camera"
                && s.target_url.as_deref() == Some(tripods.as_str())),
        "{:?}",
        report.suggestions
    );
    Ok(())
}

#[test]
fn crawl_command_follows_the_sitemap() -> anyhow::Result<()> {
    let site = SiteStub::spawn();
    let temp = tempfile::TempDir::new()?;
    let out_path = temp.path().join("crawl.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.args([
        "crawl",
        "--url",
        &site.url("/blog/cameras"),
        "--sitemap-url",
        &site.url("/sitemap.xml"),
        "--delay-ms",
        "0",
        "--out",
        out_path.to_str().expect("utf-8 path"),
    ])
    .assert()
    .success();

    let report: CrawlReport = serde_json::from_str(&fs::read_to_string(&out_path)?)?;
    assert_eq!(
        report.sitemaps,
        vec![site.url("/sitemap.xml"), site.url("/sitemap-pages.xml")]
    );
    assert!(report.visited.contains(&site.url("/blog/tripods")));
    assert!(!report.visited.contains(&site.url("/logo.png")));
    assert!(report.link_graph.contains_key(&site.url("/blog/tripods")));
    Ok(())
}

#[test]
fn sitemap_command_lists_site_pages() -> anyhow::Result<()> {
    let site = SiteStub::spawn();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    let output = cmd.args(["sitemap", "--url", &site.base_url]).output()?;
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let locs = report["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .filter_map(|entry| entry["loc"].as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        locs,
        vec![
            site.url("/blog/cameras"),
            site.url("/blog/lenses"),
            site.url("/blog/tripods")
        ]
    );
    assert_eq!(report["skipped"], 2);
    assert_eq!(report["entries"][0]["lastmod"], "2024-03-01");
    Ok(())
}

#[test]
fn sitemap_command_fails_without_a_sitemap() {
    let site = SiteStub::spawn();
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    cmd.args(["sitemap", "--url", &site.url("/nothing.xml")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no sitemap found"));
}

#[test]
fn extract_command_prints_page_content() -> anyhow::Result<()> {
    let temp = tempfile::TempDir::new()?;
    let html_path = temp.path().join("cameras.html");
    fs::write(&html_path, site_stub::CAMERAS_HTML)?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("interlinker");
    let output = cmd
        .args([
            "extract",
            "--url",
            "https://shop.example/blog/cameras",
            "--html",
            html_path.to_str().expect("utf-8 path"),
        ])
        .output()?;
    assert!(output.status.success());

    let page: PageContent = serde_json::from_slice(&output.stdout)?;
    assert_eq!(page.url, "https://shop.example/blog/cameras");
    let internal = page
        .internal_links
        .iter()
        .map(|edge| edge.target_url.as_str())
        .collect::<Vec<_>>();
    assert!(internal.contains(&"https://shop.example/blog/lenses"));
    assert!(internal.contains(&"https://shop.example/about"));
    let lens_edge = page
        .internal_links
        .iter()
        .find(|edge| edge.anchor_text == "lens buying guide")
        .expect("lens link");
    assert!(lens_edge.context.contains("[lens buying guide]"));
    Ok(())
}
