use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    interlinker::logging::init().context("init logging")?;

    let cli = interlinker::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        interlinker::cli::Command::Analyze(args) => {
            interlinker::analyze::run(args).await.context("analyze")?;
        }
        interlinker::cli::Command::Crawl(args) => {
            interlinker::crawl::run(args).await.context("crawl")?;
        }
        interlinker::cli::Command::Extract(args) => {
            interlinker::extract::run(args).await.context("extract")?;
        }
        interlinker::cli::Command::Sitemap(args) => {
            interlinker::sitemap::run(args).await.context("sitemap")?;
        }
    }

    Ok(())
}
