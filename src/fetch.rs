use std::time::Duration;

use anyhow::Context as _;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use url::Url;

use crate::config::FetchConfig;
use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects.
    pub url: Url,
    pub status: u16,
    pub body: String,
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// `GET` returning the body of a 2xx HTML response; anything else is an error.
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;

    /// `GET` for a non-HTML document such as a sitemap or `robots.txt`.
    async fn fetch_document(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.fetch(url).await
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .context("build page fetch http client")?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }
}

const HTML_ACCEPT: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8";
const DOCUMENT_ACCEPT: &str = "application/xml,text/xml;q=0.9,text/plain;q=0.8,*/*;q=0.5";

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.get(url, HTML_ACCEPT, true).await
    }

    async fn fetch_document(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        self.get(url, DOCUMENT_ACCEPT, false).await
    }
}

impl HttpFetcher {
    async fn get(
        &self,
        url: &Url,
        accept: &str,
        html_only: bool,
    ) -> Result<FetchedPage, FetchError> {
        if !crate::urls::is_http(url) {
            return Err(FetchError::Scheme {
                url: url.to_string(),
            });
        }

        tracing::debug!(url = %url, "fetch");
        let response = self
            .client
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|err| FetchError::from_reqwest(url.as_str(), err))?;

        let status = response.status();
        let final_url = response.url().clone();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if html_only
            && let Some(content_type) = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
        {
            let content_type = content_type.to_ascii_lowercase();
            if !(content_type.starts_with("text/html")
                || content_type.starts_with("application/xhtml+xml"))
            {
                return Err(FetchError::NotHtml {
                    url: url.to_string(),
                    content_type,
                });
            }
        }

        let body = response
            .text()
            .await
            .map_err(|err| FetchError::from_reqwest(url.as_str(), err))?;

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Fetch with the configured retry policy.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: &Url,
    config: &FetchConfig,
) -> Result<FetchedPage, FetchError> {
    config
        .retry
        .run(url.as_str(), |_| fetcher.fetch(url))
        .await
}

/// [`Fetcher::fetch_document`] with the configured retry policy.
pub async fn fetch_document_with_retry(
    fetcher: &dyn Fetcher,
    url: &Url,
    config: &FetchConfig,
) -> Result<FetchedPage, FetchError> {
    config
        .retry
        .run(url.as_str(), |_| fetcher.fetch_document(url))
        .await
}
