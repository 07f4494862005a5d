use std::time::Duration;

/// Failure fetching a single URL.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("GET {url}: timed out")]
    Timeout { url: String },

    #[error("GET {url}: HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url}: not an html document (content-type: {content_type})")]
    NotHtml { url: String, content_type: String },

    #[error("unsupported url scheme: {url}")]
    Scheme { url: String },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::NotHtml { .. } | Self::Scheme { .. } => false,
        }
    }

    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                url: url.to_owned(),
            };
        }
        if let Some(status) = err.status() {
            return Self::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            };
        }
        Self::Transport {
            url: url.to_owned(),
            source: err,
        }
    }
}

/// Failure calling a relevance provider for one batch of phrases.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("{provider}: missing credentials ({var} is not set)")]
    MissingCredentials {
        provider: &'static str,
        var: &'static str,
    },

    #[error("{provider}: request timed out")]
    Timeout { provider: &'static str },

    #[error("{provider}: rate limited")]
    RateLimited {
        provider: &'static str,
        retry_after: Option<Duration>,
    },

    #[error("{provider}: API error ({status}): {message}")]
    Status {
        provider: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider}: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider}: malformed response: {message}")]
    Malformed {
        provider: &'static str,
        message: String,
    },
}

impl ScoreError {
    /// Everything except a configuration problem is worth another attempt.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::MissingCredentials { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { provider }
        } else {
            Self::Transport {
                provider,
                source: err,
            }
        }
    }

    pub(crate) fn malformed(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            provider,
            message: message.into(),
        }
    }
}

/// Failure loading one sitemap document.
#[derive(Debug, thiserror::Error)]
pub enum SitemapError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{url}: invalid sitemap xml: {message}")]
    Xml { url: String, message: String },

    #[error("{url}: neither a urlset nor a sitemapindex")]
    NotSitemap { url: String },
}

/// Conditions that fail a whole analysis; everything else degrades.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzeError {
    #[error("not an http(s) url: {url}")]
    InvalidUrl { url: String },

    #[error("fetch primary page")]
    PrimaryFetch(#[source] FetchError),

    #[error("no extractable content at {url}")]
    EmptyContent { url: String },
}
