use url::Url;

const RESOURCE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "svg", "webp", "ico", "bmp", "pdf", "doc", "docx", "xls", "xlsx",
    "ppt", "pptx", "zip", "rar", "tar", "gz", "7z", "mp3", "mp4", "avi", "mov", "webm", "wav",
    "css", "js", "json", "xml", "rss", "txt", "woff", "woff2", "ttf",
];

const PAGE_EXTENSIONS: &[&str] = &["html", "htm", "php", "asp", "aspx", "jsp"];

const EXCLUDED_SEGMENTS: &[&str] = &[
    "wp-content",
    "wp-includes",
    "wp-admin",
    "cart",
    "checkout",
    "my-account",
];

/// Host without a leading `www.`.
pub fn site_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").map(str::to_owned).unwrap_or(host))
}

/// Hosting platforms where every subdomain belongs to a different owner.
const SHARED_HOST_SUFFIXES: &[&str] = &[
    "github.io",
    "gitlab.io",
    "netlify.app",
    "vercel.app",
    "pages.dev",
    "workers.dev",
    "herokuapp.com",
    "blogspot.com",
    "wordpress.com",
    "tumblr.com",
    "substack.com",
    "web.app",
    "firebaseapp.com",
    "azurewebsites.net",
    "cloudfront.net",
    "appspot.com",
];

/// Approximates the registrable domain: the last two labels, or three when
/// the second-level label is a common country-code registry (`co.uk`) or the
/// host sits under a shared hosting suffix (`alice.github.io`).
pub fn registered_domain(url: &Url) -> Option<String> {
    let host = site_host(url)?;
    if matches!(url.host(), Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_))) {
        return Some(host);
    }
    let labels = host.split('.').collect::<Vec<_>>();
    if labels.len() <= 2 {
        return Some(host);
    }
    let tld = labels[labels.len() - 1];
    let second = labels[labels.len() - 2];
    let suffix = format!("{second}.{tld}");
    let keep = if SHARED_HOST_SUFFIXES.contains(&suffix.as_str())
        || (tld.len() == 2 && matches!(second, "co" | "com" | "org" | "net" | "ac" | "gov" | "edu"))
    {
        3
    } else {
        2
    };
    Some(labels[labels.len() - keep..].join("."))
}

pub fn same_registered_domain(a: &Url, b: &Url) -> bool {
    match (registered_domain(a), registered_domain(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

pub fn is_http(url: &Url) -> bool {
    url.scheme() == "http" || url.scheme() == "https"
}

/// Whether the URL looks like an HTML page rather than a resource or shop/admin path.
pub fn is_crawlable_page(url: &Url) -> bool {
    if !is_http(url) {
        return false;
    }
    let path = url.path().to_ascii_lowercase();
    if path
        .split('/')
        .any(|segment| EXCLUDED_SEGMENTS.contains(&segment))
    {
        return false;
    }
    let last_segment = path.rsplit('/').next().unwrap_or_default();
    match last_segment.rsplit_once('.') {
        Some((_, ext)) if RESOURCE_EXTENSIONS.contains(&ext) => false,
        Some((_, ext)) if PAGE_EXTENSIONS.contains(&ext) => true,
        Some((stem, ext)) => stem.is_empty() || ext.is_empty() || ext.len() > 5,
        None => true,
    }
}

/// Resolves an `href` against `base`, dropping the fragment.
///
/// Returns `None` for empty, fragment-only, and non-navigational targets.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:", "sms:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !is_http(&url) {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

pub fn normalize_crawl_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized.set_query(None);
    normalized
}

/// Comparison key: no fragment, no query, no trailing slash except the root.
pub fn canonical_url(url: &Url) -> Url {
    let mut canonical = normalize_crawl_url(url);
    let mut path = canonical.path().to_owned();
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    canonical.set_path(&path);
    canonical
}

pub fn canonical_str(raw: &str) -> Option<String> {
    Url::parse(raw).ok().map(|url| canonical_url(&url).to_string())
}
