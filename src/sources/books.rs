//! Book ranking adapter
//!
//! The ranking page has no API and no CORS headers, so it is fetched as raw
//! HTML through a list of public proxies, tried in order within a single
//! attempt. A proxy response shorter than [`MIN_HTML_LEN`] bytes is a proxy
//! error page, not a ranking; it is skipped like a failure. Book entries are
//! extracted with regular expressions against the page's stable markup.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;

use crate::data::HotItem;
use crate::error::ApiError;
use crate::net;
use crate::retry::RetryPolicy;
use crate::sources::{CacheScope, HotSource, SourceData};

const TARGET_URL: &str = "http://zhuishushenqi.com/ranking";

/// Public CORS proxies, in priority order.
const PROXIES: &[&str] = &[
    "https://api.allorigins.win/raw?url=",
    "https://corsproxy.io/?",
    "https://api.codetabs.com/v1/proxy?quest=",
];

/// Anything shorter is a proxy error page rather than the ranking.
const MIN_HTML_LEN: usize = 100;

static BOOK_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a\s+href="/book/([^"]+)"\s+class="book"\s+target="_blank">(.*?)</a>"#)
        .unwrap()
});
static BOOK_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<h4\s+class="name">\s*<span>([^<]+)</span>\s*</h4>"#).unwrap());
static BOOK_AUTHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<p\s+class="author">\s*<span>([^<]+)</span>\s*</p>"#).unwrap());
static BOOK_DESC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<p\s+class="desc">([^<]*)</p>"#).unwrap());
static BOOK_POPULARITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)<p\s+class="popularity">(.*?)</p>"#).unwrap());
static POPULARITY_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<span\s+class="c-red">([^<]+)</span>"#).unwrap());

pub struct BookRankingSource {
    client: Client,
    timeout: Duration,
    proxies: Vec<String>,
}

impl BookRankingSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self::with_proxies(client, timeout, PROXIES.iter().map(|p| p.to_string()).collect())
    }

    /// Source with a custom proxy rotation (tests).
    fn with_proxies(client: Client, timeout: Duration, proxies: Vec<String>) -> Self {
        Self {
            client,
            timeout,
            proxies,
        }
    }
}

/// Judge one proxy response: `Some(books)` to accept it, `None` to move on
/// to the next proxy. A body shorter than [`MIN_HTML_LEN`] or one that
/// yields no book entries is a proxy error page, not the ranking.
fn evaluate_proxy_response(html: &str) -> Option<Vec<HotItem>> {
    if html.len() < MIN_HTML_LEN {
        return None;
    }
    let books = parse_ranking_html(html);
    if books.is_empty() {
        return None;
    }
    Some(books)
}

#[async_trait]
impl HotSource for BookRankingSource {
    fn id(&self) -> &str {
        "zhuishu"
    }

    fn cache_scope(&self) -> CacheScope {
        CacheScope::FullList
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_secs(2))
    }

    /// Every attempt walks a fresh proxy rotation, so any failure class is
    /// worth one more try.
    fn should_retry(&self, _error: &ApiError) -> bool {
        true
    }

    async fn fetch(
        &self,
        _page: usize,
        _page_size: usize,
        _filter: Option<&str>,
    ) -> Result<SourceData, ApiError> {
        let encoded_target: String =
            url::form_urlencoded::byte_serialize(TARGET_URL.as_bytes()).collect();

        for (i, proxy) in self.proxies.iter().enumerate() {
            let full_url = format!("{}{}", proxy, encoded_target);

            let html = match net::get_text(&self.client, &full_url, self.timeout).await {
                Ok(html) => html,
                Err(error) => {
                    tracing::warn!(proxy = i + 1, %error, "proxy request failed");
                    continue;
                }
            };

            let Some(books) = evaluate_proxy_response(&html) else {
                tracing::warn!(proxy = i + 1, len = html.len(), "proxy returned an unusable page");
                continue;
            };

            tracing::debug!(proxy = i + 1, count = books.len(), "book ranking fetched");
            return Ok(SourceData::FullList(books));
        }

        // Indistinguishable from the page being unreachable.
        Err(ApiError::Timeout)
    }
}

/// Extract book entries from the ranking page markup.
///
/// Entries without a name are dropped; indices are assigned over the kept
/// entries so the list stays dense.
pub fn parse_ranking_html(html: &str) -> Vec<HotItem> {
    let mut books = Vec::new();

    for capture in BOOK_BLOCK.captures_iter(html) {
        let block = &capture[0];
        let book_id = &capture[1];

        let title = BOOK_NAME
            .captures(block)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();
        if title.is_empty() {
            continue;
        }

        let author = BOOK_AUTHOR
            .captures(block)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();
        let desc = BOOK_DESC
            .captures(block)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();
        let hot = BOOK_POPULARITY
            .captures(block)
            .and_then(|p| p.get(1))
            .and_then(|inner| POPULARITY_VALUE.captures(inner.as_str()))
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();

        books.push(HotItem {
            index: books.len() + 1,
            title,
            desc: format!("{} · {}", author, desc),
            img: String::new(),
            url: format!("http://zhuishushenqi.com/book/{}", book_id),
            hot,
        });
    }

    books
}
