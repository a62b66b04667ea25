//! Generic hot-board adapter
//!
//! Covers every catalog platform served by the two aggregation upstreams.
//! The upstream is chosen by platform id: uapis.cn for the platforms it
//! supports, api-hot.imsyy.com for the rest. The two return three payload
//! shapes between them; all are normalized into the flat [`HotItem`] list
//! and checked in a fixed order so an ambiguous payload resolves the same
//! way every time.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::data::HotItem;
use crate::error::ApiError;
use crate::net;
use crate::sources::{CacheScope, HotSource, SourceData};

/// Platforms served by uapis.cn; everything else falls through to imsyy.
const UAPIS_PLATFORMS: &[&str] = &[
    "baidu", "weibo", "zhihu", "douyin", "bilibili", "kuaishou",
    "toutiao", "tieba", "hupu", "douban-movie", "douban-group", "juejin", "jianshu",
    "ithome", "ithome-xijiayi", "36kr", "csdn", "v2ex", "sspai", "coolapk",
    "thepaper", "qq-news", "sina", "sina-news", "netease-news", "huxiu", "ifanr",
    "acfun", "genshin", "honkai", "starrail", "lol", "guokr", "51cto",
    "nodeseek", "52pojie", "hostloc", "weread", "hellogithub", "zhihu-daily",
];

pub struct HotBoardSource {
    id: String,
    url: String,
    client: Client,
    timeout: Duration,
}

impl HotBoardSource {
    pub fn new(id: &str, client: Client, timeout: Duration) -> Self {
        let url = if UAPIS_PLATFORMS.contains(&id) {
            format!("https://uapis.cn/api/v1/misc/hotboard?type={}", id)
        } else {
            format!("https://api-hot.imsyy.com/{}?cache=true", id)
        };
        Self {
            id: id.to_string(),
            url,
            client,
            timeout,
        }
    }

    #[cfg(test)]
    fn api_url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HotSource for HotBoardSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn cache_scope(&self) -> CacheScope {
        CacheScope::FullList
    }

    async fn fetch(
        &self,
        _page: usize,
        _page_size: usize,
        _filter: Option<&str>,
    ) -> Result<SourceData, ApiError> {
        let payload = net::get_json(&self.client, &self.url, self.timeout).await?;
        let items = parse_hot_board(&payload)?;
        tracing::debug!(source = %self.id, count = items.len(), "hot board fetched");
        Ok(SourceData::FullList(items))
    }
}

/// uapis.cn new shape: `{ "type": ..., "list": [...], "update_time": ... }`
#[derive(Debug, Deserialize)]
struct RawListItem {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    extra: Option<RawExtra>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    hot_value: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawExtra {
    #[serde(default)]
    desc: String,
    #[serde(default)]
    img: String,
}

/// Item shape shared by the uapis.cn legacy and imsyy payloads; already
/// close to [`HotItem`] but with optional rank and free-typed popularity.
#[derive(Debug, Deserialize)]
struct RawPassthroughItem {
    #[serde(default)]
    index: Option<usize>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    img: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    hot: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawBoard {
    #[serde(default)]
    list: Option<Vec<RawListItem>>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    data: Option<Vec<RawPassthroughItem>>,
}

/// Popularity arrives as a string or a bare number depending on upstream.
fn popularity_string(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Normalize a hot-board payload into the flat item list.
///
/// Shape precedence: the uapis.cn `list` shape first, then the legacy
/// `code == 200` envelope, then a bare `data` array. Anything else is a
/// contract violation.
pub fn parse_hot_board(payload: &serde_json::Value) -> Result<Vec<HotItem>, ApiError> {
    let board: RawBoard = serde_json::from_value(payload.clone())
        .map_err(|e| ApiError::MalformedResponse(format!("hot board payload: {}", e)))?;

    if let Some(list) = board.list {
        return Ok(list
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let extra = item.extra.unwrap_or_default();
                HotItem {
                    index: item.index.unwrap_or(i + 1),
                    title: item.title,
                    desc: extra.desc,
                    img: extra.img,
                    url: item.url,
                    hot: popularity_string(item.hot_value.as_ref()),
                }
            })
            .collect());
    }

    let passthrough = match (board.code, board.data) {
        (Some(200), Some(data)) => data,
        (_, Some(data)) => data,
        _ => {
            return Err(ApiError::MalformedResponse(
                "hot board payload matches no known shape".to_string(),
            ))
        }
    };

    Ok(passthrough
        .into_iter()
        .enumerate()
        .map(|(i, item)| HotItem {
            index: item.index.unwrap_or(i + 1),
            title: item.title,
            desc: item.desc,
            img: item.img,
            url: item.url,
            hot: popularity_string(item.hot.as_ref()),
        })
        .collect())
}
