//! Met Museum adapter
//!
//! Two-step upstream: a search call returns the full list of matching
//! object ids, then the ids for the requested page window are resolved to
//! artwork details with a bounded fan-out. Detail failures are tolerated;
//! an artwork that cannot be fetched, has no primary image, or is not
//! public domain is simply absent from the page. `total` and `has_more`
//! are derived from the id list before any filtering, so pagination stays
//! stable even when a page comes back sparse.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;

use crate::data::{dedupe_by_title, HotItem, PageResult};
use crate::error::ApiError;
use crate::net;
use crate::retry::RetryPolicy;
use crate::sources::{CacheScope, HotSource, SourceData};

const API_BASE: &str = "https://collectionapi.metmuseum.org/public/collection/v1";

/// Deadline for each individual detail fetch.
const DETAIL_TIMEOUT: Duration = Duration::from_secs(5);

/// Concurrent detail fetches per page.
const DETAIL_CONCURRENCY: usize = 5;

pub struct MetMuseumSource {
    client: Client,
    timeout: Duration,
}

impl MetMuseumSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl HotSource for MetMuseumSource {
    fn id(&self) -> &str {
        "metmuseum"
    }

    fn cache_scope(&self) -> CacheScope {
        CacheScope::PerPage
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_secs(1))
    }

    async fn fetch(
        &self,
        page: usize,
        page_size: usize,
        filter: Option<&str>,
    ) -> Result<SourceData, ApiError> {
        let mut search_url = format!("{}/search?q=*&hasImages=true", API_BASE);
        if let Some(geo) = filter {
            let encoded: String = url::form_urlencoded::byte_serialize(geo.as_bytes()).collect();
            search_url.push_str("&geoLocation=");
            search_url.push_str(&encoded);
        }

        let payload = net::get_json(&self.client, &search_url, self.timeout).await?;
        let search: SearchResult = serde_json::from_value(payload)
            .map_err(|e| ApiError::MalformedResponse(format!("search payload: {}", e)))?;
        let object_ids = search.object_ids.unwrap_or_default();

        let start = page.saturating_sub(1).saturating_mul(page_size);
        let end = start.saturating_add(page_size).min(object_ids.len());
        if start >= end {
            return Ok(SourceData::Paged(PageResult::empty()));
        }

        let details: Vec<Option<HotItem>> = futures::stream::iter(
            object_ids[start..end]
                .iter()
                .copied()
                .enumerate()
                .map(|(i, object_id)| fetch_detail(&self.client, object_id, start + i + 1)),
        )
        .buffered(DETAIL_CONCURRENCY)
        .collect()
        .await;

        let artworks = dedupe_by_title(details.into_iter().flatten().collect());
        tracing::debug!(page, kept = artworks.len(), window = end - start, "museum page fetched");

        Ok(SourceData::Paged(PageResult {
            data: artworks,
            total: object_ids.len(),
            has_more: end < object_ids.len(),
        }))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(rename = "objectIDs")]
    object_ids: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtwork {
    #[serde(rename = "objectID")]
    object_id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist_display_name: String,
    #[serde(default)]
    object_date: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    medium: String,
    #[serde(default)]
    department: String,
    #[serde(default)]
    culture: String,
    #[serde(default)]
    primary_image: String,
    #[serde(default)]
    primary_image_small: String,
    #[serde(default)]
    is_public_domain: bool,
    #[serde(default)]
    is_highlight: bool,
    #[serde(default, rename = "objectURL")]
    object_url: String,
}

/// Resolve one object id to a normalized item; `None` on any failure or
/// when the artwork does not qualify for display.
async fn fetch_detail(client: &Client, object_id: u64, index: usize) -> Option<HotItem> {
    let url = format!("{}/objects/{}", API_BASE, object_id);
    let payload = net::get_json(client, &url, DETAIL_TIMEOUT).await.ok()?;
    let artwork: RawArtwork = serde_json::from_value(payload).ok()?;
    normalize_artwork(artwork, index)
}

fn normalize_artwork(artwork: RawArtwork, index: usize) -> Option<HotItem> {
    if artwork.primary_image.is_empty() || !artwork.is_public_domain {
        return None;
    }

    let desc_parts: Vec<&str> = [
        artwork.artist_display_name.as_str(),
        artwork.object_date.as_str(),
        artwork.country.as_str(),
        artwork.medium.as_str(),
        artwork.department.as_str(),
        artwork.culture.as_str(),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect();

    let img = if artwork.primary_image_small.is_empty() {
        artwork.primary_image.clone()
    } else {
        artwork.primary_image_small.clone()
    };
    let url = if artwork.object_url.is_empty() {
        format!(
            "https://www.metmuseum.org/art/collection/search/{}",
            artwork.object_id
        )
    } else {
        artwork.object_url.clone()
    };

    Some(HotItem {
        index,
        title: if artwork.title.is_empty() {
            "Untitled".to_string()
        } else {
            artwork.title.clone()
        },
        desc: desc_parts.join(" · "),
        img,
        url,
        hot: if artwork.is_highlight {
            "⭐ 精选".to_string()
        } else {
            String::new()
        },
    })
}
