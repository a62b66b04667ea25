//! Art Institute of Chicago adapter
//!
//! A single paginated endpoint with server-side filtering for public-domain
//! works. The page is over-fetched (twice the page size, capped at 100)
//! because artworks without an image id are dropped during normalization;
//! the result is truncated back to the requested page size. Image URLs are
//! assembled from the IIIF base the response itself advertises.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::data::{HotItem, PageResult};
use crate::error::ApiError;
use crate::net;
use crate::sources::{CacheScope, HotSource, SourceData};

const API_URL: &str = "https://api.artic.edu/api/v1/artworks";

const FIELDS: &str = "id,title,image_id,artist_display,date_display,medium_display,place_of_origin,dimensions,iiif_url,thumbnail";

/// Server-side filter: public-domain works only.
const QUERY: &str = r#"{"term":{"is_public_domain":true}}"#;

pub struct ArticSource {
    client: Client,
    timeout: Duration,
}

impl ArticSource {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl HotSource for ArticSource {
    fn id(&self) -> &str {
        "artic"
    }

    fn cache_scope(&self) -> CacheScope {
        CacheScope::PerPage
    }

    async fn fetch(
        &self,
        page: usize,
        page_size: usize,
        _filter: Option<&str>,
    ) -> Result<SourceData, ApiError> {
        let limit = (page_size * 2).min(100);
        let encoded_query: String =
            url::form_urlencoded::byte_serialize(QUERY.as_bytes()).collect();
        let url = format!(
            "{}?limit={}&page={}&fields={}&query={}",
            API_URL, limit, page, FIELDS, encoded_query
        );

        let payload = net::get_json(&self.client, &url, self.timeout).await?;
        let result = parse_artic_page(&payload, page, page_size)?;
        tracing::debug!(page, count = result.data.len(), total = result.total, "artic page fetched");
        Ok(SourceData::Paged(result))
    }
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    data: Vec<RawArtwork>,
    #[serde(default)]
    config: RawConfig,
    #[serde(default)]
    pagination: RawPagination,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    iiif_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawPagination {
    #[serde(default)]
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawArtwork {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    image_id: Option<String>,
    #[serde(default)]
    artist_display: Option<String>,
    #[serde(default)]
    date_display: Option<String>,
    #[serde(default)]
    medium_display: Option<String>,
    #[serde(default)]
    place_of_origin: Option<String>,
}

/// Normalize one artworks page.
///
/// Indices continue the global ordering: item `i` of page `p` gets
/// `(p - 1) * page_size + i + 1`, counted over the kept artworks.
pub fn parse_artic_page(
    payload: &serde_json::Value,
    page: usize,
    page_size: usize,
) -> Result<PageResult, ApiError> {
    let response: RawResponse = serde_json::from_value(payload.clone())
        .map_err(|e| ApiError::MalformedResponse(format!("artworks payload: {}", e)))?;

    let iiif_base = response
        .config
        .iiif_url
        .unwrap_or_else(|| "https://www.artic.edu/iiif/2".to_string());

    let mut items: Vec<HotItem> = response
        .data
        .into_iter()
        .filter(|artwork| artwork.image_id.is_some())
        .enumerate()
        .map(|(i, artwork)| {
            let image_id = artwork.image_id.unwrap_or_default();
            let title = artwork
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Untitled".to_string());
            let desc_parts: Vec<String> = [
                artwork.artist_display,
                artwork.date_display,
                artwork.medium_display,
                artwork.place_of_origin,
            ]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();

            let slug: String = url::form_urlencoded::byte_serialize(
                title.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-").as_bytes(),
            )
            .collect();

            HotItem {
                index: page.saturating_sub(1) * page_size + i + 1,
                title: title.clone(),
                desc: desc_parts.join(" · "),
                img: format!("{}/{}/full/843,/0/default.jpg", iiif_base, image_id),
                url: format!("https://www.artic.edu/artworks/{}/{}", artwork.id, slug),
                hot: String::new(),
            }
        })
        .collect();

    let total = response.pagination.total.unwrap_or(items.len());
    let has_more = page * page_size < total;
    items.truncate(page_size);

    Ok(PageResult {
        data: items,
        total,
        has_more,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> serde_json::Value {
        serde_json::json!({
            "pagination": { "total": 120000, "limit": 4, "current_page": 2 },
            "data": [
                {
                    "id": 27992,
                    "title": "A Sunday on La Grande Jatte",
                    "image_id": "1adf2696-8489-499b-cad2-821d7fde4b33",
                    "artist_display": "Georges Seurat",
                    "date_display": "1884-86",
                    "medium_display": "Oil on canvas",
                    "place_of_origin": "France"
                },
                {
                    "id": 11111,
                    "title": "No Image Here",
                    "image_id": null,
                    "artist_display": "Unknown"
                },
                {
                    "id": 22222,
                    "title": null,
                    "image_id": "deadbeef",
                    "artist_display": null,
                    "date_display": ""
                }
            ],
            "config": { "iiif_url": "https://www.artic.edu/iiif/2" }
        })
    }

    #[test]
    fn test_parse_filters_and_offsets_indices() {
        let result = parse_artic_page(&fixture(), 2, 50).expect("should parse");
        // One artwork has no image id and is dropped.
        assert_eq!(result.data.len(), 2);
        // Page 2 with page size 50: kept items continue the global ordering.
        assert_eq!(result.data[0].index, 51);
        assert_eq!(result.data[1].index, 52);
        assert_eq!(result.total, 120000);
        assert!(result.has_more);
    }

    #[test]
    fn test_parse_builds_iiif_image_url() {
        let result = parse_artic_page(&fixture(), 1, 50).expect("should parse");
        assert_eq!(
            result.data[0].img,
            "https://www.artic.edu/iiif/2/1adf2696-8489-499b-cad2-821d7fde4b33/full/843,/0/default.jpg"
        );
        assert_eq!(
            result.data[0].desc,
            "Georges Seurat · 1884-86 · Oil on canvas · France"
        );
    }

    #[test]
    fn test_parse_untitled_artwork() {
        let result = parse_artic_page(&fixture(), 1, 50).expect("should parse");
        assert_eq!(result.data[1].title, "Untitled");
        assert!(result.data[1].url.starts_with("https://www.artic.edu/artworks/22222/"));
    }

    #[test]
    fn test_parse_truncates_overfetch() {
        let result = parse_artic_page(&fixture(), 1, 1).expect("should parse");
        assert_eq!(result.data.len(), 1);
        assert!(result.has_more);
    }

    #[test]
    fn test_parse_last_page() {
        let mut payload = fixture();
        payload["pagination"]["total"] = serde_json::json!(60);
        let result = parse_artic_page(&payload, 2, 50).expect("should parse");
        // 2 * 50 >= 60: nothing beyond this page.
        assert!(!result.has_more);
    }

    #[test]
    fn test_parse_empty_data() {
        let payload = serde_json::json!({ "data": [], "config": {}, "pagination": {} });
        let result = parse_artic_page(&payload, 1, 50).expect("should parse");
        assert!(result.data.is_empty());
        assert_eq!(result.total, 0);
        assert!(!result.has_more);
    }
}
