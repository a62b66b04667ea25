//! Core data models for hot-list aggregation
//!
//! Every upstream source, whatever its native payload shape, is normalized
//! into a flat list of [`HotItem`]s and served to callers as a [`PageResult`].

use serde::{Deserialize, Serialize};

/// One normalized trending entry.
///
/// `index` is 1-based within the full unsliced result and stays stable under
/// local pagination. Origin-paginated sources offset-adjust it so it remains
/// globally monotonic across pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotItem {
    /// 1-based rank within the full list
    pub index: usize,
    /// Entry title
    pub title: String,
    /// Short description, empty when the source provides none
    #[serde(default)]
    pub desc: String,
    /// Image URL, empty when the source provides none
    #[serde(default)]
    pub img: String,
    /// Link to the entry
    #[serde(default)]
    pub url: String,
    /// Popularity value as the source reports it (free-form string)
    #[serde(default)]
    pub hot: String,
}

/// One page of normalized results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// Items visible on this page
    pub data: Vec<HotItem>,
    /// Total item count as the source reports it
    pub total: usize,
    /// Whether another page window exists beyond this one
    pub has_more: bool,
}

impl PageResult {
    /// An empty result with nothing beyond it.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            has_more: false,
        }
    }
}

/// Deterministic offset/limit slicing over a fully fetched list.
///
/// `total` is always the full list length; `has_more` compares the page end
/// offset against it. Pages are 1-based. Not applied to origin-paginated
/// sources, whose own page window is authoritative.
pub fn paginate(full: &[HotItem], page: usize, page_size: usize) -> PageResult {
    let start = page.saturating_sub(1).saturating_mul(page_size);
    let end = start.saturating_add(page_size).min(full.len());
    let data = if start < full.len() {
        full[start..end].to_vec()
    } else {
        Vec::new()
    };

    PageResult {
        data,
        total: full.len(),
        has_more: page.saturating_mul(page_size) < full.len(),
    }
}

/// Drop later duplicates by case-insensitive trimmed title; the first
/// occurrence wins.
pub fn dedupe_by_title(items: Vec<HotItem>) -> Vec<HotItem> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.title.trim().to_lowercase()))
        .collect()
}
