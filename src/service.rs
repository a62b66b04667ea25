//! The fetch pipeline
//!
//! [`HotDataService::get_hot_data`] is the one entry point callers use. Per
//! request it runs, in order: cache lookup, throttle check, in-flight
//! deduplication, retried fetch, cache write, pagination. A cache hit skips
//! everything after the lookup, including the throttle, so repeated reads of
//! warm data are never rejected.
//!
//! Sources come in two cache scopes. Full-list sources are fetched whole,
//! cached whole, and sliced locally per request; origin-paginated sources
//! are fetched and cached one page window at a time. Each scope has its own
//! coordinator because the two cache different value types.

use std::sync::Arc;

use crate::cache::{CacheStats, CacheStore};
use crate::config::ApiConfig;
use crate::coordinator::RequestCoordinator;
use crate::data::{paginate, HotItem, PageResult};
use crate::error::ApiError;
use crate::retry;
use crate::sources::{CacheScope, SourceData, SourceRegistry};

/// Per-request knobs; `Default` matches a plain first-page read.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// 1-based page to serve; 0 is treated as 1
    pub page: usize,
    /// Page size override
    pub page_size: Option<usize>,
    /// Source-specific refinement (the museum geo filter)
    pub filter: Option<String>,
    /// Skip the cache read; the fetched result still gets cached
    pub force_refresh: bool,
}

/// Reduces a user-supplied filter to a cache-key-safe token.
///
/// Cache keys reserve `':'` and the disk tier reserves `'+'` in filenames,
/// so anything outside a conservative alphanumeric set is flattened to
/// `'_'`. The raw filter still goes to the source untouched; only the key
/// is sanitized.
fn sanitize_key_component(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub struct HotDataService {
    store: Arc<CacheStore>,
    config: ApiConfig,
    registry: SourceRegistry,
    list_coordinator: RequestCoordinator<Vec<HotItem>>,
    page_coordinator: RequestCoordinator<PageResult>,
}

impl HotDataService {
    pub fn new(store: CacheStore, config: ApiConfig, registry: SourceRegistry) -> Self {
        Self {
            store: Arc::new(store),
            config,
            registry,
            list_coordinator: RequestCoordinator::new(),
            page_coordinator: RequestCoordinator::new(),
        }
    }

    /// One page of hot data for `source_id`.
    pub async fn get_hot_data(
        &self,
        source_id: &str,
        options: &FetchOptions,
    ) -> Result<PageResult, ApiError> {
        let source = self
            .registry
            .get(source_id)
            .ok_or_else(|| ApiError::UnknownSource(source_id.to_string()))?;

        let page = options.page.max(1);
        let page_size = options.page_size.unwrap_or(self.config.default_page_size);
        let filter_suffix = options
            .filter
            .as_deref()
            .map(|f| format!("_{}", sanitize_key_component(f)))
            .unwrap_or_default();

        match source.cache_scope() {
            CacheScope::FullList => {
                let sub_key = format!("list{}", filter_suffix);

                if !options.force_refresh {
                    if let Some(items) = self.store.get::<Vec<HotItem>>(source_id, &sub_key) {
                        return Ok(paginate(&items, page, page_size));
                    }
                }

                if !self
                    .list_coordinator
                    .can_proceed(source_id, self.config.min_request_interval)
                {
                    return Err(ApiError::Throttled);
                }

                let flight_key = format!("{}_{}", source_id, sub_key);
                let flight = self.list_coordinator.dedupe(&flight_key, || {
                    let source = Arc::clone(&source);
                    let store = Arc::clone(&self.store);
                    let policy = source.retry_policy();
                    let ttl = self.config.ttl_for(source_id);
                    let source_id = source_id.to_string();
                    let sub_key = sub_key.clone();
                    let filter = options.filter.clone();

                    async move {
                        let data = retry::retry_request_with(
                            &policy,
                            |_attempt| {
                                let source = Arc::clone(&source);
                                let filter = filter.clone();
                                async move { source.fetch(page, page_size, filter.as_deref()).await }
                            },
                            |error| source.should_retry(error),
                        )
                        .await?;

                        match data {
                            SourceData::FullList(items) => {
                                store.set(&source_id, &sub_key, &items, ttl);
                                Ok(items)
                            }
                            SourceData::Paged(_) => Err(ApiError::MalformedResponse(
                                "full-list source produced a page window".to_string(),
                            )),
                        }
                    }
                });

                let items = flight.await?;
                Ok(paginate(&items, page, page_size))
            }

            CacheScope::PerPage => {
                let sub_key = format!("page_{}_{}{}", page, page_size, filter_suffix);

                if !options.force_refresh {
                    if let Some(result) = self.store.get::<PageResult>(source_id, &sub_key) {
                        return Ok(result);
                    }
                }

                if !self
                    .page_coordinator
                    .can_proceed(source_id, self.config.min_request_interval)
                {
                    return Err(ApiError::Throttled);
                }

                let flight_key = format!("{}_{}", source_id, sub_key);
                let flight = self.page_coordinator.dedupe(&flight_key, || {
                    let source = Arc::clone(&source);
                    let store = Arc::clone(&self.store);
                    let policy = source.retry_policy();
                    let ttl = self.config.ttl_for(source_id);
                    let source_id = source_id.to_string();
                    let sub_key = sub_key.clone();
                    let filter = options.filter.clone();

                    async move {
                        let data = retry::retry_request_with(
                            &policy,
                            |_attempt| {
                                let source = Arc::clone(&source);
                                let filter = filter.clone();
                                async move { source.fetch(page, page_size, filter.as_deref()).await }
                            },
                            |error| source.should_retry(error),
                        )
                        .await?;

                        match data {
                            SourceData::Paged(result) => {
                                store.set(&source_id, &sub_key, &result, ttl);
                                Ok(result)
                            }
                            SourceData::FullList(_) => Err(ApiError::MalformedResponse(
                                "origin-paginated source produced a full list".to_string(),
                            )),
                        }
                    }
                });

                flight.await
            }
        }
    }

    /// Drops all cached entries for one source.
    pub fn invalidate(&self, source_id: &str) {
        self.store.invalidate_source(source_id);
    }

    /// Drops the entire cache.
    pub fn clear_cache(&self) {
        self.store.clear_all();
    }

    /// Removes expired persisted records; returns how many went.
    pub fn sweep_expired(&self) -> usize {
        self.store.sweep_expired()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn default_page_size(&self) -> usize {
        self.config.default_page_size
    }
}
