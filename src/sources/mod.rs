//! Upstream source adapters and the platform catalog
//!
//! Every upstream is wrapped in a [`HotSource`] implementation that fetches
//! raw payloads and normalizes them into the shared [`HotItem`] model. The
//! service layer never sees source-specific shapes; it dispatches by source
//! id through a [`SourceRegistry`].

pub mod artic;
pub mod books;
pub mod hotboard;
pub mod metmuseum;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::ApiConfig;
use crate::data::{HotItem, PageResult};
use crate::error::ApiError;
use crate::retry::RetryPolicy;

/// One entry in the platform catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub id: &'static str,
    pub name: &'static str,
    pub category: &'static str,
}

/// Supported platforms, in display order.
pub const PLATFORMS: &[Platform] = &[
    Platform { id: "bilibili", name: "B站", category: "视频" },
    Platform { id: "acfun", name: "AcFun", category: "视频" },
    Platform { id: "weibo", name: "微博", category: "社交" },
    Platform { id: "zhihu", name: "知乎", category: "社交" },
    Platform { id: "zhihu-daily", name: "知乎日报", category: "社交" },
    Platform { id: "douyin", name: "抖音", category: "视频" },
    Platform { id: "kuaishou", name: "快手", category: "视频" },
    Platform { id: "douban-movie", name: "豆瓣电影", category: "娱乐" },
    Platform { id: "douban-group", name: "豆瓣小组", category: "娱乐" },
    Platform { id: "tieba", name: "贴吧", category: "社交" },
    Platform { id: "hupu", name: "虎扑", category: "生活" },
    Platform { id: "ngabbs", name: "NGA", category: "游戏" },
    Platform { id: "v2ex", name: "V2EX", category: "科技" },
    Platform { id: "52pojie", name: "吾爱破解", category: "科技" },
    Platform { id: "hostloc", name: "主机交流", category: "科技" },
    Platform { id: "coolapk", name: "酷安", category: "科技" },
    Platform { id: "baidu", name: "百度", category: "综合" },
    Platform { id: "thepaper", name: "澎湃新闻", category: "资讯" },
    Platform { id: "toutiao", name: "今日头条", category: "资讯" },
    Platform { id: "qq-news", name: "腾讯新闻", category: "资讯" },
    Platform { id: "sina", name: "新浪热搜", category: "资讯" },
    Platform { id: "sina-news", name: "新浪新闻", category: "资讯" },
    Platform { id: "netease-news", name: "网易新闻", category: "资讯" },
    Platform { id: "huxiu", name: "虎嗅", category: "资讯" },
    Platform { id: "ifanr", name: "爱范儿", category: "资讯" },
    Platform { id: "sspai", name: "少数派", category: "科技" },
    Platform { id: "ithome", name: "IT之家", category: "科技" },
    Platform { id: "ithome-xijiayi", name: "IT之家·喜加一", category: "科技" },
    Platform { id: "juejin", name: "掘金", category: "科技" },
    Platform { id: "jianshu", name: "简书", category: "综合" },
    Platform { id: "guokr", name: "果壳", category: "科技" },
    Platform { id: "36kr", name: "36氪", category: "科技" },
    Platform { id: "51cto", name: "51CTO", category: "科技" },
    Platform { id: "csdn", name: "CSDN", category: "科技" },
    Platform { id: "nodeseek", name: "NodeSeek", category: "科技" },
    Platform { id: "lol", name: "英雄联盟", category: "游戏" },
    Platform { id: "genshin", name: "原神", category: "游戏" },
    Platform { id: "honkai", name: "崩坏3", category: "游戏" },
    Platform { id: "starrail", name: "星穹铁道", category: "游戏" },
    Platform { id: "weread", name: "微信读书", category: "阅读" },
    Platform { id: "hellogithub", name: "HelloGitHub", category: "科技" },
    Platform { id: "zhuishu", name: "追书神器", category: "阅读" },
    Platform { id: "metmuseum", name: "大都会博物馆", category: "艺术" },
    Platform { id: "artic", name: "芝加哥艺术学院", category: "艺术" },
];

/// Looks up a catalog entry by id.
pub fn get_platform(id: &str) -> Option<&'static Platform> {
    PLATFORMS.iter().find(|p| p.id == id)
}

/// Catalog entries for one category, or all of them.
pub fn platforms_in_category(category: Option<&str>) -> Vec<&'static Platform> {
    match category {
        None => PLATFORMS.iter().collect(),
        Some(c) => PLATFORMS.iter().filter(|p| p.category == c).collect(),
    }
}

/// Distinct categories, sorted.
pub fn categories() -> Vec<&'static str> {
    let mut cats: Vec<&'static str> = PLATFORMS.iter().map(|p| p.category).collect();
    cats.sort_unstable();
    cats.dedup();
    cats
}

/// How a source's results are cached and sliced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheScope {
    /// One upstream call yields the whole list; pagination is local and the
    /// full normalized list is what gets cached.
    FullList,
    /// The upstream paginates itself; each page window is cached as served.
    PerPage,
}

/// What a fetch produced, matching the source's [`CacheScope`].
#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    FullList(Vec<HotItem>),
    Paged(PageResult),
}

/// A fetchable upstream source.
#[async_trait]
pub trait HotSource: Send + Sync {
    /// Stable source id, also the cache key prefix.
    fn id(&self) -> &str;

    fn cache_scope(&self) -> CacheScope;

    /// Retry budget for this source's fetches.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Retry-eligibility override; defaults to the shared taxonomy.
    fn should_retry(&self, error: &ApiError) -> bool {
        error.is_retryable()
    }

    /// One fetch attempt. `filter` is a source-specific refinement (the
    /// museum geo filter); sources that do not understand it ignore it.
    async fn fetch(
        &self,
        page: usize,
        page_size: usize,
        filter: Option<&str>,
    ) -> Result<SourceData, ApiError>;
}

/// Id-indexed set of source adapters.
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn HotSource>>,
}

impl SourceRegistry {
    /// An empty registry; tests insert mock sources.
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    /// Registry covering every catalog platform.
    ///
    /// Generic hot-board platforms share one adapter type parameterized by
    /// id; the three special upstreams get their dedicated adapters.
    pub fn with_defaults(client: Client, config: &ApiConfig) -> Self {
        let mut registry = Self::new();

        for platform in PLATFORMS {
            let source: Arc<dyn HotSource> = match platform.id {
                "zhuishu" => Arc::new(books::BookRankingSource::new(
                    client.clone(),
                    config.timeout_for("zhuishu"),
                )),
                "metmuseum" => Arc::new(metmuseum::MetMuseumSource::new(
                    client.clone(),
                    config.timeout_for("metmuseum"),
                )),
                "artic" => Arc::new(artic::ArticSource::new(
                    client.clone(),
                    config.timeout_for("artic"),
                )),
                id => Arc::new(hotboard::HotBoardSource::new(
                    id,
                    client.clone(),
                    config.timeout_for(id),
                )),
            };
            registry.insert(source);
        }

        registry
    }

    pub fn insert(&mut self, source: Arc<dyn HotSource>) {
        self.sources.insert(source.id().to_string(), source);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn HotSource>> {
        self.sources.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
