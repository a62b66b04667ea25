//! Command-line interface for hotwave
//!
//! Argument parsing with clap and the plain-text renderers for the two
//! output formats. Rendering is kept here as pure functions so it can be
//! tested without touching the network.

use clap::{Parser, Subcommand};

use crate::cache::CacheStats;
use crate::data::PageResult;
use crate::sources::Platform;

/// hotwave - trending topics from dozens of platforms, in your terminal
#[derive(Parser, Debug)]
#[command(name = "hotwave")]
#[command(about = "Fetch trending topics, book rankings and museum highlights")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch one page of hot data for a platform
    Fetch {
        /// Platform id (see `hotwave platforms`)
        platform: String,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Items per page
        #[arg(long, value_name = "N")]
        page_size: Option<usize>,
        /// Source-specific filter (e.g. a geographic region for metmuseum)
        #[arg(long)]
        filter: Option<String>,
        /// Skip the cache and fetch fresh data
        #[arg(long)]
        refresh: bool,
        /// Emit the page as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List supported platforms
    Platforms {
        /// Only platforms in this category
        #[arg(long)]
        category: Option<String>,
    },
    /// Inspect or clear the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache occupancy
    Stats,
    /// Drop cached entries, for one platform or all of them
    Clear {
        /// Platform id; omit to clear everything
        platform: Option<String>,
    },
}

/// Renders one result page as aligned text.
pub fn render_page(platform_name: &str, page: usize, result: &PageResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} - page {} ({} items, {} total{})\n",
        platform_name,
        page,
        result.data.len(),
        result.total,
        if result.has_more { ", more available" } else { "" }
    ));

    for item in &result.data {
        out.push_str(&format!("{:>4}. {}", item.index, item.title));
        if !item.hot.is_empty() {
            out.push_str(&format!("  [{}]", item.hot));
        }
        out.push('\n');
        if !item.desc.is_empty() {
            out.push_str(&format!("      {}\n", item.desc));
        }
        if !item.url.is_empty() {
            out.push_str(&format!("      {}\n", item.url));
        }
    }

    out
}

/// Renders the platform catalog grouped by category, categories in order
/// of first appearance.
pub fn render_platforms(platforms: &[&Platform]) -> String {
    let mut groups: Vec<(&str, Vec<&Platform>)> = Vec::new();
    for &platform in platforms {
        match groups.iter_mut().find(|(c, _)| *c == platform.category) {
            Some((_, members)) => members.push(platform),
            None => groups.push((platform.category, vec![platform])),
        }
    }

    let mut out = String::new();
    for (i, (category, members)) in groups.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("{}\n", category));
        for platform in members {
            out.push_str(&format!("  {:<16} {}\n", platform.id, platform.name));
        }
    }

    out
}

pub fn render_cache_stats(stats: &CacheStats) -> String {
    format!(
        "memory entries:    {}\npersisted entries: {}\nexpired entries:   {}\n",
        stats.memory_entries, stats.persisted_entries, stats.expired_entries
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::HotItem;

    #[test]
    fn test_parse_fetch_defaults() {
        let cli = Cli::parse_from(["hotwave", "fetch", "weibo"]);
        match cli.command {
            Command::Fetch {
                platform,
                page,
                page_size,
                filter,
                refresh,
                json,
            } => {
                assert_eq!(platform, "weibo");
                assert_eq!(page, 1);
                assert!(page_size.is_none());
                assert!(filter.is_none());
                assert!(!refresh);
                assert!(!json);
            }
            other => panic!("expected fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_fetch_with_options() {
        let cli = Cli::parse_from([
            "hotwave", "fetch", "metmuseum", "--page", "3", "--page-size", "20", "--filter",
            "China", "--refresh", "--json",
        ]);
        match cli.command {
            Command::Fetch {
                page,
                page_size,
                filter,
                refresh,
                json,
                ..
            } => {
                assert_eq!(page, 3);
                assert_eq!(page_size, Some(20));
                assert_eq!(filter.as_deref(), Some("China"));
                assert!(refresh);
                assert!(json);
            }
            other => panic!("expected fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_platforms_with_category() {
        let cli = Cli::parse_from(["hotwave", "platforms", "--category", "游戏"]);
        match cli.command {
            Command::Platforms { category } => assert_eq!(category.as_deref(), Some("游戏")),
            other => panic!("expected platforms, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_cache_clear_platform() {
        let cli = Cli::parse_from(["hotwave", "cache", "clear", "weibo"]);
        match cli.command {
            Command::Cache {
                action: CacheAction::Clear { platform },
            } => assert_eq!(platform.as_deref(), Some("weibo")),
            other => panic!("expected cache clear, got {:?}", other),
        }
    }

    #[test]
    fn test_render_page_layout() {
        let result = PageResult {
            data: vec![
                HotItem {
                    index: 1,
                    title: "First topic".to_string(),
                    desc: "context".to_string(),
                    img: String::new(),
                    url: "https://example.com/1".to_string(),
                    hot: "1.2万".to_string(),
                },
                HotItem {
                    index: 2,
                    title: "Second topic".to_string(),
                    desc: String::new(),
                    img: String::new(),
                    url: String::new(),
                    hot: String::new(),
                },
            ],
            total: 80,
            has_more: true,
        };

        let text = render_page("微博", 1, &result);
        assert!(text.contains("微博 - page 1 (2 items, 80 total, more available)"));
        assert!(text.contains("   1. First topic  [1.2万]"));
        assert!(text.contains("      context"));
        assert!(text.contains("      https://example.com/1"));
        // Optional lines are omitted when empty.
        assert!(text.contains("   2. Second topic\n"));
    }

    #[test]
    fn test_render_page_last_page() {
        let result = PageResult {
            data: vec![],
            total: 10,
            has_more: false,
        };
        let text = render_page("知乎", 5, &result);
        assert!(text.contains("(0 items, 10 total)"));
        assert!(!text.contains("more available"));
    }

    #[test]
    fn test_render_platforms_groups_by_category() {
        let platforms = [
            &Platform { id: "a", name: "A", category: "one" },
            &Platform { id: "b", name: "B", category: "one" },
            &Platform { id: "c", name: "C", category: "two" },
        ];
        let text = render_platforms(&platforms);
        let one_pos = text.find("one\n").unwrap();
        let two_pos = text.find("two\n").unwrap();
        assert!(one_pos < two_pos);
        assert!(text.contains("  a                A\n"));
    }

    #[test]
    fn test_render_cache_stats() {
        let text = render_cache_stats(&CacheStats {
            memory_entries: 3,
            persisted_entries: 5,
            expired_entries: 1,
        });
        assert!(text.contains("memory entries:    3"));
        assert!(text.contains("persisted entries: 5"));
        assert!(text.contains("expired entries:   1"));
    }
}
