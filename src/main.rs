//! hotwave - trending topics from dozens of platforms, in your terminal

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use hotwave::cache::{CacheStore, DiskStorage};
use hotwave::cli::{self, CacheAction, Cli, Command};
use hotwave::config::ApiConfig;
use hotwave::error::ApiError;
use hotwave::service::{FetchOptions, HotDataService};
use hotwave::sources::{self, SourceRegistry};

fn build_service(config: &ApiConfig) -> Result<HotDataService, reqwest::Error> {
    let store = match DiskStorage::new() {
        Some(disk) => CacheStore::new(Box::new(disk)),
        None => {
            tracing::warn!("no cache directory available, caching in memory only");
            CacheStore::in_memory()
        }
    };

    let client = reqwest::Client::builder()
        .user_agent(concat!("hotwave/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let registry = SourceRegistry::with_defaults(client, config);

    Ok(HotDataService::new(store, config.clone(), registry))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    let config = ApiConfig::default();
    let service = match build_service(&config) {
        Ok(service) => service,
        Err(error) => {
            eprintln!("failed to initialize http client: {}", error);
            return ExitCode::FAILURE;
        }
    };

    // Startup sweep: expired persisted records go before any command runs.
    service.sweep_expired();

    match args.command {
        Command::Fetch {
            platform,
            page,
            page_size,
            filter,
            refresh,
            json,
        } => {
            let Some(entry) = sources::get_platform(&platform) else {
                eprintln!(
                    "unknown platform: {} (run `hotwave platforms` for the list)",
                    platform
                );
                return ExitCode::FAILURE;
            };

            let options = FetchOptions {
                page,
                page_size,
                filter,
                force_refresh: refresh,
            };

            match service.get_hot_data(&platform, &options).await {
                Ok(result) => {
                    if json {
                        match serde_json::to_string_pretty(&result) {
                            Ok(encoded) => println!("{}", encoded),
                            Err(error) => {
                                eprintln!("failed to encode result: {}", error);
                                return ExitCode::FAILURE;
                            }
                        }
                    } else {
                        print!("{}", cli::render_page(entry.name, page, &result));
                    }
                    ExitCode::SUCCESS
                }
                // Throttled means "asked again too soon": a quiet no-op.
                Err(ApiError::Throttled) => {
                    eprintln!("{}", ApiError::Throttled);
                    ExitCode::SUCCESS
                }
                Err(error) => {
                    eprintln!("{}", error);
                    ExitCode::FAILURE
                }
            }
        }

        Command::Platforms { category } => {
            let list = sources::platforms_in_category(category.as_deref());
            if list.is_empty() {
                eprintln!(
                    "no platforms in category: {}",
                    category.as_deref().unwrap_or("")
                );
                return ExitCode::FAILURE;
            }
            print!("{}", cli::render_platforms(&list));
            ExitCode::SUCCESS
        }

        Command::Cache { action } => match action {
            CacheAction::Stats => {
                print!("{}", cli::render_cache_stats(&service.cache_stats()));
                ExitCode::SUCCESS
            }
            CacheAction::Clear { platform } => {
                match platform {
                    Some(id) => {
                        service.invalidate(&id);
                        println!("cleared cache for {}", id);
                    }
                    None => {
                        service.clear_cache();
                        println!("cache cleared");
                    }
                }
                ExitCode::SUCCESS
            }
        },
    }
}
