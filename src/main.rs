use std::sync::Arc;
use std::time::Duration;

use news_cache::error::{AppError, Result};
use news_cache::{
    ArticleId, ArticleStore, CacheSettings, Config, FeedCache, NewsApiClient, NewsCategory,
    RemoteSource, SampleSource, Snapshot,
};

const USAGE: &str = "usage: news-cache [--refresh [category] | --search <query> | --bookmarks | \
                     --bookmark <id> | --offline <id> | --evict]";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (only show warnings and errors by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::load()?;

    let remote: Arc<dyn RemoteSource> = match config.api_key() {
        Some(key) => Arc::new(NewsApiClient::new(&config, key.to_string())?),
        None => {
            tracing::warn!(
                "No api_key in {:?}, serving sample headlines",
                Config::config_path()
            );
            Arc::new(SampleSource::new())
        }
    };

    let store = ArticleStore::open(&config.db_path).await?;
    let cache = FeedCache::new(store, remote, CacheSettings::from(&config));
    let settle = Duration::from_secs(config.request_timeout_secs)
        + Duration::from_millis(config.search_debounce_ms);

    match args.first().map(String::as_str) {
        None => {
            let snapshot = cache.get_by_category(None, false).await;
            let snapshot = if snapshot.refreshing {
                cache
                    .wait_for_refresh(&cache.visible().view)
                    .await
                    .unwrap_or(snapshot)
            } else {
                snapshot
            };
            print_snapshot(&snapshot);
        }
        Some("--refresh") => {
            let category = args
                .get(1)
                .map(|c| c.parse::<NewsCategory>())
                .transpose()?;
            let snapshot = cache
                .get_by_category(category.map(NewsCategory::as_str), true)
                .await;
            print_snapshot(&snapshot);
        }
        Some("--search") => {
            let query = args.get(1).ok_or_else(usage_error)?;
            let mut updates = cache.subscribe();
            let mut snapshot = cache.search(query).await;

            // Wait for the remote half of the search to land
            while snapshot.refreshing {
                match tokio::time::timeout(settle, updates.changed()).await {
                    Ok(Ok(())) => snapshot = updates.borrow_and_update().snapshot.clone(),
                    _ => break,
                }
            }
            print_snapshot(&snapshot);
        }
        Some("--bookmarks") => {
            print_snapshot(&cache.bookmarks().await);
        }
        Some(flag @ ("--bookmark" | "--offline")) => {
            let id = args
                .get(1)
                .and_then(|id| id.parse::<i64>().ok())
                .map(ArticleId::from)
                .ok_or_else(usage_error)?;
            let result = if flag == "--bookmark" {
                cache.toggle_bookmark(id).await
            } else {
                cache.toggle_offline(id).await
            };
            if let Err(advisory) = result {
                eprintln!("Warning: {}", advisory);
            }
        }
        Some("--evict") => match cache.evict_expired().await {
            Ok(removed) => println!("Removed {} articles", removed),
            Err(advisory) => eprintln!("Warning: {}", advisory),
        },
        Some(_) => return Err(usage_error()),
    }

    Ok(())
}

fn usage_error() -> AppError {
    AppError::InvalidArgument(USAGE.to_string())
}

fn print_snapshot(snapshot: &Snapshot) {
    if let Some(advisory) = &snapshot.advisory {
        eprintln!("Warning: {}", advisory);
    }

    for article in &snapshot.articles {
        let mut marks = String::new();
        if article.is_bookmarked {
            marks.push('*');
        }
        if article.is_saved_for_offline {
            marks.push('o');
        }
        println!(
            "{:>6} {:<2} {}  {}  [{}]",
            article.id,
            marks,
            article.published_at.format("%Y-%m-%d %H:%M"),
            article.title,
            article.source
        );
    }
    println!("{} articles", snapshot.articles.len());
}
