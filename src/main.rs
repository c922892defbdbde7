use anyhow::Result;
use dotenvy::dotenv;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cinefeed::docstore::AppwriteClient;
use cinefeed::feed::{FeedController, FeedFilter};
use cinefeed::models::SearchHit;
use cinefeed::tmdb::{KindFilter, TmdbApi, TmdbClient};
use cinefeed::trending::{dedupe_last_wins, TrendingStore, CAROUSEL_LIMIT};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn check_env() -> Result<()> {
    let required = [
        "TMDB_API_KEY",
        "APPWRITE_ENDPOINT",
        "APPWRITE_PROJECT_ID",
        "APPWRITE_API_KEY",
        "APPWRITE_DATABASE_ID",
        "APPWRITE_TRENDING_COLLECTION_ID",
        "APPWRITE_SAVED_COLLECTION_ID",
    ];
    for key in required {
        if env::var(key).is_err() {
            anyhow::bail!("Missing required environment variable: {}", key);
        }
    }
    info!("All required environment variables are set");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    match dotenv() {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }
    check_env()?;

    let tmdb: Arc<dyn TmdbApi> = Arc::new(TmdbClient::from_env()?);
    let docs = Arc::new(AppwriteClient::from_env()?);
    let trending = TrendingStore::from_env(docs)?;

    let query = env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.is_empty() {
        let carousel = dedupe_last_wins(trending.top_trending(CAROUSEL_LIMIT).await);
        if !carousel.is_empty() {
            println!("Trending searches:");
            for record in carousel {
                println!("  {:>4}x  {} [{}]", record.count, record.title, record.media_type);
            }
            println!();
        }

        let mut feed = FeedController::new(tmdb);
        feed.reset(FeedFilter::default()).await?;
        println!("This week:");
        for item in feed.items() {
            println!(
                "  {:>4.1}  {} ({})",
                item.vote_average,
                item.display_title,
                item.primary_date.as_deref().unwrap_or("?")
            );
        }
    } else {
        let page = tmdb.search_or_trending(&query, 1, KindFilter::All).await?;
        let hits: Vec<SearchHit> = page.results.into_iter().map(SearchHit::Media).collect();
        trending.record_search_hit(&query, hits.first()).await;

        println!("Results for '{}':", query);
        for hit in &hits {
            if let Some(item) = hit.as_media() {
                println!(
                    "  {:>4.1}  {} [{}]",
                    item.vote_average,
                    item.display_title,
                    item.kind.as_str()
                );
            }
        }
    }
    Ok(())
}
