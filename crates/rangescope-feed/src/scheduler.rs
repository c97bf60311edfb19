//! Periodic re-crawl feeding the server's hub and cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::cache::save_cache;
use crate::crawler::{Crawler, CrawlerConfig};
use crate::error::FeedError;
use crate::server::FeedHub;

#[derive(Debug, Clone)]
pub struct CrawlSchedule {
    pub crawler: CrawlerConfig,
    pub interval: Duration,
    /// Crawl once at startup instead of waiting a full interval.
    pub run_on_start: bool,
}

impl Default for CrawlSchedule {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            interval: Duration::from_secs(30 * 60),
            run_on_start: false,
        }
    }
}

/// Crawl once and publish the result. The cache file is rewritten only when
/// the catalog differs from the hub's current snapshot; returns whether it did.
pub async fn crawl_and_publish(
    crawler: &Crawler,
    hub: &FeedHub,
    cache_path: &Path,
) -> Result<bool, FeedError> {
    let catalog = crawler.crawl().await?;
    if !hub.publish(&catalog)? {
        tracing::info!("crawl found no new data");
        return Ok(false);
    }

    let path = cache_path.to_path_buf();
    tokio::task::spawn_blocking(move || save_cache(&path, &catalog)).await??;
    Ok(true)
}

/// Re-crawl every `interval` until the task is dropped. A failed crawl is
/// logged and the previous catalog stays published.
pub async fn run_crawl_schedule(
    crawler: Crawler,
    hub: Arc<FeedHub>,
    cache_path: PathBuf,
    interval: Duration,
    run_on_start: bool,
) {
    let interval = interval.max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    if !run_on_start {
        ticker.tick().await;
    }
    tracing::info!(
        root = %crawler.config().root_prefix,
        interval_secs = interval.as_secs(),
        run_on_start,
        "crawl schedule started"
    );

    loop {
        ticker.tick().await;
        if let Err(err) = crawl_and_publish(&crawler, &hub, &cache_path).await {
            tracing::warn!(error = %err, "crawl failed; keeping previous catalog");
        }
    }
}
