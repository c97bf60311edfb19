//! Catalog crawler for the public futures data archive.
//!
//! Walks `root_prefix` three levels deep (frequency, category, instrument)
//! with delimiter listings. An instrument whose listing has sub-directories
//! is Indexed (one range per timeframe directory); otherwise the dates in its
//! own file names give a Direct range. Entries keep listing order.
//!
//! Requests share one client, are capped at `concurrency` in flight, and
//! each waits `request_delay` first. Any failed request fails the crawl.

use std::time::{Duration, Instant};

use futures_util::future::try_join_all;
use rangescope_catalog::{Catalog, CategoryMap, InstrumentMap, Leaf};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Client;
use tokio::sync::Semaphore;

use crate::error::FeedError;
use crate::listing::{child_names, DateGranularity, ListingPage, ListingParser};

#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Page that announces the bucket endpoint as `BUCKET_URL = '...'`.
    pub index_url: String,
    /// Skip discovery and list this bucket directly.
    pub bucket_url: Option<String>,
    pub root_prefix: String,
    /// Instruments kept per category, in listing order. `None` keeps all.
    pub instrument_limit: Option<usize>,
    pub concurrency: usize,
    pub request_delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            index_url: "https://data.binance.vision/?prefix=data/futures/um/".to_string(),
            bucket_url: None,
            root_prefix: "data/futures/um/".to_string(),
            instrument_limit: Some(10),
            concurrency: 10,
            request_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(15),
            user_agent: format!("rangescope/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub struct Crawler {
    client: Client,
    config: CrawlerConfig,
    parser: ListingParser,
    permits: Semaphore,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> Result<Self, FeedError> {
        Ok(Self {
            client: build_http_client(&config.user_agent, config.timeout)?,
            parser: ListingParser::new()?,
            permits: Semaphore::new(config.concurrency.max(1)),
            config,
        })
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Build a fresh catalog from the archive.
    pub async fn crawl(&self) -> Result<Catalog, FeedError> {
        let started = Instant::now();
        let bucket = self.bucket_url().await?;
        let root = self.config.root_prefix.as_str();

        let frequencies = self.children(&bucket, root).await?;
        let crawled = try_join_all(
            frequencies
                .iter()
                .map(|frequency| self.crawl_frequency(&bucket, frequency)),
        )
        .await?;

        let catalog = Catalog::from_frequencies(frequencies.into_iter().zip(crawled).collect());
        let stats = catalog.stats();
        tracing::info!(
            frequencies = stats.frequencies,
            categories = stats.categories,
            instruments = stats.instruments,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "crawl finished"
        );
        Ok(catalog)
    }

    async fn crawl_frequency(&self, bucket: &str, frequency: &str) -> Result<CategoryMap, FeedError> {
        let prefix = format!("{}{frequency}/", self.config.root_prefix);
        let categories = self.children(bucket, &prefix).await?;
        let crawled = try_join_all(
            categories
                .iter()
                .map(|category| self.crawl_category(bucket, frequency, category)),
        )
        .await?;
        Ok(categories.into_iter().zip(crawled).collect())
    }

    async fn crawl_category(
        &self,
        bucket: &str,
        frequency: &str,
        category: &str,
    ) -> Result<InstrumentMap, FeedError> {
        let prefix = format!("{}{frequency}/{category}/", self.config.root_prefix);
        let mut instruments = self.children(bucket, &prefix).await?;
        if let Some(limit) = self.config.instrument_limit {
            instruments.truncate(limit);
        }
        tracing::debug!(frequency, category, instruments = instruments.len(), "crawling category");

        let leaves = try_join_all(
            instruments
                .iter()
                .map(|instrument| self.crawl_instrument(bucket, frequency, category, instrument)),
        )
        .await?;
        Ok(instruments
            .into_iter()
            .zip(leaves)
            .filter_map(|(instrument, leaf)| Some((instrument, leaf?)))
            .collect())
    }

    /// `None` when no file below the instrument carries a date.
    async fn crawl_instrument(
        &self,
        bucket: &str,
        frequency: &str,
        category: &str,
        instrument: &str,
    ) -> Result<Option<Leaf>, FeedError> {
        let prefix = format!("{}{frequency}/{category}/{instrument}/", self.config.root_prefix);
        let granularity = DateGranularity::for_frequency(frequency);
        let listing = self.list(bucket, &prefix).await?;
        let timeframes = child_names(&listing.prefixes, &prefix);

        if timeframes.is_empty() {
            let range = self
                .parser
                .date_range(listing.keys.iter().map(String::as_str), granularity);
            if range.is_none() {
                tracing::warn!(%prefix, "no dated files; skipping instrument");
            }
            return Ok(range.map(Leaf::Direct));
        }

        let prefix = prefix.as_str();
        let ranges = try_join_all(timeframes.iter().map(|timeframe| async move {
            let listing = self.list(bucket, &format!("{prefix}{timeframe}/")).await?;
            Ok::<_, FeedError>(
                self.parser
                    .date_range(listing.keys.iter().map(String::as_str), granularity),
            )
        }))
        .await?;

        let ranges = timeframes
            .into_iter()
            .zip(ranges)
            .filter_map(|(timeframe, range)| {
                if range.is_none() {
                    tracing::warn!(prefix, %timeframe, "no dated files; skipping timeframe");
                }
                Some((timeframe, range?))
            })
            .collect();
        Ok(Some(Leaf::Indexed(ranges)))
    }

    async fn bucket_url(&self) -> Result<String, FeedError> {
        if let Some(url) = &self.config.bucket_url {
            return Ok(url.clone());
        }
        let html = self.fetch_text(&self.config.index_url, &[]).await?;
        let url = self.parser.bucket_url(&html).ok_or_else(|| {
            FeedError::Crawl(format!("no BUCKET_URL found on {}", self.config.index_url))
        })?;
        tracing::debug!(%url, "discovered bucket");
        Ok(url)
    }

    async fn children(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, FeedError> {
        let listing = self.list(bucket, prefix).await?;
        Ok(child_names(&listing.prefixes, prefix))
    }

    /// Full delimiter listing of `prefix`, following truncation markers.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<ListingPage, FeedError> {
        let mut listing = ListingPage::default();
        let mut marker: Option<String> = None;
        loop {
            let mut query = vec![("prefix", prefix), ("delimiter", "/")];
            if let Some(marker) = marker.as_deref() {
                query.push(("marker", marker));
            }
            let xml = self.fetch_text(bucket, &query).await?;
            let page = self.parser.parse_page(&xml);
            listing.prefixes.extend(page.prefixes);
            listing.keys.extend(page.keys);

            match page.next_marker {
                Some(next) if marker.as_deref() != Some(next.as_str()) => marker = Some(next),
                _ => break,
            }
        }
        Ok(listing)
    }

    async fn fetch_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, FeedError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| FeedError::Crawl("request limiter closed".to_string()))?;
        if !self.config.request_delay.is_zero() {
            tokio::time::sleep(self.config.request_delay).await;
        }

        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, FeedError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent).unwrap_or_else(|_| HeaderValue::from_static("rangescope")),
    );

    Ok(Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_futures_archive() {
        let config = CrawlerConfig::default();
        assert_eq!(config.root_prefix, "data/futures/um/");
        assert!(config.index_url.ends_with("?prefix=data/futures/um/"));
        assert_eq!(config.instrument_limit, Some(10));
        assert_eq!(config.concurrency, 10);
    }

    #[test]
    fn test_zero_concurrency_still_allows_requests() {
        let crawler = Crawler::new(CrawlerConfig {
            concurrency: 0,
            ..CrawlerConfig::default()
        })
        .unwrap();
        assert_eq!(crawler.permits.available_permits(), 1);
    }
}
