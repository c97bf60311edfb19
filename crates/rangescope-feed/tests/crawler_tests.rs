//! Crawler tests against an in-process archive.
//!
//! The fake bucket answers S3-style delimiter listings (`prefix`,
//! `delimiter=/`, `marker`) in pages of three entries, so every multi-page
//! directory also exercises truncation markers.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use rangescope_catalog::{parse_catalog, DateRange, Leaf, LeafShape};
use rangescope_feed::{
    crawl_and_publish, load_cache, CrawlSchedule, Crawler, CrawlerConfig, FeedHub, FeedServer,
    FeedSource, ServerConfig, WebSocketFeed,
};
use tempfile::tempdir;
use tokio::net::TcpListener;
use tokio::time::timeout;

const PAGE_SIZE: usize = 3;
const WAIT: Duration = Duration::from_secs(10);

const KEYS: &[&str] = &[
    "data/futures/um/daily/klines/BTCUSDT/1h/BTCUSDT-1h-2024-01-01.zip",
    "data/futures/um/daily/klines/BTCUSDT/1h/BTCUSDT-1h-2024-01-02.zip",
    "data/futures/um/daily/klines/BTCUSDT/1h/BTCUSDT-1h-2024-01-02.zip.CHECKSUM",
    "data/futures/um/daily/klines/BTCUSDT/1h/BTCUSDT-1h-2024-01-03.zip",
    "data/futures/um/daily/klines/BTCUSDT/4h/BTCUSDT-4h-2023-06-01.zip",
    "data/futures/um/daily/klines/BTCUSDT/4h/BTCUSDT-4h-2023-06-05.zip",
    "data/futures/um/daily/klines/ETHUSDT/1h/ETHUSDT-1h-2024-02-10.zip",
    "data/futures/um/daily/trades/BTCUSDT/BTCUSDT-trades-2022-03-09.zip",
    "data/futures/um/daily/trades/BTCUSDT/BTCUSDT-trades-2022-03-01.zip",
    "data/futures/um/daily/trades/EMPTYUSDT/README.txt",
    "data/futures/um/monthly/trades/BTCUSDT/BTCUSDT-trades-2021-01.zip",
    "data/futures/um/monthly/trades/BTCUSDT/BTCUSDT-trades-2020-05.zip",
    "data/futures/um/monthly/trades/BTCUSDT/BTCUSDT-trades-2021-12.zip",
];

// ============================================================================
// Fake archive
// ============================================================================

fn list_bucket(prefix: &str, marker: Option<&str>) -> String {
    let mut entries = BTreeSet::new();
    for key in KEYS {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        match rest.find('/') {
            Some(end) => entries.insert((format!("{prefix}{}", &rest[..=end]), true)),
            None => entries.insert((key.to_string(), false)),
        };
    }

    let remaining: Vec<(String, bool)> = entries
        .into_iter()
        .filter(|(name, _)| marker.map_or(true, |marker| name.as_str() > marker))
        .collect();
    let truncated = remaining.len() > PAGE_SIZE;
    let page = &remaining[..remaining.len().min(PAGE_SIZE)];

    let mut xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ListBucketResult>\
         <Name>archive</Name><Prefix>{prefix}</Prefix><Delimiter>/</Delimiter>\
         <IsTruncated>{truncated}</IsTruncated>"
    );
    if truncated {
        if let Some((last, _)) = page.last() {
            xml.push_str(&format!("<NextMarker>{last}</NextMarker>"));
        }
    }
    for (name, is_prefix) in page {
        if *is_prefix {
            xml.push_str(&format!("<CommonPrefixes><Prefix>{name}</Prefix></CommonPrefixes>"));
        } else {
            xml.push_str(&format!("<Contents><Key>{name}</Key><Size>1</Size></Contents>"));
        }
    }
    xml.push_str("</ListBucketResult>");
    xml
}

async fn index_page(State(bucket): State<Arc<str>>) -> Html<String> {
    Html(format!(
        "<html><head><script>var BUCKET_URL = '{bucket}';</script></head></html>"
    ))
}

async fn bucket(Query(params): Query<HashMap<String, String>>) -> String {
    let prefix = params.get("prefix").map(String::as_str).unwrap_or_default();
    list_bucket(prefix, params.get("marker").map(String::as_str))
}

/// Start the archive; returns its base URL.
async fn serve_archive() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let bucket_url: Arc<str> = Arc::from(format!("{base}/bucket"));
    let app = Router::new()
        .route("/index.html", get(index_page))
        .route("/bucket", get(bucket))
        .with_state(bucket_url);
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    base
}

fn crawler_config(base: &str) -> CrawlerConfig {
    CrawlerConfig {
        index_url: format!("{base}/index.html"),
        instrument_limit: None,
        concurrency: 4,
        request_delay: Duration::ZERO,
        timeout: Duration::from_secs(5),
        ..CrawlerConfig::default()
    }
}

fn range(from: &str, to: &str) -> DateRange {
    DateRange::new(from, to)
}

// ============================================================================
// Crawl
// ============================================================================

#[tokio::test]
async fn test_crawl_builds_catalog_in_listing_order() {
    let base = serve_archive().await;
    let crawler = Crawler::new(crawler_config(&base)).unwrap();
    let catalog = crawler.crawl().await.unwrap();

    let frequencies: Vec<&str> = catalog.frequencies().collect();
    assert_eq!(frequencies, ["daily", "monthly"]);
    let categories: Vec<&String> = catalog.categories("daily").unwrap().keys().collect();
    assert_eq!(categories, ["klines", "trades"]);

    // Timeframe directories make an Indexed leaf; the 1h listing spans two pages.
    let btc = catalog.leaf("daily", "klines", "BTCUSDT").unwrap();
    assert_eq!(btc.shape(), LeafShape::Indexed);
    assert_eq!(btc.timeframes().unwrap().collect::<Vec<_>>(), ["1h", "4h"]);
    assert_eq!(btc.range_for("1h"), Some(&range("2024-01-01", "2024-01-03")));
    assert_eq!(btc.range_for("4h"), Some(&range("2023-06-01", "2023-06-05")));

    let eth = catalog.leaf("daily", "klines", "ETHUSDT").unwrap();
    assert_eq!(eth.range_for("1h"), Some(&range("2024-02-10", "2024-02-10")));

    // Files directly under the instrument make a Direct leaf.
    let trades = catalog.instruments("daily", "trades").unwrap();
    assert_eq!(trades.keys().collect::<Vec<_>>(), ["BTCUSDT"]);
    assert_eq!(
        catalog.leaf("daily", "trades", "BTCUSDT").unwrap(),
        &Leaf::Direct(range("2022-03-01", "2022-03-09"))
    );

    // Monthly archives are dated by year and month.
    assert_eq!(
        catalog.leaf("monthly", "trades", "BTCUSDT").unwrap(),
        &Leaf::Direct(range("2020-05", "2021-12"))
    );
}

#[tokio::test]
async fn test_instrument_limit_applies_per_category() {
    let base = serve_archive().await;
    let crawler = Crawler::new(CrawlerConfig {
        instrument_limit: Some(1),
        ..crawler_config(&base)
    })
    .unwrap();
    let catalog = crawler.crawl().await.unwrap();

    let klines = catalog.instruments("daily", "klines").unwrap();
    assert_eq!(klines.keys().collect::<Vec<_>>(), ["BTCUSDT"]);
    let trades = catalog.instruments("daily", "trades").unwrap();
    assert_eq!(trades.keys().collect::<Vec<_>>(), ["BTCUSDT"]);
}

#[tokio::test]
async fn test_explicit_bucket_skips_discovery() {
    let base = serve_archive().await;
    let crawler = Crawler::new(CrawlerConfig {
        index_url: format!("{base}/nowhere"),
        bucket_url: Some(format!("{base}/bucket")),
        ..crawler_config(&base)
    })
    .unwrap();
    let catalog = crawler.crawl().await.unwrap();
    assert_eq!(catalog.stats().instruments, 4);
}

// ============================================================================
// Publish
// ============================================================================

#[tokio::test]
async fn test_crawl_and_publish_saves_only_new_data() {
    let base = serve_archive().await;
    let crawler = Crawler::new(crawler_config(&base)).unwrap();
    let hub = FeedHub::new();
    let dir = tempdir().unwrap();
    let cache = dir.path().join("cache.json");

    assert!(crawl_and_publish(&crawler, &hub, &cache).await.unwrap());
    let saved = load_cache(&cache).unwrap();
    assert_eq!(saved.stats().instruments, 4);
    assert!(hub.latest().unwrap().contains("BTCUSDT"));

    std::fs::remove_file(&cache).unwrap();
    assert!(!crawl_and_publish(&crawler, &hub, &cache).await.unwrap());
    assert!(!cache.exists());
}

#[tokio::test]
async fn test_failed_crawl_keeps_previous_catalog() {
    let base = serve_archive().await;
    let crawler = Crawler::new(CrawlerConfig {
        bucket_url: Some(format!("{base}/missing")),
        ..crawler_config(&base)
    })
    .unwrap();
    let hub = FeedHub::new();
    hub.publish(&parse_catalog(r#"{"daily": {}}"#).unwrap()).unwrap();
    let dir = tempdir().unwrap();
    let cache = dir.path().join("cache.json");

    assert!(crawl_and_publish(&crawler, &hub, &cache).await.is_err());
    assert_eq!(hub.latest().as_deref(), Some(r#"{"daily":{}}"#));
    assert!(!cache.exists());
}

#[tokio::test]
async fn test_server_serves_crawled_catalog() {
    let base = serve_archive().await;
    let dir = tempdir().unwrap();
    let cache = dir.path().join("cache.json");

    let server = FeedServer::bind(ServerConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        cache_path: cache.clone(),
        poll_interval: Duration::from_millis(50),
        crawl: Some(CrawlSchedule {
            crawler: crawler_config(&base),
            interval: Duration::from_secs(3600),
            run_on_start: true,
        }),
    })
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let mut feed = WebSocketFeed::connect(&format!("ws://{addr}/")).await.unwrap();
    let payload = timeout(WAIT, feed.next_snapshot())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let catalog = parse_catalog(&payload).unwrap();
    assert_eq!(catalog.stats().instruments, 4);

    // The cache is written right after the broadcast.
    let saved = timeout(WAIT, async {
        loop {
            if let Some(saved) = load_cache(&cache) {
                break saved;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(saved, catalog);
}
