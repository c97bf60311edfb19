//! Rangescope feed
//!
//! Everything between the outside world and a session's event queue:
//!
//! - [`source`]: the `FeedSource` trait and the `pump` that forwards
//!   snapshots into a session
//! - [`websocket`]: client for a push feed (one JSON document per message)
//! - [`file`]: a polled JSON file as a feed
//! - [`cache`]: load/save of the on-disk catalog cache
//! - [`server`]: the push feed itself, serving the cache over WebSocket
//! - [`crawler`] / [`listing`]: building a catalog from the public data
//!   archive's bucket listings
//! - [`scheduler`]: periodic re-crawl into the server's hub and cache
//!
//! Transport reliability (reconnects, backoff) is left to whoever runs the
//! feed; a source that drops simply ends.

pub mod cache;
pub mod crawler;
pub mod error;
pub mod file;
pub mod listing;
pub mod scheduler;
pub mod server;
pub mod source;
pub mod websocket;

pub use cache::{load_cache, save_cache};
pub use crawler::{Crawler, CrawlerConfig};
pub use error::FeedError;
pub use file::FileFeed;
pub use listing::{DateGranularity, ListingParser};
pub use scheduler::{crawl_and_publish, run_crawl_schedule, CrawlSchedule};
pub use server::{FeedHub, FeedServer, ServerConfig};
pub use source::{pump, FeedSource};
pub use websocket::WebSocketFeed;
