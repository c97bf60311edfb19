//! Push feed server.
//!
//! Serves the cached catalog over WebSocket:
//! - a new client immediately receives the current snapshot (if any),
//! - every later change is broadcast to all connected clients,
//! - the cache file is re-read every `poll_interval`; unchanged or invalid
//!   contents are not broadcast,
//! - with a crawl schedule, the archive is re-crawled on its own interval and
//!   new catalogs are published and written back to the cache.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rangescope_catalog::{parse_catalog, Catalog};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::cache::load_cache;
use crate::crawler::Crawler;
use crate::error::FeedError;
use crate::file::FileFeed;
use crate::scheduler::{run_crawl_schedule, CrawlSchedule};
use crate::source::FeedSource;

const BROADCAST_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    pub cache_path: PathBuf,
    pub poll_interval: Duration,
    /// Re-crawl the archive on a schedule. `None` serves the cache only.
    pub crawl: Option<CrawlSchedule>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8001)),
            cache_path: PathBuf::from("cache.json"),
            poll_interval: Duration::from_secs(60),
            crawl: None,
        }
    }
}

// ============================================================================
// Hub
// ============================================================================

/// Latest serialized snapshot plus the fan-out channel to connected clients.
pub struct FeedHub {
    latest: RwLock<Option<Arc<str>>>,
    tx: broadcast::Sender<Arc<str>>,
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            latest: RwLock::new(None),
            tx,
        }
    }

    pub fn latest(&self) -> Option<Arc<str>> {
        self.latest.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Make `catalog` the current snapshot and broadcast it. Returns `false`
    /// when it serializes identically to the current one (nothing sent).
    pub fn publish(&self, catalog: &Catalog) -> Result<bool, FeedError> {
        let payload: Arc<str> = Arc::from(catalog.to_json()?);
        {
            let mut latest = self.latest.write();
            if latest.as_deref() == Some(&*payload) {
                tracing::debug!("no new data");
                return Ok(false);
            }
            *latest = Some(payload.clone());
        }

        let stats = catalog.stats();
        let clients = self.tx.send(payload).unwrap_or(0);
        tracing::info!(
            frequencies = stats.frequencies,
            instruments = stats.instruments,
            clients,
            "new catalog published"
        );
        Ok(true)
    }
}

// ============================================================================
// Server
// ============================================================================

pub struct FeedServer {
    config: ServerConfig,
    listener: TcpListener,
    hub: Arc<FeedHub>,
    crawler: Option<Crawler>,
}

impl FeedServer {
    /// Bind the listener and seed the hub from the cache file.
    pub async fn bind(config: ServerConfig) -> Result<Self, FeedError> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|source| FeedError::Bind {
                addr: config.listen,
                source,
            })?;

        let crawler = config
            .crawl
            .as_ref()
            .map(|schedule| Crawler::new(schedule.crawler.clone()))
            .transpose()?;

        let hub = Arc::new(FeedHub::new());
        let cache_path = config.cache_path.clone();
        let cached = tokio::task::spawn_blocking(move || load_cache(&cache_path))
            .await
            .unwrap_or_default();
        match cached {
            Some(catalog) => {
                hub.publish(&catalog)?;
            }
            None => tracing::info!(
                path = %config.cache_path.display(),
                "catalog cache empty; clients get data once it appears"
            ),
        }

        Ok(Self {
            config,
            listener,
            hub,
            crawler,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, FeedError> {
        self.listener.local_addr().map_err(FeedError::Server)
    }

    pub fn hub(&self) -> Arc<FeedHub> {
        self.hub.clone()
    }

    /// Serve until the listener fails.
    pub async fn run(self) -> Result<(), FeedError> {
        let refresh = tokio::spawn(refresh_from_cache(
            FileFeed::new(self.config.cache_path.clone(), self.config.poll_interval),
            self.hub.clone(),
        ));
        let crawl = match (self.crawler, &self.config.crawl) {
            (Some(crawler), Some(schedule)) => Some(tokio::spawn(run_crawl_schedule(
                crawler,
                self.hub.clone(),
                self.config.cache_path.clone(),
                schedule.interval,
                schedule.run_on_start,
            ))),
            _ => None,
        };

        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "feed server listening on ws://{addr}");
        }

        let app = Router::new()
            .route("/", get(ws_upgrade))
            .with_state(self.hub);
        let result = axum::serve(self.listener, app)
            .await
            .map_err(FeedError::Server);

        refresh.abort();
        if let Some(crawl) = crawl {
            crawl.abort();
        }
        result
    }
}

async fn refresh_from_cache(mut feed: FileFeed, hub: Arc<FeedHub>) {
    loop {
        match feed.next_snapshot().await {
            Ok(Some(payload)) => match parse_catalog(&payload) {
                Ok(catalog) => {
                    if let Err(err) = hub.publish(&catalog) {
                        tracing::warn!(error = %err, "failed to publish refreshed catalog");
                    }
                }
                Err(err) => tracing::warn!(
                    path = %feed.path().display(),
                    error = %err,
                    "cache file is not a valid catalog; keeping previous snapshot"
                ),
            },
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(path = %feed.path().display(), error = %err, "cache refresh failed")
            }
        }
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(hub): State<Arc<FeedHub>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_session(socket, hub))
}

async fn client_session(socket: WebSocket, hub: Arc<FeedHub>) {
    let mut updates = hub.subscribe();
    let (mut sender, mut receiver) = socket.split();
    tracing::info!(clients = hub.client_count(), "client connected");

    if let Some(latest) = hub.latest() {
        if sender.send(Message::Text(latest.as_ref().into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            update = updates.recv() => {
                let payload = match update {
                    Ok(payload) => payload,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "client lagged; sending latest snapshot");
                        match hub.latest() {
                            Some(latest) => latest,
                            None => continue,
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if sender.send(Message::Text(payload.as_ref().into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Clients never send anything meaningful.
                Some(Ok(_)) => {}
            },
        }
    }

    drop(updates);
    tracing::info!(clients = hub.client_count(), "client disconnected");
}
