use std::net::SocketAddr;
use std::path::PathBuf;

use rangescope_catalog::CatalogError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("i/o error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("feed server stopped: {0}")]
    Server(#[source] std::io::Error),
    #[error("failed to serialize catalog: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered with status {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("invalid listing pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("crawl failed: {0}")]
    Crawl(String),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl FeedError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| FeedError::Io { path, source }
    }
}
