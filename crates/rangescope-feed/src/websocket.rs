use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::FeedError;
use crate::source::FeedSource;

/// Client side of the push feed. Every text message is one full catalog.
///
/// A binary message that is not UTF-8 is logged and skipped; the feed keeps
/// waiting for the next snapshot. Transport errors end it.
pub struct WebSocketFeed {
    url: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketFeed {
    pub async fn connect(url: &str) -> Result<Self, FeedError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url).await?;
        tracing::info!(url, "connected to feed");
        Ok(Self {
            url: url.to_string(),
            stream,
        })
    }
}

#[async_trait]
impl FeedSource for WebSocketFeed {
    async fn next_snapshot(&mut self) -> Result<Option<String>, FeedError> {
        while let Some(message) = self.stream.next().await {
            match message? {
                Message::Text(text) => return Ok(Some(text.as_str().to_owned())),
                Message::Binary(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(err) => tracing::warn!(
                        url = %self.url,
                        bytes = bytes.len(),
                        error = %err,
                        "skipping feed message that is not UTF-8"
                    ),
                },
                Message::Close(frame) => {
                    tracing::debug!(url = %self.url, ?frame, "feed closed by server");
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
