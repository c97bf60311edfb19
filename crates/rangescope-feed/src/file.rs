use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::FeedError;
use crate::source::FeedSource;

/// A JSON file polled on an interval. Yields the contents whenever they
/// change; a missing or empty file yields nothing. Never ends on its own.
pub struct FileFeed {
    path: PathBuf,
    poll_interval: Duration,
    ticker: Option<Interval>,
    last_digest: Option<[u8; 32]>,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll_interval,
            ticker: None,
            last_digest: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file once; `Some` only if it changed since the last read.
    ///
    /// Contents that are not UTF-8 are logged and skipped until the file
    /// changes again.
    pub async fn poll_once(&mut self) -> Result<Option<String>, FeedError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(FeedError::io(&self.path)(err)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        let digest: [u8; 32] = Sha256::digest(&bytes).into();
        if self.last_digest == Some(digest) {
            return Ok(None);
        }
        self.last_digest = Some(digest);

        match String::from_utf8(bytes) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "skipping feed file that is not UTF-8"
                );
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl FeedSource for FileFeed {
    async fn next_snapshot(&mut self) -> Result<Option<String>, FeedError> {
        let period = self.poll_interval.max(Duration::from_millis(1));
        loop {
            let ticker = self.ticker.get_or_insert_with(|| {
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });
            ticker.tick().await;
            if let Some(contents) = self.poll_once().await? {
                return Ok(Some(contents));
            }
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
