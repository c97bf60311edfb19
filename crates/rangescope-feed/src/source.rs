use async_trait::async_trait;
use rangescope_session::SessionHandle;

use crate::error::FeedError;

/// Something that produces whole catalog documents, one at a time.
#[async_trait]
pub trait FeedSource: Send {
    /// Wait for the next document. `Ok(None)` means the source has ended.
    async fn next_snapshot(&mut self) -> Result<Option<String>, FeedError>;

    /// Human-readable origin, for logs.
    fn describe(&self) -> String;
}

/// Forward snapshots from `source` into a session until the source ends or
/// the session stops listening. Returns how many snapshots were delivered.
///
/// Snapshots are passed on unparsed; validation happens inside the session
/// loop so a bad document never displaces the current catalog.
pub async fn pump<S>(source: &mut S, handle: &SessionHandle) -> Result<usize, FeedError>
where
    S: FeedSource + ?Sized,
{
    let origin = source.describe();
    let mut delivered = 0usize;

    loop {
        let next = tokio::select! {
            _ = handle.closed() => {
                tracing::debug!(origin = %origin, delivered, "session closed; stopping feed");
                return Ok(delivered);
            }
            next = source.next_snapshot() => next?,
        };

        let Some(payload) = next else {
            tracing::info!(origin = %origin, delivered, "feed ended");
            return Ok(delivered);
        };

        tracing::debug!(origin = %origin, bytes = payload.len(), "snapshot received");
        if handle.snapshot(payload).await.is_err() {
            return Ok(delivered);
        }
        delivered += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangescope_session::{channel, run_session, Session};
    use std::collections::VecDeque;

    struct Scripted(VecDeque<String>);

    #[async_trait]
    impl FeedSource for Scripted {
        async fn next_snapshot(&mut self) -> Result<Option<String>, FeedError> {
            Ok(self.0.pop_front())
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[tokio::test]
    async fn test_pump_delivers_until_source_ends() {
        let (handle, events) = channel(8);
        let runner = tokio::spawn(run_session(Session::new(), events, |_| {}));

        let mut source = Scripted(VecDeque::from([
            r#"{"daily": {}}"#.to_string(),
            "garbage".to_string(),
            r#"{"monthly": {}}"#.to_string(),
        ]));
        let delivered = pump(&mut source, &handle).await.unwrap();
        assert_eq!(delivered, 3);

        drop(handle);
        let session = runner.await.unwrap();
        // The garbage document was rejected in the loop, not in the pump.
        assert_eq!(session.generation(), 2);
        assert_eq!(session.available_frequencies(), ["monthly"]);
    }

    #[tokio::test]
    async fn test_pump_stops_when_session_is_gone() {
        let (handle, events) = channel(1);
        drop(events);

        let mut source = Scripted(VecDeque::from(["{}".to_string()]));
        assert_eq!(pump(&mut source, &handle).await.unwrap(), 0);
    }
}
