//! `rangescope watch`: follow a feed and drill into it from stdin.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use rangescope_feed::{pump, FeedSource, FileFeed, WebSocketFeed};
use rangescope_session::{channel, run_session, Session, DEFAULT_QUEUE_CAPACITY};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render::print_view;
use crate::repl::{parse_line, Command, HELP};

pub enum FeedTarget {
    Url(String),
    File { path: PathBuf, poll: Duration },
}

pub struct WatchOptions {
    pub target: FeedTarget,
    pub json: bool,
}

pub fn cmd_watch(options: WatchOptions) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(watch(options))
}

async fn open(target: FeedTarget) -> Result<Box<dyn FeedSource>> {
    Ok(match target {
        FeedTarget::Url(url) => Box::new(
            WebSocketFeed::connect(&url)
                .await
                .with_context(|| format!("failed to connect to {url}"))?,
        ),
        FeedTarget::File { path, poll } => Box::new(FileFeed::new(path, poll)),
    })
}

async fn watch(options: WatchOptions) -> Result<()> {
    let mut source = open(options.target).await?;
    let json = options.json;

    let (handle, events) = channel(DEFAULT_QUEUE_CAPACITY);
    let session = tokio::spawn(run_session(Session::new(), events, move |view| {
        if let Err(err) = print_view(view, json) {
            tracing::warn!(error = %err, "failed to render view");
        }
    }));

    let feed_handle = handle.clone();
    let mut feed = tokio::spawn(async move { pump(&mut *source, &feed_handle).await });
    let mut feed_done = false;

    if !json {
        eprintln!("{HELP}\n");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let command = match parse_line(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(err) => {
                        eprintln!("{err}");
                        continue;
                    }
                };
                match command {
                    Command::Quit => break,
                    Command::Help => eprintln!("{HELP}"),
                    other => {
                        if let Some(event) = other.into_event() {
                            if handle.send(event).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
            result = &mut feed, if !feed_done => {
                feed_done = true;
                match result {
                    Ok(Ok(delivered)) => tracing::info!(delivered, "feed finished; still accepting commands"),
                    Ok(Err(err)) => tracing::error!(error = %err, "feed failed; still accepting commands"),
                    Err(err) => tracing::error!(error = %err, "feed task panicked"),
                }
            }
        }
    }

    // A closed loop means there is nothing left to stop.
    let _ = handle.shutdown().await;
    drop(handle);
    if !feed_done {
        feed.abort();
    }
    let session = session.await.context("session task failed")?;
    tracing::debug!(
        generation = session.generation(),
        selection = %session.selection(),
        "watch finished"
    );
    Ok(())
}
