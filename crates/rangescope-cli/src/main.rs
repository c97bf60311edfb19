//! Rangescope CLI
//!
//! Command-line front end for the drill-down session:
//! - `watch`: follow a push feed (or a JSON file) and pick from stdin
//! - `resolve`: one-shot resolution of a selection against a catalog file
//! - `inspect`: summarize a catalog file
//! - `serve`: publish a cached catalog as a push feed
//! - `record`: save the first snapshot of a feed as the cache file
//! - `crawl`: build a catalog from the public data archive once

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rangescope_catalog::{parse_catalog, Catalog, LeafShape};
use rangescope_feed::{
    save_cache, CrawlSchedule, Crawler, CrawlerConfig, FeedServer, FeedSource, ServerConfig,
    WebSocketFeed,
};
use rangescope_session::{Session, Slot};

mod logging;
mod render;
mod repl;
mod watch;

use watch::{FeedTarget, WatchOptions};

const FEED_URL_ENV: &str = "RANGESCOPE_FEED_URL";
const DEFAULT_FEED_URL: &str = "ws://localhost:8001";

#[derive(Parser)]
#[command(name = "rangescope")]
#[command(author, version, about = "Rangescope: drill into a time-series catalog")]
struct Cli {
    /// Debug-level logging (overridden by RANGESCOPE_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow a feed and pick frequency/category/instrument/timeframe from stdin.
    ///
    /// With neither `--url` nor `--file`, connects to $RANGESCOPE_FEED_URL or
    /// ws://localhost:8001.
    Watch {
        /// WebSocket feed URL
        #[arg(long, conflicts_with = "file")]
        url: Option<String>,
        /// Poll a catalog JSON file instead of a socket
        #[arg(long)]
        file: Option<PathBuf>,
        /// File poll interval in seconds
        #[arg(long, default_value_t = 2)]
        poll_secs: u64,
        /// Emit one JSON view per line instead of the text display
        #[arg(long)]
        json: bool,
    },

    /// Resolve a selection against a catalog file and print the date range.
    Resolve {
        /// Catalog JSON file
        #[arg(long)]
        catalog: PathBuf,
        #[arg(short, long)]
        frequency: Option<String>,
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        instrument: Option<String>,
        #[arg(short, long)]
        timeframe: Option<String>,
        #[arg(long)]
        json: bool,
    },

    /// Summarize a catalog file.
    Inspect {
        #[arg(long)]
        catalog: PathBuf,
        #[arg(long)]
        json: bool,
    },

    /// Serve a cached catalog over WebSocket, re-reading the cache on an interval.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8001")]
        listen: SocketAddr,
        /// Catalog cache file
        #[arg(long, default_value = "cache.json")]
        cache: PathBuf,
        /// Cache re-read interval in seconds
        #[arg(long, default_value_t = 60)]
        poll_secs: u64,
        /// Also re-crawl the archive and publish what changed
        #[arg(long)]
        crawl: bool,
        /// Minutes between crawls
        #[arg(long, default_value_t = 30, requires = "crawl")]
        crawl_minutes: u64,
        /// Crawl right away instead of after the first interval
        #[arg(long, requires = "crawl")]
        crawl_on_start: bool,
        #[command(flatten)]
        archive: CrawlArgs,
    },

    /// Crawl the data archive once and write the catalog to a cache file.
    Crawl {
        #[arg(long, default_value = "cache.json")]
        out: PathBuf,
        #[command(flatten)]
        archive: CrawlArgs,
    },

    /// Save the first snapshot received from a feed to a cache file.
    Record {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        out: PathBuf,
        /// Give up if nothing arrives within this many seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

/// Where and how politely to crawl.
#[derive(Args, Debug, Clone)]
struct CrawlArgs {
    /// Page announcing the bucket endpoint
    #[arg(long)]
    index_url: Option<String>,
    /// List this bucket directly instead of discovering it
    #[arg(long)]
    bucket_url: Option<String>,
    /// Key prefix holding `<frequency>/<category>/<instrument>/`
    #[arg(long)]
    root_prefix: Option<String>,
    /// Instruments kept per category (0 keeps all)
    #[arg(long, default_value_t = 10)]
    instrument_limit: usize,
    /// Listing requests in flight at once
    #[arg(long, default_value_t = 10)]
    concurrency: usize,
    /// Pause before each request, in milliseconds
    #[arg(long, default_value_t = 100)]
    delay_ms: u64,
}

impl CrawlArgs {
    fn into_config(self) -> CrawlerConfig {
        let defaults = CrawlerConfig::default();
        CrawlerConfig {
            index_url: self.index_url.unwrap_or(defaults.index_url),
            bucket_url: self.bucket_url,
            root_prefix: self.root_prefix.unwrap_or(defaults.root_prefix),
            instrument_limit: (self.instrument_limit > 0).then_some(self.instrument_limit),
            concurrency: self.concurrency.max(1),
            request_delay: Duration::from_millis(self.delay_ms),
            ..defaults
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Watch {
            url,
            file,
            poll_secs,
            json,
        } => {
            let target = match file {
                Some(path) => FeedTarget::File {
                    path,
                    poll: Duration::from_secs(poll_secs),
                },
                None => FeedTarget::Url(feed_url(url)),
            };
            watch::cmd_watch(WatchOptions { target, json })
        }
        Commands::Resolve {
            catalog,
            frequency,
            category,
            instrument,
            timeframe,
            json,
        } => {
            let picks = [
                (Slot::Frequency, frequency),
                (Slot::Category, category),
                (Slot::Instrument, instrument),
                (Slot::Timeframe, timeframe),
            ];
            cmd_resolve(&catalog, picks, json)
        }
        Commands::Inspect { catalog, json } => cmd_inspect(&catalog, json),
        Commands::Serve {
            listen,
            cache,
            poll_secs,
            crawl,
            crawl_minutes,
            crawl_on_start,
            archive,
        } => cmd_serve(ServerConfig {
            listen,
            cache_path: cache,
            poll_interval: Duration::from_secs(poll_secs.max(1)),
            crawl: crawl.then(|| CrawlSchedule {
                crawler: archive.into_config(),
                interval: Duration::from_secs(crawl_minutes.max(1) * 60),
                run_on_start: crawl_on_start,
            }),
        }),
        Commands::Crawl { out, archive } => cmd_crawl(archive.into_config(), &out),
        Commands::Record {
            url,
            out,
            timeout_secs,
        } => cmd_record(&feed_url(url), &out, Duration::from_secs(timeout_secs)),
    }
}

fn feed_url(explicit: Option<String>) -> String {
    explicit
        .or_else(|| {
            env::var(FEED_URL_ENV)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .unwrap_or_else(|| DEFAULT_FEED_URL.to_string())
}

fn read_catalog(path: &Path) -> Result<Catalog> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_catalog(&text).with_context(|| format!("{} is not a valid catalog", path.display()))
}

// ============================================================================
// resolve / inspect
// ============================================================================

fn cmd_resolve(path: &Path, picks: [(Slot, Option<String>); 4], json: bool) -> Result<()> {
    let mut session = Session::with_catalog(read_catalog(path)?);
    for (slot, key) in picks {
        let Some(key) = key else { continue };
        if !session.select(slot, key) {
            return Err(anyhow!(
                "--{slot} needs --{} first",
                slot.parent().map(Slot::as_str).unwrap_or("frequency")
            ));
        }
    }

    let view = session.view();
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    match &view.result {
        Some(resolved) => {
            let label = resolved
                .label
                .as_deref()
                .map(|label| format!(" [{label}]"))
                .unwrap_or_default();
            println!(
                "{}{} {} → {}",
                view.selection.to_string().bold(),
                label,
                resolved.from.green(),
                resolved.to.green()
            );
            Ok(())
        }
        None => {
            if let Some(slot) = view.stale {
                return Err(anyhow!(
                    "{slot} `{}` is not in the catalog",
                    view.selection.get(slot).unwrap_or_default()
                ));
            }
            match session.available_timeframes().options() {
                Some(options) if view.selection.timeframe().is_none() => Err(anyhow!(
                    "{} needs a timeframe; one of: {}",
                    view.selection,
                    options.join(", ")
                )),
                _ => Err(anyhow!("selection `{}` does not resolve", view.selection)),
            }
        }
    }
}

fn cmd_inspect(path: &Path, json: bool) -> Result<()> {
    let catalog = read_catalog(path)?;
    let stats = catalog.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{} {}", "catalog".cyan().bold(), path.display());
    println!("  {}", render::format_stats(&stats));
    for frequency in catalog.frequencies() {
        println!("  {}", frequency.bold());
        let Some(categories) = catalog.categories(frequency) else {
            continue;
        };
        for (category, instruments) in categories {
            let indexed = instruments
                .values()
                .filter(|leaf| leaf.shape() == LeafShape::Indexed)
                .count();
            println!(
                "    {category}: {} instruments ({indexed} with timeframes)",
                instruments.len()
            );
        }
    }
    Ok(())
}

// ============================================================================
// serve / record
// ============================================================================

fn cmd_serve(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: ServerConfig) -> Result<()> {
    let server = FeedServer::bind(config).await?;
    tokio::select! {
        result = server.run() => result.map_err(anyhow::Error::from),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            tracing::info!("shutting down feed server");
            Ok(())
        }
    }
}

fn cmd_record(url: &str, out: &Path, timeout: Duration) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let payload = runtime.block_on(first_snapshot(url, timeout))?;
    let catalog = parse_catalog(&payload).context("feed sent an invalid catalog")?;
    save_cache(out, &catalog)?;
    eprintln!(
        "{} {} ({})",
        "wrote".green().bold(),
        out.display().to_string().bold(),
        render::format_stats(&catalog.stats())
    );
    Ok(())
}

async fn first_snapshot(url: &str, timeout: Duration) -> Result<String> {
    let mut feed = WebSocketFeed::connect(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    let next = tokio::time::timeout(timeout, feed.next_snapshot())
        .await
        .map_err(|_| anyhow!("no snapshot from {url} within {}s", timeout.as_secs()))??;
    next.ok_or_else(|| anyhow!("{url} closed before sending a snapshot"))
}

// ============================================================================
// crawl
// ============================================================================

fn cmd_crawl(config: CrawlerConfig, out: &Path) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let crawler = Crawler::new(config)?;
    let catalog = runtime.block_on(crawler.crawl()).context("crawl failed")?;
    save_cache(out, &catalog)?;
    eprintln!(
        "{} {} ({})",
        "wrote".green().bold(),
        out.display().to_string().bold(),
        render::format_stats(&catalog.stats())
    );
    Ok(())
}
