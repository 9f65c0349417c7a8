use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

use lexfeed::config::Config;
use lexfeed::feed::{FeedWatcher, WidgetEvent, WidgetState};
use lexfeed::fetch::ResilientFetcher;
use lexfeed::metrics::{FeedMetrics, MetricsSink};
use lexfeed::render;

/// Sent on every request; the court hosts refuse clients that do not look
/// like a browser.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Parser, Debug)]
#[command(name = "lexfeed", about = "Resilient court-news feed aggregator")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, value_name = "FILE", default_value = "lexfeed.toml")]
    config: PathBuf,

    /// Run a single load cycle per feed and exit
    #[arg(long)]
    once: bool,

    /// Emit events as JSON lines instead of text cards
    #[arg(long)]
    json: bool,

    /// Print the load-metrics snapshot when cycles complete (with --once)
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config).context("failed to load configuration")?;

    let client = reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .build()
        .context("failed to build HTTP client")?;
    let fetcher = Arc::new(ResilientFetcher::new(
        client,
        config.proxy_endpoints(),
        config.fetch_config(),
    ));
    let metrics = Arc::new(FeedMetrics::new());

    let (event_tx, mut event_rx) = mpsc::channel::<WidgetEvent>(32);

    let mut handles = Vec::new();
    for feed in config.feeds.clone() {
        let watcher = FeedWatcher::new(
            feed,
            Arc::clone(&fetcher),
            config.watcher_config(),
            Some(Arc::clone(&metrics) as Arc<dyn MetricsSink>),
            event_tx.clone(),
        );
        let once = args.once;
        handles.push(tokio::spawn(async move {
            if once {
                watcher.run_cycle().await
            } else {
                watcher.run().await;
                WidgetState::Failed {
                    reason: "watcher stopped".to_string(),
                }
            }
        }));
    }
    // Watchers hold the remaining senders; the receive loop ends when the
    // last one finishes (once mode) or runs forever (watch mode).
    drop(event_tx);

    while let Some(event) = event_rx.recv().await {
        if args.json {
            println!("{}", render::render_event_json(&event)?);
        } else {
            print!("{}", render::render_event(&event));
        }
    }

    let mut final_states = Vec::new();
    for handle in handles {
        final_states.push(handle.await.context("watcher task panicked")?);
    }

    if args.metrics {
        let snapshot = metrics.snapshot();
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("failed to encode metrics")?
        );
    }

    if args.once
        && !final_states.is_empty()
        && final_states
            .iter()
            .all(|state| matches!(state, WidgetState::Failed { .. }))
    {
        anyhow::bail!("all feeds failed");
    }

    Ok(())
}
