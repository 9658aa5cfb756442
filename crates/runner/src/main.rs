use clap::Parser;
use oddsline_gateway::PriceFeed;
use oddsline_runner::{Args, MarketWatch, log_status_changes};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "oddsline=info".into()))
        .init();

    let args = Args::parse();
    let config = args.resolve_config()?;
    let markets = args.unique_markets();

    tracing::info!(
        ws_url = %config.ws_url,
        fallback = ?config.fallback.mode,
        markets = markets.len(),
        "starting oddsline"
    );

    let feed = PriceFeed::spawn(config);
    let status_log = log_status_changes(&feed);
    let watch = MarketWatch::start(&feed, &markets);

    tokio::signal::ctrl_c().await?;
    tracing::info!(ticks = watch.ticks(), "interrupted, shutting down");

    watch.stop();
    feed.shutdown();
    feed.closed().await;
    let last = status_log.await?;
    tracing::info!(phase = ?last.phase, "feed stopped");

    Ok(())
}
