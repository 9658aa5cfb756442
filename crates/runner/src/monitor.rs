//! Logs ticks and feed status for the markets given on the command line

use oddsline_gateway::{FeedStatus, PriceFeedHandle, PriceSubscription};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::info;

/// Subscriptions held for the lifetime of the process
pub struct MarketWatch {
    subscriptions: Vec<PriceSubscription>,
    ticks: Arc<AtomicU64>,
}

impl MarketWatch {
    /// Subscribe to every market and log each price update at info level
    pub fn start(feed: &PriceFeedHandle, markets: &[String]) -> Self {
        let ticks = Arc::new(AtomicU64::new(0));
        let subscriptions = markets
            .iter()
            .map(|market| {
                let ticks = ticks.clone();
                let name = market.clone();
                feed.subscribe(market.as_str(), move |yes, no| {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    info!(market = %name, yes = format_args!("{yes:.4}"), no = format_args!("{no:.4}"), "tick");
                })
            })
            .collect();

        MarketWatch {
            subscriptions,
            ticks,
        }
    }

    pub fn markets(&self) -> usize {
        self.subscriptions.len()
    }

    /// Price updates seen so far across all markets
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn stop(self) {
        for sub in &self.subscriptions {
            sub.unsubscribe();
        }
    }
}

/// Log every phase change until the feed stops
pub fn log_status_changes(feed: &PriceFeedHandle) -> JoinHandle<FeedStatus> {
    let mut status = feed.watch_status();
    tokio::spawn(async move {
        let mut last = *status.borrow_and_update();
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if current.phase != last.phase {
                info!(
                    from = ?last.phase,
                    to = ?current.phase,
                    subscriptions = current.subscriptions,
                    reconnect_attempts = current.reconnect_attempts,
                    "feed phase changed"
                );
            }
            last = current;
        }
        last
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oddsline_gateway::feed::{FallbackConfig, ReconnectConfig};
    use oddsline_gateway::{FallbackMode, FeedConfig, Phase, PriceFeed};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn unreachable_feed() -> PriceFeedHandle {
        // bind then drop so nothing listens on the port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = FeedConfig::default()
            .with_ws_url(format!("ws://{addr}/ws/market"))
            .with_reconnect(ReconnectConfig {
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(20),
                max_attempts: 1,
            })
            .with_fallback(FallbackConfig {
                mode: FallbackMode::Simulated,
                interval: Duration::from_millis(10),
                volatility: 0.01,
                seed: Some(3),
            });
        PriceFeed::spawn(config)
    }

    #[tokio::test]
    async fn test_watch_counts_ticks() {
        let feed = unreachable_feed().await;
        let watch = MarketWatch::start(&feed, &["a".to_string(), "b".to_string()]);
        assert_eq!(watch.markets(), 2);

        timeout(WAIT, async {
            while watch.ticks() < 4 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        watch.stop();
        let mut status = feed.watch_status();
        timeout(WAIT, status.wait_for(|s| s.subscriptions == 0))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_status_logger_ends_with_feed() {
        let feed = unreachable_feed().await;
        let logger = log_status_changes(&feed);
        let _watch = MarketWatch::start(&feed, &["a".to_string()]);

        let mut status = feed.watch_status();
        timeout(WAIT, status.wait_for(|s| s.phase == Phase::Fallback))
            .await
            .unwrap()
            .unwrap();

        feed.shutdown();
        let last = timeout(WAIT, logger).await.unwrap().unwrap();
        assert_eq!(last.phase, Phase::Idle);
    }
}
