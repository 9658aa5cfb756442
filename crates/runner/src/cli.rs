//! Command-line arguments and configuration resolution

use clap::{Parser, ValueEnum};
use oddsline_gateway::{FallbackMode, FeedConfig, FeedConfigFile, load_config, load_default_config};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FallbackArg {
    /// Poll the exchange order book over REST
    Rest,
    /// Random walk around the last known price
    Simulated,
}

impl From<FallbackArg> for FallbackMode {
    fn from(arg: FallbackArg) -> Self {
        match arg {
            FallbackArg::Rest => FallbackMode::Rest,
            FallbackArg::Simulated => FallbackMode::Simulated,
        }
    }
}

/// Stream live YES/NO odds for binary-outcome markets
#[derive(Debug, Parser)]
#[command(name = "oddsline", version, about)]
pub struct Args {
    /// Market token ids to watch
    #[arg(required = true, value_name = "MARKET")]
    pub markets: Vec<String>,

    /// JSON configuration file (embedded defaults otherwise)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the market-channel WebSocket URL
    #[arg(long, value_name = "URL")]
    pub ws_url: Option<String>,

    /// Override the REST base URL used by the `rest` fallback
    #[arg(long, value_name = "URL")]
    pub rest_url: Option<String>,

    /// Where prices come from once reconnecting gives up
    #[arg(long, value_enum)]
    pub fallback: Option<FallbackArg>,
}

impl Args {
    /// Load the configuration file (or the embedded default), apply the
    /// command-line overrides and validate the result.
    pub fn resolve_config(&self) -> anyhow::Result<FeedConfig> {
        let mut file = match &self.config {
            Some(path) => load_config(path)?,
            None => load_default_config()?,
        };
        self.apply_overrides(&mut file);
        file.validate()?;
        Ok(file.to_feed_config())
    }

    fn apply_overrides(&self, file: &mut FeedConfigFile) {
        if let Some(url) = &self.ws_url {
            file.ws_url = url.clone();
        }
        if let Some(url) = &self.rest_url {
            file.rest_url = url.clone();
        }
        if let Some(mode) = self.fallback {
            file.fallback.mode = mode.into();
        }
    }

    /// Market ids in command-line order, duplicates removed
    pub fn unique_markets(&self) -> Vec<String> {
        let mut seen = Vec::with_capacity(self.markets.len());
        for market in &self.markets {
            if !seen.contains(market) {
                seen.push(market.clone());
            }
        }
        seen
    }
}
