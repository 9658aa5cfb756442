//! Client → server messages

use oddsline_core::MarketId;
use serde::{Deserialize, Serialize};

/// Batched market-channel subscription.
///
/// The server treats each one as a replacement of the previous set, so it
/// always carries every currently subscribed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub assets_ids: Vec<String>,
    #[serde(rename = "type")]
    pub channel: String,
}

impl SubscribeRequest {
    pub fn market(ids: &[MarketId]) -> Self {
        Self {
            assets_ids: ids.iter().map(|id| id.as_str().to_owned()).collect(),
            channel: "market".to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
