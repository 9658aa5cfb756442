//! Server → client frame decoding
//!
//! The market channel sends loosely shaped JSON: single events or arrays of
//! them, order-book levels as `[price, size]` pairs or `{price, size}`
//! objects, numbers as strings or as JSON numbers. Every frame is reduced to
//! one of a closed set of variants; anything we can't use becomes
//! `Unrecognized` and is dropped by the caller.

use oddsline_core::{BookLevel, BookTop, MarketId, Odds, Price};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Map, Value};
use std::str::FromStr;

/// One decoded event
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Liveness reply
    KeepAlive,
    /// Best bid / best ask for one market
    Book { asset_id: MarketId, top: BookTop },
    /// Flat price field for one market
    Scalar { asset_id: MarketId, price: Price },
    /// Server-reported error; the connection stays up
    ServerError(String),
    Unrecognized,
}

impl Frame {
    pub fn asset_id(&self) -> Option<&MarketId> {
        match self {
            Frame::Book { asset_id, .. } | Frame::Scalar { asset_id, .. } => Some(asset_id),
            _ => None,
        }
    }

    /// Odds to dispatch, `None` if the frame carries no valid price
    pub fn odds(&self) -> Option<Odds> {
        match self {
            Frame::Book { top, .. } => top.odds(),
            Frame::Scalar { price, .. } => price.to_f64().and_then(Odds::from_yes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameDecoder {
    pong: String,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new("PONG")
    }
}

impl FrameDecoder {
    pub fn new(pong: impl Into<String>) -> Self {
        Self { pong: pong.into() }
    }

    /// Decode one raw text frame. Never fails; malformed input yields
    /// `[Unrecognized]`.
    pub fn decode(&self, raw: &str) -> Vec<Frame> {
        let trimmed = raw.trim();
        if trimmed == self.pong {
            return vec![Frame::KeepAlive];
        }

        match serde_json::from_str::<Value>(trimmed) {
            Ok(Value::Array(events)) => {
                let frames: Vec<Frame> = events
                    .iter()
                    .flat_map(|event| match event {
                        Value::Object(obj) => decode_object(obj),
                        _ => vec![Frame::Unrecognized],
                    })
                    .collect();
                if frames.is_empty() {
                    vec![Frame::Unrecognized]
                } else {
                    frames
                }
            }
            Ok(Value::Object(obj)) => decode_object(&obj),
            _ => vec![Frame::Unrecognized],
        }
    }
}

fn decode_object(obj: &Map<String, Value>) -> Vec<Frame> {
    if let Some(message) = server_error(obj) {
        return vec![Frame::ServerError(message)];
    }

    let parent_asset = asset_id(obj);

    if let Some(Value::Array(changes)) = obj.get("price_changes") {
        let frames: Vec<Frame> = changes
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|change| {
                let asset_id = asset_id(change).or_else(|| parent_asset.clone())?;
                let top = best_prices(change)?;
                Some(Frame::Book { asset_id, top })
            })
            .collect();
        return if frames.is_empty() {
            vec![Frame::Unrecognized]
        } else {
            frames
        };
    }

    let Some(asset_id) = parent_asset else {
        return vec![Frame::Unrecognized];
    };

    if obj.contains_key("bids") || obj.contains_key("asks") {
        let top = BookTop::from_levels(&levels(obj.get("bids")), &levels(obj.get("asks")));
        if !top.is_empty() {
            return vec![Frame::Book { asset_id, top }];
        }
    }

    if let Some(top) = best_prices(obj) {
        return vec![Frame::Book { asset_id, top }];
    }

    match scalar_price(obj) {
        Some(price) => vec![Frame::Scalar { asset_id, price }],
        None => vec![Frame::Unrecognized],
    }
}

/// Best bid/ask from a REST order-book body (`{bids: [...], asks: [...]}`).
pub fn book_top_from_value(body: &Value) -> BookTop {
    BookTop::from_levels(&levels(body.get("bids")), &levels(body.get("asks")))
}

fn server_error(obj: &Map<String, Value>) -> Option<String> {
    let flagged = obj.get("type").and_then(Value::as_str) == Some("error");
    match obj.get("error") {
        Some(Value::Null) | None if !flagged => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .unwrap_or("unspecified server error")
                .to_string(),
        ),
        Some(other) => Some(other.to_string()),
    }
}

fn asset_id(obj: &Map<String, Value>) -> Option<MarketId> {
    ["asset_id", "assetId"]
        .iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(MarketId::from(s.as_str())),
            Value::Number(n) => Some(MarketId::from(n.to_string())),
            _ => None,
        })
}

fn best_prices(obj: &Map<String, Value>) -> Option<BookTop> {
    let top = BookTop::new(
        obj.get("best_bid").and_then(decimal),
        obj.get("best_ask").and_then(decimal),
    );
    (!top.is_empty()).then_some(top)
}

fn scalar_price(obj: &Map<String, Value>) -> Option<Price> {
    obj.get("yes_price")
        .and_then(decimal)
        .or_else(|| obj.get("outcome_prices").and_then(first_outcome_price))
        .or_else(|| obj.get("price").and_then(decimal))
}

/// `outcome_prices` arrives either as an array or as a JSON-encoded string of one
fn first_outcome_price(value: &Value) -> Option<Price> {
    match value {
        Value::Array(prices) => prices.first().and_then(decimal),
        Value::String(encoded) => serde_json::from_str::<Vec<Value>>(encoded)
            .ok()?
            .first()
            .and_then(decimal),
        _ => None,
    }
}

fn levels(value: Option<&Value>) -> Vec<BookLevel> {
    let Some(Value::Array(raw)) = value else {
        return Vec::new();
    };
    raw.iter()
        .filter_map(|level| {
            let (price, size) = match level {
                Value::Array(pair) => (pair.first()?, pair.get(1)),
                Value::Object(obj) => (obj.get("price")?, obj.get("size")),
                _ => return None,
            };
            let price = decimal(price)?;
            let size = size.and_then(decimal).unwrap_or(Decimal::ZERO);
            Some(BookLevel::new(price, size))
        })
        .collect()
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => parse_decimal(s.trim()),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    if s.is_empty() {
        return None;
    }
    // ".5" and "-.5" show up on the wire
    let normalized = if let Some(rest) = s.strip_prefix("-.") {
        format!("-0.{rest}")
    } else if let Some(rest) = s.strip_prefix('.') {
        format!("0.{rest}")
    } else {
        s.to_string()
    };
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .ok()
}
