use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Price value as quoted by the exchange (probability in dollars per share)
pub type Price = Decimal;

/// Share quantity resting at a price level
pub type Quantity = Decimal;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;
