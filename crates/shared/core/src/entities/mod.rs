mod book;
mod market;
mod odds;

pub use book::{BookLevel, BookTop};
pub use market::MarketId;
pub use odds::Odds;
