//! Wire message types for the exchange market channel
//!
//! Outbound: the batched subscription announcement. Inbound: frames decoded
//! into a closed set of variants, see [`inbound::Frame`].

pub mod inbound;
pub mod outbound;

pub use inbound::{Frame, FrameDecoder, book_top_from_value};
pub use outbound::SubscribeRequest;
