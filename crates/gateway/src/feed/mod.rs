//! The price feed core: registry, drivers and the state machine tying them
//! together.

pub mod fallback;
pub mod keepalive;
pub mod machine;
pub mod reconnect;
pub mod registry;
pub mod timer;

pub use fallback::{FallbackConfig, PollingFallback};
pub use keepalive::{KeepAlive, KeepAliveConfig};
pub use machine::{Action, FeedMachine, FeedStatus, Phase};
pub use reconnect::{ReconnectConfig, ReconnectDecision, ReconnectPolicy};
pub use registry::{Listener, ListenerId, PriceCallback, Registry};
pub use timer::Timer;
