mod feed;
pub mod loader;
pub mod types;

pub use feed::FeedConfig;
pub use loader::{load_config, load_config_from_str, load_default_config};
pub use types::{
    FallbackConfigJson, FallbackMode, FeedConfigFile, KeepAliveConfigJson, ReconnectConfigJson,
};
