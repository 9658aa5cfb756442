use thiserror::Error;

/// Errors raised while fetching a quote from a polled price source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuoteError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Upstream returned status {0}")]
    Status(u16),

    #[error("Unparseable quote: {0}")]
    Parse(String),
}

pub type QuoteResult<T> = std::result::Result<T, QuoteError>;
