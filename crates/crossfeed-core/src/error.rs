//! Error taxonomy for the relay pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Chat platform (Telegram) call failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// Inbound file retrieval failed — the item is dropped, never queued.
    #[error("download failed: {0}")]
    Download(String),

    /// Posting platform rejected us with throttling. Requeued, not fatal.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other posting failure. Requeued, not fatal.
    #[error("publish error: {0}")]
    Publish(String),

    /// The durable store is unreachable. Fatal for the affected operation.
    #[error("store error: {0}")]
    Store(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// True when the failure is destination-platform throttling.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RelayError::RateLimited(_))
    }
}
