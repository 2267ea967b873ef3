//! # Crossfeed Publisher
//! X (Twitter) client: OAuth 1.0a request signing, media upload, post
//! creation with reply threading.

pub mod oauth;
pub mod twitter;

pub use twitter::TwitterClient;
