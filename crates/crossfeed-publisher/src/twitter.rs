//! X API client — v1.1 media upload + v2 post creation.

use std::path::Path;

use serde::Deserialize;

use crossfeed_core::config::TwitterConfig;
use crossfeed_core::error::{RelayError, Result};
use crossfeed_core::types::MediaKind;

use crate::oauth::{self, OauthKeys};

const UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";
const TWEET_URL: &str = "https://api.twitter.com/2/tweets";

pub struct TwitterClient {
    keys: OauthKeys,
    client: reqwest::Client,
}

impl TwitterClient {
    pub fn new(config: &TwitterConfig) -> Self {
        Self {
            keys: OauthKeys {
                consumer_key: config.consumer_key.clone(),
                consumer_secret: config.consumer_secret.clone(),
                access_token: config.access_token.clone(),
                access_secret: config.access_secret.clone(),
            },
            client: reqwest::Client::new(),
        }
    }

    /// Upload one media file; returns the platform media id.
    pub async fn upload_media(&self, path: &Path, kind: MediaKind) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".into());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let mut form = reqwest::multipart::Form::new().part("media", part);
        if let Some(category) = media_category(kind) {
            form = form.text("media_category", category);
        }

        // Multipart bodies do not participate in the OAuth signature.
        let auth = oauth::authorization_header(&self.keys, "POST", UPLOAD_URL, &[]);
        let response = self
            .client
            .post(UPLOAD_URL)
            .header(reqwest::header::AUTHORIZATION, auth)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::Publish(format!("media upload failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error("media upload", status, &body));
        }
        let body: MediaUploadResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Publish(format!("invalid upload response: {e}")))?;
        tracing::debug!("Uploaded {} as media {}", path.display(), body.media_id_string);
        Ok(body.media_id_string)
    }

    /// Create a post; returns its id. Pass `in_reply_to` to thread it.
    pub async fn create_post(
        &self,
        text: &str,
        media_ids: &[String],
        in_reply_to: Option<&str>,
    ) -> Result<String> {
        let mut body = serde_json::Map::new();
        if !text.is_empty() || media_ids.is_empty() {
            body.insert("text".into(), serde_json::json!(text));
        }
        if !media_ids.is_empty() {
            body.insert("media".into(), serde_json::json!({ "media_ids": media_ids }));
        }
        if let Some(id) = in_reply_to {
            body.insert("reply".into(), serde_json::json!({ "in_reply_to_tweet_id": id }));
        }

        let auth = oauth::authorization_header(&self.keys, "POST", TWEET_URL, &[]);
        let response = self
            .client
            .post(TWEET_URL)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(&serde_json::Value::Object(body))
            .send()
            .await
            .map_err(|e| RelayError::Publish(format!("post creation failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error("post creation", status, &body));
        }
        let parsed: TweetResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Publish(format!("invalid post response: {e}")))?;
        Ok(parsed.data.id)
    }

    /// Public URL of a post.
    pub fn post_url(&self, id: &str) -> String {
        format!("https://x.com/i/status/{id}")
    }
}

fn media_category(kind: MediaKind) -> Option<&'static str> {
    match kind {
        MediaKind::Photo => Some("tweet_image"),
        MediaKind::Video => Some("tweet_video"),
        MediaKind::Document => None,
    }
}

fn api_error(what: &str, status: reqwest::StatusCode, body: &str) -> RelayError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        RelayError::RateLimited(format!("{what}: HTTP 429 {body}"))
    } else {
        RelayError::Publish(format!("{what}: HTTP {status} {body}"))
    }
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct TweetResponse {
    data: TweetData,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_maps_to_dedicated_variant() {
        let err = api_error("post creation", reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_rate_limited());

        let err = api_error("post creation", reqwest::StatusCode::FORBIDDEN, "nope");
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_post_url() {
        let client = TwitterClient::new(&TwitterConfig::default());
        assert_eq!(client.post_url("123"), "https://x.com/i/status/123");
    }

    #[test]
    fn test_media_category_by_kind() {
        assert_eq!(media_category(MediaKind::Photo), Some("tweet_image"));
        assert_eq!(media_category(MediaKind::Video), Some("tweet_video"));
        assert_eq!(media_category(MediaKind::Document), None);
    }
}
