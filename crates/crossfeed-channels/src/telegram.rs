//! Telegram Bot channel — long polling, media download, message sending
//! via Bot API.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::Stream;
use serde::{Deserialize, Serialize};

use crossfeed_core::config::TelegramConfig;
use crossfeed_core::error::{RelayError, Result};
use crossfeed_core::types::MediaKind;

/// Telegram Bot channel with polling loop.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
    last_update_id: i64,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            last_update_id: 0,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{}",
            self.config.bot_token, method
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.config.bot_token, file_path
        )
    }

    /// Get updates using long polling.
    pub async fn get_updates(&mut self) -> Result<Vec<TelegramUpdate>> {
        let response = self
            .client
            .get(self.api_url("getUpdates"))
            .query(&[
                ("offset", (self.last_update_id + 1).to_string()),
                ("timeout", "30".into()),
                (
                    "allowed_updates",
                    "[\"message\",\"channel_post\"]".into(),
                ),
            ])
            .send()
            .await
            .map_err(|e| RelayError::Channel(format!("Telegram getUpdates failed: {e}")))?;

        let body: TelegramApiResponse<Vec<TelegramUpdate>> = response
            .json()
            .await
            .map_err(|e| RelayError::Channel(format!("Invalid Telegram response: {e}")))?;

        if !body.ok {
            return Err(RelayError::Channel(format!(
                "Telegram API error: {}",
                body.description.unwrap_or_default()
            )));
        }

        let updates = body.result.unwrap_or_default();
        if let Some(last) = updates.last() {
            self.last_update_id = last.update_id;
        }
        Ok(updates)
    }

    /// Send a plain-text message.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Channel(format!("sendMessage failed: {e}")))?;

        let result: TelegramApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| RelayError::Channel(format!("Invalid send response: {e}")))?;

        if !result.ok {
            return Err(RelayError::Channel(format!(
                "Send failed: {}",
                result.description.unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// Get bot info.
    pub async fn get_me(&self) -> Result<TelegramUser> {
        let response = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| RelayError::Channel(format!("getMe failed: {e}")))?;
        let body: TelegramApiResponse<TelegramUser> = response
            .json()
            .await
            .map_err(|e| RelayError::Channel(format!("Invalid getMe response: {e}")))?;
        body.result
            .ok_or_else(|| RelayError::Channel("No bot info".into()))
    }

    /// Download a file by id into `dest_dir`. Returns the local path.
    pub async fn download_file(&self, file_id: &str, dest_dir: &Path) -> Result<PathBuf> {
        let response = self
            .client
            .get(self.api_url("getFile"))
            .query(&[("file_id", file_id)])
            .send()
            .await
            .map_err(|e| RelayError::Download(format!("getFile failed: {e}")))?;
        let body: TelegramApiResponse<TelegramFile> = response
            .json()
            .await
            .map_err(|e| RelayError::Download(format!("Invalid getFile response: {e}")))?;
        let remote_path = body
            .result
            .and_then(|f| f.file_path)
            .ok_or_else(|| RelayError::Download(format!("No file path for {file_id}")))?;

        let bytes = self
            .client
            .get(self.file_url(&remote_path))
            .send()
            .await
            .map_err(|e| RelayError::Download(format!("File fetch failed: {e}")))?
            .bytes()
            .await
            .map_err(|e| RelayError::Download(format!("File body read failed: {e}")))?;

        tokio::fs::create_dir_all(dest_dir).await?;
        let ext = Path::new(&remote_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let local = dest_dir.join(format!("{}.{ext}", uuid::Uuid::new_v4()));
        tokio::fs::write(&local, &bytes).await?;
        tracing::debug!("Downloaded {file_id} -> {} ({} bytes)", local.display(), bytes.len());
        Ok(local)
    }

    /// Start polling loop — returns a stream of raw updates.
    pub fn start_polling(self) -> TelegramPollingStream {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut channel = self;
            tracing::info!("Telegram polling loop started");

            loop {
                match channel.get_updates().await {
                    Ok(updates) => {
                        for update in updates {
                            if tx.send(update).is_err() {
                                tracing::info!("Telegram polling stopped (receiver dropped)");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!("Telegram polling error: {e}");
                        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                    }
                }

                tokio::time::sleep(tokio::time::Duration::from_secs(
                    channel.config.poll_interval,
                ))
                .await;
            }
        });

        TelegramPollingStream { rx }
    }
}

/// Stream of incoming Telegram updates from polling.
pub struct TelegramPollingStream {
    rx: tokio::sync::mpsc::UnboundedReceiver<TelegramUpdate>,
}

impl Stream for TelegramPollingStream {
    type Item = TelegramUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Unpin for TelegramPollingStream {}

// --- Telegram API Types ---

#[derive(Debug, Deserialize)]
pub struct TelegramApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<TelegramMessage>,
    pub channel_post: Option<TelegramMessage>,
}

impl TelegramUpdate {
    /// The carried message, whether direct or a channel post.
    pub fn post(&self) -> Option<&TelegramMessage> {
        self.message.as_ref().or(self.channel_post.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub from: Option<TelegramUser>,
    pub chat: TelegramChat,
    pub date: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media_group_id: Option<String>,
    pub photo: Option<Vec<TelegramPhotoSize>>,
    pub video: Option<TelegramVideo>,
    pub document: Option<TelegramDocument>,
}

impl TelegramMessage {
    /// Caption if present, else text, else empty.
    pub fn caption_or_text(&self) -> &str {
        self.caption
            .as_deref()
            .or(self.text.as_deref())
            .unwrap_or("")
    }

    /// The message's media payload, tagged with its kind at the source.
    /// For photos Telegram sends every size; the last is the largest.
    pub fn media(&self) -> Option<(String, MediaKind)> {
        if let Some(video) = &self.video {
            return Some((video.file_id.clone(), MediaKind::Video));
        }
        if let Some(sizes) = &self.photo {
            return sizes
                .last()
                .map(|p| (p.file_id.clone(), MediaKind::Photo));
        }
        if let Some(doc) = &self.document {
            return Some((doc.file_id.clone(), MediaKind::Document));
        }
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramVideo {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramDocument {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    #[allow(dead_code)]
    pub file_id: String,
    pub file_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_picks_largest_size() {
        let msg: TelegramMessage = serde_json::from_value(serde_json::json!({
            "message_id": 1,
            "chat": {"id": 10, "type": "channel", "username": "feed"},
            "date": 0,
            "photo": [
                {"file_id": "small", "width": 90, "height": 90},
                {"file_id": "big", "width": 1280, "height": 1280}
            ]
        }))
        .unwrap();
        let (file_id, kind) = msg.media().unwrap();
        assert_eq!(file_id, "big");
        assert_eq!(kind, MediaKind::Photo);
    }

    #[test]
    fn test_video_wins_over_caption_text() {
        let msg: TelegramMessage = serde_json::from_value(serde_json::json!({
            "message_id": 2,
            "chat": {"id": 10, "type": "channel"},
            "date": 0,
            "caption": "clip",
            "video": {"file_id": "vid1"}
        }))
        .unwrap();
        assert_eq!(msg.media().unwrap().1, MediaKind::Video);
        assert_eq!(msg.caption_or_text(), "clip");
    }

    #[test]
    fn test_channel_post_update() {
        let update: TelegramUpdate = serde_json::from_value(serde_json::json!({
            "update_id": 77,
            "channel_post": {
                "message_id": 3,
                "chat": {"id": -100, "type": "channel", "username": "feed"},
                "date": 0,
                "text": "hello"
            }
        }))
        .unwrap();
        let post = update.post().unwrap();
        assert_eq!(post.caption_or_text(), "hello");
        assert_eq!(post.chat.username.as_deref(), Some("feed"));
    }

    #[test]
    fn test_text_only_has_no_media() {
        let msg: TelegramMessage = serde_json::from_value(serde_json::json!({
            "message_id": 4,
            "chat": {"id": 10, "type": "private"},
            "date": 0,
            "text": "/queue"
        }))
        .unwrap();
        assert!(msg.media().is_none());
    }
}
