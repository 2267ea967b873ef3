//! Inbound handling — routes updates to operator commands or channel
//! ingestion, downloads media, and feeds the album assembler.

use std::sync::Arc;

use chrono::Utc;

use crossfeed_channels::{TelegramMessage, TelegramUpdate};
use crossfeed_core::types::MediaItem;

use crate::Relay;
use crate::album::AlbumKey;
use crate::commands;
use crate::directive;
use crate::executor::cleanup_files;

impl Relay {
    /// Entry point for every polled update.
    pub async fn handle_update(self: &Arc<Self>, update: TelegramUpdate) {
        let Some(msg) = update.message.or(update.channel_post) else {
            return;
        };

        // Posts from the watched channel are relayed.
        if msg.chat.username.as_deref() == Some(self.config.telegram.channel_username()) {
            self.ingest_post(msg).await;
            return;
        }

        // Everything else only matters if it is a command.
        if let Some(text) = msg.text.clone()
            && text.starts_with('/')
        {
            commands::handle_command(self, msg.chat.id, &text).await;
        }
    }

    /// Relay one channel post: tag and download its media, then route it
    /// through the album assembler or straight to the queue.
    pub async fn ingest_post(self: &Arc<Self>, msg: TelegramMessage) {
        let spool = self.config.relay.spool_path();
        let caption = msg.caption_or_text().to_string();

        let Some((file_id, kind)) = msg.media() else {
            // Text-only post.
            if caption.is_empty() {
                return;
            }
            self.enqueue(Vec::new(), &caption).await;
            return;
        };

        let path = match self.telegram.download_file(&file_id, &spool).await {
            Ok(path) => path,
            Err(e) => {
                // Download failures drop the item; it never enters the queue.
                tracing::error!("Dropping media item from message {}: {e}", msg.message_id);
                return;
            }
        };
        let item = MediaItem::new(path, kind);

        match msg.media_group_id.clone() {
            Some(group_id) => {
                let key: AlbumKey = (msg.chat.id, group_id);
                self.albums
                    .lock()
                    .unwrap()
                    .push(key.clone(), item, &caption);
                self.arm_album_timer(key);
            }
            None => self.enqueue(vec![item], &caption).await,
        }
    }

    /// Restart the group's debounce timer. The previous timer is
    /// aborted outright; only a full quiet period finalizes the album.
    fn arm_album_timer(self: &Arc<Self>, key: AlbumKey) {
        let delay = std::time::Duration::from_millis(self.config.relay.album_settle_ms);
        let relay = Arc::clone(self);
        let timer_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            relay.finalize_album(&timer_key).await;
        });
        if let Some(old) = self.albums.lock().unwrap().arm_timer(key, handle) {
            old.abort();
        }
    }

    /// Debounce expiry for one album group. A buffer already consumed
    /// by an earlier finalize is tolerated silently.
    pub async fn finalize_album(self: &Arc<Self>, key: &AlbumKey) {
        let finalized = self.albums.lock().unwrap().finalize(key);
        if let Some((media, caption)) = finalized {
            tracing::info!("Album ({}, {}) settled with {} items", key.0, key.1, media.len());
            self.enqueue(media, &caption).await;
        }
    }

    /// Parse scheduling directives, strip them from the caption, and
    /// insert one queue entry. Acknowledges the operator with the
    /// resolved schedule time.
    async fn enqueue(&self, media: Vec<MediaItem>, raw_caption: &str) {
        let now = Utc::now();
        let when = directive::parse_schedule(raw_caption, now);
        let mut caption = directive::strip_schedule(raw_caption);
        if caption.is_empty() && !media.is_empty() {
            caption = self.config.relay.default_caption.clone();
        }

        match self.queue.insert(&media, &caption, when.timestamp(), 0) {
            Ok(id) => {
                let when_fmt = when.format("%Y-%m-%d %H:%M UTC");
                tracing::info!("📬 Queued entry #{id} for {when_fmt} ({} media)", media.len());
                self.notify(&format!(
                    "📬 Queued #{id} for {when_fmt} ({} media).",
                    media.len()
                ))
                .await;
            }
            Err(e) => {
                // Persistence failure: surface loudly, release the files.
                tracing::error!("Queue insert failed, dropping post: {e}");
                cleanup_files(&media);
                self.notify(&format!("❌ Failed to queue post: {e}")).await;
            }
        }
    }
}
