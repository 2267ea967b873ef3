//! Post execution — upload, thread composition, ledger update, and the
//! requeue policy for failures.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crossfeed_channels::TelegramChannel;
use crossfeed_core::config::RelaySettings;
use crossfeed_core::error::{RelayError, Result};
use crossfeed_core::types::{MediaItem, QueueEntry};
use crossfeed_publisher::TwitterClient;
use crossfeed_store::{HashLedger, PostQueue, ledger};

use crate::album::compose;

pub struct PostExecutor {
    twitter: Arc<TwitterClient>,
    telegram: Arc<TelegramChannel>,
    queue: Arc<PostQueue>,
    ledger: Arc<Mutex<HashLedger>>,
    settings: RelaySettings,
    admin_chat_id: i64,
}

impl PostExecutor {
    pub fn new(
        twitter: Arc<TwitterClient>,
        telegram: Arc<TelegramChannel>,
        queue: Arc<PostQueue>,
        ledger: Arc<Mutex<HashLedger>>,
        settings: RelaySettings,
        admin_chat_id: i64,
    ) -> Self {
        Self {
            twitter,
            telegram,
            queue,
            ledger,
            settings,
            admin_chat_id,
        }
    }

    /// Drive one claimed entry to a definitive outcome or a requeue.
    pub async fn execute(&self, entry: QueueEntry) {
        tracing::info!(
            "Posting entry #{} ({} media, attempt {})",
            entry.id,
            entry.media.len(),
            entry.attempts + 1
        );
        match self.post_thread(&entry).await {
            Ok(anchor_id) => {
                let url = self.twitter.post_url(&anchor_id);
                self.record_success(&entry, &url).await;
            }
            Err(e) if e.is_rate_limited() => {
                let delay = self.settings.rate_limit_delay_secs;
                self.requeue(entry, delay, "⏱️ Rate limited by X", &e).await;
            }
            Err(e) => {
                let delay = self.settings.retry_delay_secs;
                self.requeue(entry, delay, "❌ Posting failed", &e).await;
            }
        }
    }

    /// Anchor post plus sequential replies, one upload + one post call
    /// per item, paced between platform calls.
    async fn post_thread(&self, entry: &QueueEntry) -> Result<String> {
        if entry.media.is_empty() {
            return self.twitter.create_post(&entry.caption, &[], None).await;
        }

        let ordered = compose(entry.media.clone(), self.settings.max_photos);
        let pacing = std::time::Duration::from_millis(self.settings.pacing_ms);
        let mut anchor: Option<String> = None;
        for item in &ordered {
            if anchor.is_some() {
                tokio::time::sleep(pacing).await;
            }
            let media_id = self.twitter.upload_media(&item.path, item.kind).await?;
            let text = if anchor.is_none() {
                entry.caption.as_str()
            } else {
                ""
            };
            let id = self
                .twitter
                .create_post(text, &[media_id], anchor.as_deref())
                .await?;
            if anchor.is_none() {
                anchor = Some(id);
            }
        }
        anchor.ok_or_else(|| RelayError::Publish("empty media composition".into()))
    }

    async fn record_success(&self, entry: &QueueEntry, url: &str) {
        // Hash before the files are deleted.
        {
            let mut ledger = self.ledger.lock().unwrap();
            for item in &entry.media {
                match ledger::hash_file(&item.path) {
                    Ok(h) => {
                        if let Err(e) = ledger.record(&h) {
                            tracing::warn!("Ledger append failed for {}: {e}", item.path.display());
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Could not hash {}: {e}", item.path.display());
                    }
                }
            }
        }
        self.write_last_post(url, &entry.caption);
        cleanup_files(&entry.media);
        if let Err(e) = self.queue.complete(entry.id) {
            tracing::error!("Could not complete queue entry #{}: {e}", entry.id);
        }
        self.notify(&format!("✅ Posted to X: {url}")).await;
    }

    /// Reinsert the payload under a new id, then drop the claimed row.
    /// Files are kept for the retry. After `max_attempts` failures the
    /// entry is dropped instead.
    async fn requeue(&self, entry: QueueEntry, delay_secs: i64, label: &str, err: &RelayError) {
        let attempts = entry.attempts + 1;
        if attempts >= self.settings.max_attempts {
            cleanup_files(&entry.media);
            if let Err(e) = self.queue.complete(entry.id) {
                tracing::error!("Could not complete queue entry #{}: {e}", entry.id);
            }
            self.notify(&format!(
                "❌ Giving up after {attempts} attempts: {err}"
            ))
            .await;
            return;
        }

        let when = Utc::now().timestamp() + delay_secs;
        // Insert before completing: a crash in between means a double
        // retry on restart rather than a lost post.
        match self
            .queue
            .insert(&entry.media, &entry.caption, when, attempts)
        {
            Ok(new_id) => {
                if let Err(e) = self.queue.complete(entry.id) {
                    tracing::error!("Could not complete queue entry #{}: {e}", entry.id);
                }
                self.notify(&format!(
                    "{label}: {err}\nRequeued as #{new_id} in {delay_secs}s (attempt {attempts}/{})",
                    self.settings.max_attempts
                ))
                .await;
            }
            Err(store_err) => {
                // Store unreachable: leave the row inflight; startup
                // recovery will requeue it.
                tracing::error!(
                    "Requeue of entry #{} failed, leaving inflight: {store_err}",
                    entry.id
                );
                self.notify(&format!("❌ Store failure while requeuing: {store_err}"))
                    .await;
            }
        }
    }

    pub async fn notify(&self, text: &str) {
        if let Err(e) = self.telegram.send_message(self.admin_chat_id, text).await {
            tracing::warn!("Failed to notify operator: {e}");
        }
    }

    fn last_post_path(&self) -> PathBuf {
        self.settings.data_path().join("last_post.txt")
    }

    /// Two lines: post URL, caption.
    fn write_last_post(&self, url: &str, caption: &str) {
        let path = self.last_post_path();
        if let Err(e) = std::fs::write(&path, format!("{url}\n{caption}\n")) {
            tracing::warn!("Could not write last-post record: {e}");
        }
    }
}

/// Delete media files after a definitive outcome (posted or discarded).
/// Never called on requeue paths — retries need the files.
pub fn cleanup_files(media: &[MediaItem]) {
    for item in media {
        if let Err(e) = std::fs::remove_file(&item.path) {
            tracing::debug!("Could not remove {}: {e}", item.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossfeed_core::types::MediaKind;

    #[test]
    fn test_cleanup_removes_files_and_tolerates_missing() {
        let dir = std::env::temp_dir().join("crossfeed-test-cleanup");
        std::fs::create_dir_all(&dir).unwrap();
        let existing = dir.join("a.jpg");
        std::fs::write(&existing, b"x").unwrap();

        let media = vec![
            MediaItem::new(&existing, MediaKind::Photo),
            MediaItem::new(dir.join("never-existed.jpg"), MediaKind::Photo),
        ];
        cleanup_files(&media);
        assert!(!existing.exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
