//! Shared data model for the relay pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Media classification, assigned once at ingestion and carried through
/// every downstream component. Nothing re-infers the kind from a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

/// A downloaded media file waiting to be posted or discarded.
///
/// Ephemeral: the local file is deleted once the post succeeds or the
/// item is discarded, never while it is merely requeued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaItem {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaItem {
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// A pending post as stored in the persistent queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Queue row id; 0 marks an entry that was never persisted
    /// (an approved duplicate handed straight to the executor).
    pub id: i64,
    pub media: Vec<MediaItem>,
    pub caption: String,
    /// UTC epoch seconds.
    pub scheduled_at: i64,
    /// Failed posting attempts so far.
    pub attempts: u32,
}

impl QueueEntry {
    pub fn scheduled_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.scheduled_at, 0)
    }

    /// True once the scheduled time has been reached.
    pub fn is_due(&self, now: i64) -> bool {
        self.scheduled_at <= now
    }
}

/// A duplicate post awaiting an operator decision.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub id: u64,
    pub media: Vec<MediaItem>,
    pub caption: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_serde() {
        let item = MediaItem::new("/tmp/a.jpg", MediaKind::Photo);
        let json = serde_json::to_string(&vec![item]).unwrap();
        assert!(json.contains("\"photo\""));
        let back: Vec<MediaItem> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[0].kind, MediaKind::Photo);
    }

    #[test]
    fn test_entry_due() {
        let entry = QueueEntry {
            id: 1,
            media: vec![],
            caption: String::new(),
            scheduled_at: 1_000,
            attempts: 0,
        };
        assert!(entry.is_due(1_000));
        assert!(entry.is_due(2_000));
        assert!(!entry.is_due(999));
    }
}
