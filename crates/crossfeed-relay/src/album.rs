//! Album assembly — debounced grouping of media bursts into one post.
//!
//! Telegram delivers an album as a burst of separate messages sharing a
//! `media_group_id`. Each arrival restarts the group's debounce timer;
//! the group is finalized only after a quiet period.

use std::collections::HashMap;

use tokio::task::JoinHandle;

use crossfeed_core::types::{MediaItem, MediaKind};

/// (origin chat id, media group id)
pub type AlbumKey = (i64, String);

struct AlbumBuffer {
    items: Vec<MediaItem>,
    caption: String,
}

/// Owns the per-group buffers and their debounce timer handles.
/// At most one buffer exists per key at any time.
pub struct AlbumAssembler {
    buffers: HashMap<AlbumKey, AlbumBuffer>,
    timers: HashMap<AlbumKey, JoinHandle<()>>,
    max_photos: usize,
}

impl AlbumAssembler {
    pub fn new(max_photos: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            timers: HashMap::new(),
            max_photos,
        }
    }

    /// Append an item to the group's buffer, creating it on first use.
    /// The first non-empty caption sticks.
    pub fn push(&mut self, key: AlbumKey, item: MediaItem, caption: &str) {
        let buffer = self.buffers.entry(key).or_insert_with(|| AlbumBuffer {
            items: Vec::new(),
            caption: String::new(),
        });
        if buffer.caption.is_empty() && !caption.is_empty() {
            buffer.caption = caption.to_string();
        }
        buffer.items.push(item);
    }

    /// Register the group's new debounce timer, returning the replaced
    /// handle so the caller can abort it. The old timer must not fire.
    pub fn arm_timer(&mut self, key: AlbumKey, handle: JoinHandle<()>) -> Option<JoinHandle<()>> {
        self.timers.insert(key, handle)
    }

    /// Consume the buffer and return the composed media plus caption.
    /// Returns None when the buffer was already consumed — a finalize
    /// that lost the race with a cancel is a silent no-op.
    pub fn finalize(&mut self, key: &AlbumKey) -> Option<(Vec<MediaItem>, String)> {
        self.timers.remove(key);
        let buffer = self.buffers.remove(key)?;
        Some((compose(buffer.items, self.max_photos), buffer.caption))
    }

    pub fn pending_groups(&self) -> usize {
        self.buffers.len()
    }
}

/// Media ordering policy shared by assembly and execution:
/// - exactly one video with photos: video anchors, photos follow;
/// - two or more videos: videos, then photos, then the rest;
/// - photos only: the first `max_photos`;
/// - anything else: the single first item.
pub fn compose(mut items: Vec<MediaItem>, max_photos: usize) -> Vec<MediaItem> {
    let of_kind = |items: &[MediaItem], kind: MediaKind| {
        items
            .iter()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect::<Vec<_>>()
    };
    let videos = of_kind(&items, MediaKind::Video);
    let photos = of_kind(&items, MediaKind::Photo);

    if videos.len() == 1 && !photos.is_empty() {
        let mut out = videos;
        out.extend(photos);
        out
    } else if videos.len() >= 2 {
        let mut out = videos;
        out.extend(photos);
        out.extend(of_kind(&items, MediaKind::Document));
        out
    } else if photos.len() == items.len() && !items.is_empty() {
        items.truncate(max_photos);
        items
    } else {
        // single first item, in arrival order
        items.truncate(1);
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(n: u32) -> MediaItem {
        MediaItem::new(format!("/tmp/p{n}.jpg"), MediaKind::Photo)
    }
    fn video(n: u32) -> MediaItem {
        MediaItem::new(format!("/tmp/v{n}.mp4"), MediaKind::Video)
    }
    fn doc(n: u32) -> MediaItem {
        MediaItem::new(format!("/tmp/d{n}.pdf"), MediaKind::Document)
    }

    #[test]
    fn test_compose_video_anchors_photos() {
        let out = compose(vec![photo(1), video(1), photo(2), photo(3)], 4);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].kind, MediaKind::Video);
        assert!(out[1..].iter().all(|m| m.kind == MediaKind::Photo));
    }

    #[test]
    fn test_compose_photos_capped_at_limit() {
        let out = compose((1..=5).map(photo).collect(), 4);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].path, photo(1).path);
        assert_eq!(out[3].path, photo(4).path);
    }

    #[test]
    fn test_compose_multi_video_ordering() {
        let out = compose(vec![doc(1), video(1), photo(1), video(2)], 4);
        let kinds: Vec<MediaKind> = out.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MediaKind::Video,
                MediaKind::Video,
                MediaKind::Photo,
                MediaKind::Document
            ]
        );
    }

    #[test]
    fn test_compose_mixed_fallback_takes_first_arrival() {
        // photo + document is not "only photos": first arrival wins
        let out = compose(vec![doc(1), photo(1)], 4);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, MediaKind::Document);

        let out = compose(vec![video(1)], 4);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].kind, MediaKind::Video);
    }

    #[test]
    fn test_compose_is_stable_on_its_own_output() {
        let once = compose(vec![video(1), photo(1), photo(2), photo(3)], 4);
        let twice = compose(once.clone(), 4);
        let paths =
            |v: &[MediaItem]| v.iter().map(|m| m.path.clone()).collect::<Vec<_>>();
        assert_eq!(paths(&once), paths(&twice));
    }

    #[test]
    fn test_first_nonempty_caption_sticks() {
        let mut assembler = AlbumAssembler::new(4);
        let key = (1, "g1".to_string());
        assembler.push(key.clone(), photo(1), "");
        assembler.push(key.clone(), photo(2), "the caption");
        assembler.push(key.clone(), photo(3), "a later caption");

        let (media, caption) = assembler.finalize(&key).unwrap();
        assert_eq!(media.len(), 3);
        assert_eq!(caption, "the caption");
    }

    #[test]
    fn test_finalize_twice_is_silent_noop() {
        let mut assembler = AlbumAssembler::new(4);
        let key = (1, "g1".to_string());
        assembler.push(key.clone(), photo(1), "c");

        assert!(assembler.finalize(&key).is_some());
        assert!(assembler.finalize(&key).is_none());
        assert_eq!(assembler.pending_groups(), 0);
    }

    #[test]
    fn test_one_buffer_per_key() {
        let mut assembler = AlbumAssembler::new(4);
        assembler.push((1, "g1".into()), photo(1), "");
        assembler.push((1, "g1".into()), photo(2), "");
        assembler.push((2, "g1".into()), photo(3), "");
        assert_eq!(assembler.pending_groups(), 2);
    }
}
