//! Scheduler loop — periodic tick that claims due queue entries and
//! drives them through duplicate gating to the executor.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crossfeed_core::error::RelayError;
use crossfeed_core::types::QueueEntry;
use crossfeed_store::{HashLedger, ledger};

use crate::Relay;
use crate::executor::cleanup_files;

/// Outcome of hashing a claimed entry against the ledger.
enum DupVerdict {
    Fresh,
    Duplicate,
    /// A media file is gone or unreadable; retrying cannot help.
    Unreadable(RelayError),
}

/// Run the scheduler loop forever. First tick fires after the
/// configured initial delay, then every `tick_secs`.
pub async fn run(relay: Arc<Relay>) {
    let settings = &relay.config.relay;
    tracing::info!("⏰ Scheduler started (tick every {}s)", settings.tick_secs);
    tokio::time::sleep(std::time::Duration::from_secs(settings.initial_delay_secs)).await;

    let mut interval =
        tokio::time::interval(std::time::Duration::from_secs(settings.tick_secs));
    loop {
        interval.tick().await;
        tick(&relay).await;
    }
}

/// One scheduler pass: sweep stale approvals, then dispatch due work in
/// ascending schedule order.
pub async fn tick(relay: &Arc<Relay>) {
    let now = Utc::now();
    sweep_expired_approvals(relay, now).await;

    let due = match relay.queue.claim_due(now.timestamp()) {
        Ok(due) => due,
        Err(e) => {
            tracing::error!("Queue claim failed: {e}");
            return;
        }
    };
    if due.is_empty() {
        return;
    }
    tracing::info!("🔔 {} due queue entries", due.len());

    for entry in due {
        match duplicate_check(&entry, &relay.ledger) {
            DupVerdict::Fresh => relay.executor.execute(entry).await,
            DupVerdict::Duplicate => {
                let id = relay
                    .approvals
                    .lock()
                    .unwrap()
                    .create(entry.media.clone(), entry.caption.clone());
                if let Err(e) = relay.queue.complete(entry.id) {
                    tracing::error!("Could not complete queue entry #{}: {e}", entry.id);
                }
                tracing::info!("Duplicate content in entry #{}, approval #{id} pending", entry.id);
                relay
                    .notify(&format!(
                        "⚠️ Duplicate media detected. Send /ok {id} to post anyway or /ignore {id} to skip."
                    ))
                    .await;
            }
            DupVerdict::Unreadable(e) => {
                cleanup_files(&entry.media);
                if let Err(e) = relay.queue.complete(entry.id) {
                    tracing::error!("Could not complete queue entry #{}: {e}", entry.id);
                }
                relay
                    .notify(&format!("❌ Skipping queued post, media unreadable: {e}"))
                    .await;
            }
        }
    }
}

/// True iff at least one file's content hash is already in the ledger.
fn duplicate_check(entry: &QueueEntry, ledger: &Mutex<HashLedger>) -> DupVerdict {
    let ledger = ledger.lock().unwrap();
    for item in &entry.media {
        match ledger::hash_file(&item.path) {
            Ok(hash) if ledger.contains(&hash) => return DupVerdict::Duplicate,
            Ok(_) => {}
            Err(e) => return DupVerdict::Unreadable(e),
        }
    }
    DupVerdict::Fresh
}

async fn sweep_expired_approvals(relay: &Arc<Relay>, now: DateTime<Utc>) {
    let cutoff = now - Duration::seconds(relay.config.relay.approval_ttl_secs);
    let expired = relay.approvals.lock().unwrap().expire_before(cutoff);
    for request in expired {
        cleanup_files(&request.media);
        tracing::info!("Approval #{} expired", request.id);
        relay
            .notify(&format!(
                "⏱️ Approval #{} timed out; post skipped, files discarded.",
                request.id
            ))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossfeed_core::types::{MediaItem, MediaKind};
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("crossfeed-test-engine-{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn entry_with(paths: &[PathBuf]) -> QueueEntry {
        QueueEntry {
            id: 1,
            media: paths
                .iter()
                .map(|p| MediaItem::new(p, MediaKind::Photo))
                .collect(),
            caption: String::new(),
            scheduled_at: 0,
            attempts: 0,
        }
    }

    #[test]
    fn test_fresh_files_pass() {
        let dir = scratch_dir("fresh");
        let file = dir.join("new.jpg");
        std::fs::write(&file, b"fresh bytes").unwrap();

        let ledger = Mutex::new(HashLedger::load(&dir.join("ledger.txt")).unwrap());
        let verdict = duplicate_check(&entry_with(&[file]), &ledger);
        assert!(matches!(verdict, DupVerdict::Fresh));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_any_known_hash_flags_duplicate() {
        let dir = scratch_dir("dup");
        let fresh = dir.join("fresh.jpg");
        let known = dir.join("known.jpg");
        std::fs::write(&fresh, b"unseen").unwrap();
        std::fs::write(&known, b"seen before").unwrap();

        let mut hl = HashLedger::load(&dir.join("ledger.txt")).unwrap();
        hl.record(&ledger::hash_file(&known).unwrap()).unwrap();
        let ledger = Mutex::new(hl);

        let verdict = duplicate_check(&entry_with(&[fresh, known]), &ledger);
        assert!(matches!(verdict, DupVerdict::Duplicate));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let dir = scratch_dir("gone");
        let ledger = Mutex::new(HashLedger::load(&dir.join("ledger.txt")).unwrap());
        let verdict = duplicate_check(&entry_with(&[dir.join("vanished.jpg")]), &ledger);
        assert!(matches!(verdict, DupVerdict::Unreadable(_)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
