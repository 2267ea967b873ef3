//! Operator commands addressed to the bot chat.

use std::sync::Arc;

use crossfeed_core::types::QueueEntry;

use crate::Relay;
use crate::approval::ResolveError;
use crate::executor::cleanup_files;

/// Handle a `/command` message. Every command is operator-only: any
/// other sender gets a rejection reply and causes no state change.
pub async fn handle_command(relay: &Arc<Relay>, chat_id: i64, text: &str) {
    let mut parts = text.split_whitespace();
    let Some(first) = parts.next() else { return };
    // tolerate the /cmd@botname form
    let cmd = first.split('@').next().unwrap_or(first);
    let arg = parts.next();

    if chat_id != relay.config.telegram.admin_chat_id {
        tracing::info!("Rejected {cmd} from unauthorized chat {chat_id}");
        relay
            .reply(chat_id, "You are not authorized to control this bot.")
            .await;
        return;
    }

    match cmd {
        "/ping" => relay.reply(chat_id, "pong").await,
        "/queue" => queue_listing(relay, chat_id).await,
        "/clearqueue" => clear_queue(relay, chat_id).await,
        "/ok" => approve(relay, chat_id, arg).await,
        "/ignore" => ignore(relay, chat_id, arg).await,
        "/approvals" => approvals_listing(relay, chat_id).await,
        _ => relay.reply(chat_id, "Unknown command.").await,
    }
}

async fn queue_listing(relay: &Arc<Relay>, chat_id: i64) {
    let entries = match relay.queue.peek_next(relay.config.relay.queue_preview) {
        Ok(entries) => entries,
        Err(e) => {
            relay.reply(chat_id, &format!("❌ Queue unavailable: {e}")).await;
            return;
        }
    };
    if entries.is_empty() {
        relay.reply(chat_id, "Queue is empty.").await;
        return;
    }
    let lines: Vec<String> = entries.iter().map(format_entry).collect();
    relay
        .reply(chat_id, &format!("Pending posts:\n{}", lines.join("\n")))
        .await;
}

fn format_entry(entry: &QueueEntry) -> String {
    let when = entry
        .scheduled_time()
        .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "?".into());
    format!(
        "#{} · {} · {} media · {}",
        entry.id,
        when,
        entry.media.len(),
        preview(&entry.caption)
    )
}

fn preview(caption: &str) -> String {
    let short: String = caption.chars().take(40).collect();
    if caption.chars().count() > 40 {
        format!("{short}…")
    } else {
        short
    }
}

async fn clear_queue(relay: &Arc<Relay>, chat_id: i64) {
    match relay.queue.clear() {
        Ok(removed) => {
            for entry in &removed {
                cleanup_files(&entry.media);
            }
            tracing::info!("Operator cleared {} queue entries", removed.len());
            relay
                .reply(chat_id, &format!("🗑 Cleared {} queued posts.", removed.len()))
                .await;
        }
        Err(e) => {
            relay.reply(chat_id, &format!("❌ Clear failed: {e}")).await;
        }
    }
}

async fn approve(relay: &Arc<Relay>, chat_id: i64, arg: Option<&str>) {
    let Some(request) = resolve(relay, chat_id, arg).await else {
        return;
    };
    relay.reply(chat_id, "Duplicate approved — posting now.").await;
    // id 0: the entry was completed out of the queue when the approval
    // was created, so the executor must not touch the row again.
    let entry = QueueEntry {
        id: 0,
        media: request.media,
        caption: request.caption,
        scheduled_at: chrono::Utc::now().timestamp(),
        attempts: 0,
    };
    let relay = Arc::clone(relay);
    tokio::spawn(async move {
        relay.executor.execute(entry).await;
    });
}

async fn ignore(relay: &Arc<Relay>, chat_id: i64, arg: Option<&str>) {
    let Some(request) = resolve(relay, chat_id, arg).await else {
        return;
    };
    cleanup_files(&request.media);
    tracing::info!("Approval #{} ignored by operator", request.id);
    relay
        .reply(chat_id, &format!("Duplicate #{} ignored — files discarded.", request.id))
        .await;
}

/// Shared id-resolution for /ok and /ignore, replying on failure.
async fn resolve(
    relay: &Arc<Relay>,
    chat_id: i64,
    arg: Option<&str>,
) -> Option<crossfeed_core::types::ApprovalRequest> {
    let id = match arg {
        Some(raw) => match raw.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                relay.reply(chat_id, &format!("Invalid approval id: {raw}")).await;
                return None;
            }
        },
        None => None,
    };
    let result = relay.approvals.lock().unwrap().resolve(id);
    match result {
        Ok(request) => Some(request),
        Err(ResolveError::NonePending) => {
            relay
                .reply(chat_id, "No duplicate is currently awaiting approval.")
                .await;
            None
        }
        Err(ResolveError::Ambiguous(n)) => {
            relay
                .reply(
                    chat_id,
                    &format!("{n} approvals pending — specify an id (see /approvals)."),
                )
                .await;
            None
        }
        Err(ResolveError::NotFound(id)) => {
            relay
                .reply(chat_id, &format!("No pending approval with id {id}."))
                .await;
            None
        }
    }
}

async fn approvals_listing(relay: &Arc<Relay>, chat_id: i64) {
    let lines: Vec<String> = {
        let approvals = relay.approvals.lock().unwrap();
        approvals
            .list()
            .iter()
            .map(|r| {
                format!(
                    "#{} · since {} · {} media · {}",
                    r.id,
                    r.created_at.format("%H:%M UTC"),
                    r.media.len(),
                    preview(&r.caption)
                )
            })
            .collect()
    };
    if lines.is_empty() {
        relay.reply(chat_id, "No pending approvals.").await;
    } else {
        relay
            .reply(chat_id, &format!("Pending approvals:\n{}", lines.join("\n")))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossfeed_core::types::{MediaItem, MediaKind};

    #[test]
    fn test_preview_truncates_long_captions() {
        let long = "x".repeat(60);
        let p = preview(&long);
        assert_eq!(p.chars().count(), 41); // 40 + ellipsis
        assert!(p.ends_with('…'));

        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_format_entry_shape() {
        let entry = QueueEntry {
            id: 7,
            media: vec![MediaItem::new("/tmp/a.jpg", MediaKind::Photo)],
            caption: "hello world".into(),
            scheduled_at: 1_767_225_600, // 2026-01-01 00:00 UTC
            attempts: 0,
        };
        let line = format_entry(&entry);
        assert!(line.starts_with("#7 · 2026-01-01 00:00 UTC · 1 media"));
        assert!(line.ends_with("hello world"));
    }
}
