//! # Crossfeed Relay
//! The stateful core of the pipeline: album assembly, the scheduling
//! queue, duplicate gating, operator commands, and post execution.

pub mod album;
pub mod approval;
pub mod commands;
pub mod directive;
pub mod engine;
pub mod executor;
pub mod ingest;

use std::sync::{Arc, Mutex};

use crossfeed_channels::TelegramChannel;
use crossfeed_core::RelayConfig;
use crossfeed_publisher::TwitterClient;
use crossfeed_store::{HashLedger, PostQueue};

use crate::album::AlbumAssembler;
use crate::approval::ApprovalBroker;
use crate::executor::PostExecutor;

/// Owns every stateful service of the pipeline. All mutation goes
/// through the service objects; callers never touch the maps inside.
pub struct Relay {
    pub config: RelayConfig,
    pub telegram: Arc<TelegramChannel>,
    pub queue: Arc<PostQueue>,
    pub ledger: Arc<Mutex<HashLedger>>,
    pub albums: Mutex<AlbumAssembler>,
    pub approvals: Mutex<ApprovalBroker>,
    pub executor: PostExecutor,
}

impl Relay {
    pub fn new(
        config: RelayConfig,
        telegram: Arc<TelegramChannel>,
        twitter: Arc<TwitterClient>,
        queue: Arc<PostQueue>,
        ledger: HashLedger,
    ) -> Arc<Self> {
        let ledger = Arc::new(Mutex::new(ledger));
        let executor = PostExecutor::new(
            twitter,
            telegram.clone(),
            queue.clone(),
            ledger.clone(),
            config.relay.clone(),
            config.telegram.admin_chat_id,
        );
        Arc::new(Self {
            albums: Mutex::new(AlbumAssembler::new(config.relay.max_photos)),
            approvals: Mutex::new(ApprovalBroker::new()),
            config,
            telegram,
            queue,
            ledger,
            executor,
        })
    }

    /// Reply in an arbitrary chat (command feedback, rejections).
    pub async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.telegram.send_message(chat_id, text).await {
            tracing::warn!("Failed to send reply: {e}");
        }
    }

    /// Notify the operator chat.
    pub async fn notify(&self, text: &str) {
        self.reply(self.config.telegram.admin_chat_id, text).await;
    }
}
