// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-receipt notifications on the destination side.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;
use vktg_config::model::ReadNotificationMode;
use vktg_core::{
    ChannelId, DestinationAdapter, DestinationMessageId, PeerId, ReadReceipt, RelayError,
    StorageAdapter,
};
use vktg_vk::VkApi;

use crate::normalizer::resolve_sender;

const READ_NOTICE: &str = "Your messages were read.";
const READ_REACTION: &str = "👀";

/// Turns read receipts into notices or reactions.
///
/// In notice mode only the latest notice per peer is kept: the previous
/// one is deleted before a new one is posted. Receipts for the same peer
/// are serialized on a per-peer lock; different peers proceed in
/// parallel. Call [`ReadReceipts::forget`] when a peer's link changes.
pub struct ReadReceipts {
    mode: ReadNotificationMode,
    destination: Arc<dyn DestinationAdapter>,
    store: Arc<dyn StorageAdapter>,
    api: Arc<dyn VkApi>,
    control_channel: ChannelId,
    notices: DashMap<PeerId, Arc<Mutex<Option<(ChannelId, DestinationMessageId)>>>>,
}

impl ReadReceipts {
    pub fn new(
        mode: ReadNotificationMode,
        destination: Arc<dyn DestinationAdapter>,
        store: Arc<dyn StorageAdapter>,
        api: Arc<dyn VkApi>,
        control_channel: ChannelId,
    ) -> Self {
        Self {
            mode,
            destination,
            store,
            api,
            control_channel,
            notices: DashMap::new(),
        }
    }

    pub async fn handle(&self, receipt: ReadReceipt) -> Result<(), RelayError> {
        if self.mode == ReadNotificationMode::Off {
            debug!(peer_id = %receipt.peer_id, up_to = %receipt.up_to, "messages read");
            return Ok(());
        }

        let link = self.store.get_link_by_peer(receipt.peer_id).await?;
        match (self.mode, link) {
            (ReadNotificationMode::Off, _) => Ok(()),
            (_, None) => self.announce_unlinked(receipt.peer_id).await,
            (ReadNotificationMode::Notice, Some(link)) => {
                self.replace_notice(receipt.peer_id, link.destination_channel_id)
                    .await
            }
            (ReadNotificationMode::Reaction, Some(link)) => {
                self.react(receipt, link.destination_channel_id).await
            }
        }
    }

    async fn replace_notice(&self, peer: PeerId, channel: ChannelId) -> Result<(), RelayError> {
        let slot = self.notices.entry(peer).or_default().clone();
        let mut current = slot.lock().await;

        if let Some((previous_channel, previous)) = current.take()
            && previous_channel == channel
            && let Err(e) = self.destination.delete_message(channel, previous).await
        {
            debug!(peer_id = %peer, error = %e, "previous read notice not deleted");
        }
        let notice = self.destination.send_notice(channel, READ_NOTICE).await?;
        *current = Some((channel, notice));
        Ok(())
    }

    /// Drops the remembered notice of `peer`.
    pub fn forget(&self, peer: PeerId) {
        if self.notices.remove(&peer).is_some() {
            debug!(peer_id = %peer, "read notice forgotten");
        }
    }

    async fn react(&self, receipt: ReadReceipt, channel: ChannelId) -> Result<(), RelayError> {
        match self.store.get_correlation_by_source(receipt.up_to).await? {
            Some(row) if row.destination_channel_id == channel => {
                self.destination
                    .react(channel, row.destination_message_id, READ_REACTION)
                    .await
            }
            _ => {
                debug!(
                    peer_id = %receipt.peer_id,
                    up_to = %receipt.up_to,
                    "no destination message for read receipt"
                );
                Ok(())
            }
        }
    }

    async fn announce_unlinked(&self, peer: PeerId) -> Result<(), RelayError> {
        let name = match resolve_sender(self.api.as_ref(), peer).await {
            Ok(sender) => sender.name,
            Err(e) => {
                debug!(peer_id = %peer, error = %e, "reader name unavailable");
                peer.to_string()
            }
        };
        self.destination
            .send_notice(self.control_channel, &format!("{name} read your messages."))
            .await?;
        Ok(())
    }
}
