// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator messages relayed back to the source network.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use vktg_core::{
    ChannelId, ChatLink, DestinationAdapter, DestinationMessageId, NewCorrelation,
    OutboundRequest, PeerId, RelayError, SourceMessageId, StorageAdapter,
};
use vktg_vk::{OutgoingMessage, VkApi};

use crate::recording;

const SENT_NOTICE: &str = "Message sent.";

pub struct OutboundRelay {
    api: Arc<dyn VkApi>,
    store: Arc<dyn StorageAdapter>,
    destination: Arc<dyn DestinationAdapter>,
    control_channel: ChannelId,
    sent_notice_ttl: Duration,
}

impl OutboundRelay {
    pub fn new(
        api: Arc<dyn VkApi>,
        store: Arc<dyn StorageAdapter>,
        destination: Arc<dyn DestinationAdapter>,
        control_channel: ChannelId,
        sent_notice_ttl: Duration,
    ) -> Self {
        Self {
            api,
            store,
            destination,
            control_channel,
            sent_notice_ttl,
        }
    }

    /// Sends an operator message to its source peer.
    ///
    /// Returns `None` for edits, which are not relayed. The recipient is
    /// the author of the replied-to message when there is a reply, else
    /// the peer linked to the channel.
    pub async fn relay(
        &self,
        request: OutboundRequest,
    ) -> Result<Option<SourceMessageId>, RelayError> {
        if request.edited {
            debug!(channel_id = %request.channel, message_id = %request.message_id, "ignoring edit");
            return Ok(None);
        }

        let text = request.text.unwrap_or_default();
        if text.trim().is_empty() && request.photo.is_none() {
            return Err(RelayError::InvalidInput("message has no text or photo".into()));
        }

        let link = self.store.get_link_by_channel(request.channel).await?;
        let (peer, reply_to) = self
            .recipient(request.channel, request.reply_to, link.as_ref())
            .await?;

        let attachment = match request.photo {
            Some(bytes) => Some(self.api.upload_photo(bytes).await?),
            None => None,
        };

        let source_id = self
            .api
            .send_message(&OutgoingMessage {
                peer,
                text,
                reply_to,
                attachment,
            })
            .await?;
        recording::record_outbound();
        info!(peer_id = %peer, message_id = %source_id, "operator message relayed");

        let correlation = NewCorrelation {
            source_peer_id: peer,
            source_message_id: source_id,
            destination_channel_id: request.channel,
            destination_message_id: request.message_id,
        };
        if let Err(e) = self.store.add_correlation(&correlation).await {
            warn!(peer_id = %peer, message_id = %source_id, error = %e, "correlation not persisted");
        }

        self.confirm(request.channel).await;
        Ok(Some(source_id))
    }

    /// The VK reply reference is only kept in linked channels; in the
    /// control channel replies merely pick the recipient.
    async fn recipient(
        &self,
        channel: ChannelId,
        reply_to: Option<DestinationMessageId>,
        link: Option<&ChatLink>,
    ) -> Result<(PeerId, Option<SourceMessageId>), RelayError> {
        let Some(reply_to) = reply_to else {
            return match link {
                Some(link) => Ok((link.source_peer_id, None)),
                None => Err(RelayError::MissingPeer(
                    "reply to a forwarded message or link this chat first".into(),
                )),
            };
        };

        // Linking purges the peer's older rows, so in a linked channel every
        // row of the peer belongs to this channel.
        let row = match link {
            Some(link) => {
                self.store
                    .get_correlation_by_peer_and_destination(link.source_peer_id, reply_to)
                    .await?
            }
            None => {
                self.store
                    .get_correlation_by_destination(channel, reply_to)
                    .await?
            }
        };
        match (row, link) {
            (Some(row), Some(link)) => Ok((link.source_peer_id, Some(row.source_message_id))),
            (Some(row), None) => Ok((row.source_peer_id, None)),
            (None, _) if channel == self.control_channel => Err(RelayError::MissingPeer(format!(
                "message {reply_to} was not forwarded by the relay"
            ))),
            (None, _) => Err(RelayError::MissingCorrelation(format!(
                "message {reply_to} has no source counterpart"
            ))),
        }
    }

    /// Posts a short-lived confirmation and schedules its deletion.
    async fn confirm(&self, channel: ChannelId) {
        let notice = match self.destination.send_notice(channel, SENT_NOTICE).await {
            Ok(id) => id,
            Err(e) => {
                warn!(channel_id = %channel, error = %e, "sent notice failed");
                return;
            }
        };

        let destination = self.destination.clone();
        let ttl = self.sent_notice_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Err(e) = destination.delete_message(channel, notice).await {
                debug!(channel_id = %channel, error = %e, "sent notice not deleted");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vktg_test_utils::{CONTROL_CHANNEL, Sent, TestHarness};

    const CHANNEL: ChannelId = ChannelId(-500);

    async fn setup() -> (TestHarness, OutboundRelay) {
        let h = TestHarness::builder()
            .with_link(5, "Anna", CHANNEL.0)
            .build()
            .await
            .unwrap();
        let relay = OutboundRelay::new(
            h.vk.clone(),
            h.storage_dyn(),
            h.destination.clone(),
            CONTROL_CHANNEL,
            Duration::from_secs(2),
        );
        (h, relay)
    }

    fn request(channel: ChannelId, text: &str) -> OutboundRequest {
        OutboundRequest {
            channel,
            message_id: DestinationMessageId(300),
            text: Some(text.into()),
            photo: None,
            reply_to: None,
            edited: false,
        }
    }

    async fn correlate(h: &TestHarness, peer: i64, source: i64, channel: ChannelId, dest: i32) {
        h.storage
            .add_correlation(&NewCorrelation {
                source_peer_id: PeerId(peer),
                source_message_id: SourceMessageId(source),
                destination_channel_id: channel,
                destination_message_id: DestinationMessageId(dest),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn linked_channel_sends_to_linked_peer() {
        let (h, relay) = setup().await;
        let id = relay.relay(request(CHANNEL, "hello")).await.unwrap();
        assert_eq!(id, Some(SourceMessageId(10_000)));

        let sent = h.vk.sent_messages().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].peer, PeerId(5));
        assert_eq!(sent[0].reply_to, None);

        let row = h
            .storage
            .get_correlation_by_destination(CHANNEL, DestinationMessageId(300))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.source_message_id, SourceMessageId(10_000));
    }

    #[tokio::test(start_paused = true)]
    async fn sent_notice_is_deleted_after_ttl() {
        let (h, relay) = setup().await;
        relay.relay(request(CHANNEL, "hello")).await.unwrap();

        let sent = h.destination.sent().await;
        assert!(matches!(&sent[..], [Sent::Notice { text, .. }] if text == SENT_NOTICE));

        tokio::time::sleep(Duration::from_secs(3)).await;
        let sent = h.destination.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(matches!(&sent[1], Sent::Deleted { .. }));
    }

    #[tokio::test]
    async fn linked_reply_carries_source_reference() {
        let (h, relay) = setup().await;
        correlate(&h, 5, 90, CHANNEL, 7).await;

        let mut req = request(CHANNEL, "answer");
        req.reply_to = Some(DestinationMessageId(7));
        relay.relay(req).await.unwrap();

        let sent = h.vk.sent_messages().await;
        assert_eq!(sent[0].reply_to, Some(SourceMessageId(90)));
    }

    #[tokio::test]
    async fn control_reply_picks_peer_without_reference() {
        let (h, relay) = setup().await;
        correlate(&h, 6, 91, CONTROL_CHANNEL, 8).await;

        let mut req = request(CONTROL_CHANNEL, "answer");
        req.reply_to = Some(DestinationMessageId(8));
        relay.relay(req).await.unwrap();

        let sent = h.vk.sent_messages().await;
        assert_eq!(sent[0].peer, PeerId(6));
        assert_eq!(sent[0].reply_to, None);
    }

    #[tokio::test]
    async fn control_channel_without_target_is_missing_peer() {
        let (h, relay) = setup().await;
        assert!(matches!(
            relay.relay(request(CONTROL_CHANNEL, "hi")).await,
            Err(RelayError::MissingPeer(_))
        ));

        let mut req = request(CONTROL_CHANNEL, "hi");
        req.reply_to = Some(DestinationMessageId(99));
        assert!(matches!(relay.relay(req).await, Err(RelayError::MissingPeer(_))));
        assert!(h.vk.sent_messages().await.is_empty());
    }

    #[tokio::test]
    async fn linked_reply_without_correlation_is_missing_correlation() {
        let (_h, relay) = setup().await;
        let mut req = request(CHANNEL, "hi");
        req.reply_to = Some(DestinationMessageId(99));
        assert!(matches!(
            relay.relay(req).await,
            Err(RelayError::MissingCorrelation(_))
        ));
    }

    #[tokio::test]
    async fn edits_are_ignored() {
        let (h, relay) = setup().await;
        let mut req = request(CHANNEL, "edited");
        req.edited = true;
        assert_eq!(relay.relay(req).await.unwrap(), None);
        assert!(h.vk.sent_messages().await.is_empty());
    }

    #[tokio::test]
    async fn photo_is_uploaded_before_sending() {
        let (h, relay) = setup().await;
        let mut req = request(CHANNEL, "");
        req.text = None;
        req.photo = Some(vec![0xFF, 0xD8]);
        relay.relay(req).await.unwrap();

        assert_eq!(h.vk.uploads().await, vec![vec![0xFF, 0xD8]]);
        let sent = h.vk.sent_messages().await;
        assert_eq!(sent[0].attachment.as_deref(), Some("photo1_1"));
        assert_eq!(sent[0].text, "");
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let (_h, relay) = setup().await;
        assert!(matches!(
            relay.relay(request(CHANNEL, "  ")).await,
            Err(RelayError::InvalidInput(_))
        ));
    }
}
