// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of canonical messages to the destination network.

use std::sync::Arc;

use tracing::{debug, warn};
use vktg_core::{
    CanonicalMessage, ChannelId, DestinationAdapter, DestinationMessageId, MediaSource,
    MessageKind, NewCorrelation, PeerId, RelayError, SourceMessageId, StorageAdapter,
    ThreadTarget,
};

use crate::recording;
use crate::text::{CAPTION_LIMIT, MESSAGE_LIMIT, compose, split_message, visible_len};

/// Most items a single media group may carry.
const MEDIA_GROUP_LIMIT: usize = 10;

/// The conversation a message belongs to and the channel it is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub peer: PeerId,
    pub channel: ChannelId,
}

pub struct Forwarder {
    destination: Arc<dyn DestinationAdapter>,
    store: Arc<dyn StorageAdapter>,
    control_channel: ChannelId,
}

impl Forwarder {
    pub fn new(
        destination: Arc<dyn DestinationAdapter>,
        store: Arc<dyn StorageAdapter>,
        control_channel: ChannelId,
    ) -> Self {
        Self {
            destination,
            store,
            control_channel,
        }
    }

    /// The linked channel for `peer`, or the control channel when the peer
    /// is unlinked or the store cannot answer.
    pub async fn route_for(&self, peer: PeerId) -> Route {
        let channel = match self.store.get_link_by_peer(peer).await {
            Ok(Some(link)) => link.destination_channel_id,
            Ok(None) => self.control_channel,
            Err(e) => {
                warn!(peer_id = %peer, error = %e, "link lookup failed, using control channel");
                self.control_channel
            }
        };
        Route { peer, channel }
    }

    /// Sends `message` and records its correlation.
    ///
    /// A reconstructed thread target is delivered first so the message can
    /// be threaded under it. If that delivery fails the message is sent
    /// without threading.
    pub async fn forward(
        &self,
        message: &CanonicalMessage,
        route: &Route,
        thread: Option<ThreadTarget>,
    ) -> Result<DestinationMessageId, RelayError> {
        let reply_to = match thread {
            None => None,
            Some(ThreadTarget::Existing(id)) => Some(id),
            Some(ThreadTarget::Reconstructed(original)) => {
                match self.deliver(&original, route, None).await {
                    Ok(id) => Some(id),
                    Err(e) => {
                        warn!(
                            source_message_id = %original.source_message_id,
                            error = %e,
                            "reconstructed reply target not delivered, sending unthreaded"
                        );
                        None
                    }
                }
            }
        };
        self.deliver(message, route, reply_to).await
    }

    async fn deliver(
        &self,
        message: &CanonicalMessage,
        route: &Route,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        let id = match (message.kind, message.sticker_url.as_deref()) {
            (MessageKind::Sticker, Some(url)) => {
                let id = self
                    .destination
                    .send_sticker(route.channel, url, reply_to)
                    .await?;
                self.record(route, message.source_message_id, id).await;
                id
            }
            (MessageKind::Repost, _) if message.repost_context.is_some() => {
                self.deliver_repost(message, route, reply_to).await?
            }
            _ => {
                let header = message.signature.to_html();
                let id = self
                    .send_content(route.channel, &header, message, reply_to)
                    .await?;
                self.record(route, message.source_message_id, id).await;
                id
            }
        };

        recording::record_forwarded(&message.kind.to_string());
        debug!(
            peer_id = %route.peer,
            channel_id = %route.channel,
            message_id = %message.source_message_id,
            kind = %message.kind,
            destination_message_id = %id,
            "message forwarded"
        );
        Ok(id)
    }

    /// The reposter's comment first (when it has content), then the post
    /// threaded under it. Returns the comment id when one was sent.
    async fn deliver_repost(
        &self,
        message: &CanonicalMessage,
        route: &Route,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        let Some(repost) = message.repost_context.as_deref() else {
            return Err(RelayError::Internal("repost without post body".into()));
        };

        let reposter = message.signature.to_html();
        let comment_id = if message.has_content() {
            let id = self
                .send_content(route.channel, &reposter, message, reply_to)
                .await?;
            self.record(route, message.source_message_id, id).await;
            Some(id)
        } else {
            None
        };

        let attribution = format!("<b>Forwarded from {}</b>", repost.body.signature.to_html());
        let header = match comment_id {
            Some(_) => attribution,
            None => format!("{reposter}\n\n{attribution}"),
        };
        let body_id = self
            .send_content(route.channel, &header, &repost.body, comment_id.or(reply_to))
            .await?;
        self.record(route, message.source_message_id, body_id).await;

        Ok(comment_id.unwrap_or(body_id))
    }

    /// Sends text and media under `header`, returning the first message id.
    async fn send_content(
        &self,
        channel: ChannelId,
        header: &str,
        message: &CanonicalMessage,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        let body = compose(header, &message.text, &message.video_links);
        let media: Vec<MediaSource> = message
            .images
            .iter()
            .cloned()
            .map(MediaSource::Url)
            .chain(
                message
                    .video_preview_frames
                    .iter()
                    .cloned()
                    .map(MediaSource::Bytes),
            )
            .collect();

        if media.is_empty() {
            return self.send_long_text(channel, &body, reply_to).await;
        }

        let caption_fits = visible_len(&body) <= CAPTION_LIMIT;
        let caption = if caption_fits { body.as_str() } else { "" };

        let mut first = None;
        for (index, chunk) in media.chunks(MEDIA_GROUP_LIMIT).enumerate() {
            let chunk_caption = if index == 0 { caption } else { "" };
            let id = match chunk {
                [single] => {
                    self.destination
                        .send_photo(channel, single.clone(), chunk_caption, reply_to)
                        .await?
                }
                _ => {
                    self.destination
                        .send_media_group(channel, chunk.to_vec(), chunk_caption, reply_to)
                        .await?
                }
            };
            first.get_or_insert(id);
        }
        let first = first.ok_or_else(|| RelayError::Internal("no media sent".into()))?;

        if !caption_fits {
            self.send_long_text(channel, &body, Some(first)).await?;
        }
        Ok(first)
    }

    async fn send_long_text(
        &self,
        channel: ChannelId,
        body: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        let mut first = None;
        for chunk in split_message(body, MESSAGE_LIMIT) {
            let id = self.destination.send_text(channel, &chunk, reply_to).await?;
            first.get_or_insert(id);
        }
        first.ok_or_else(|| RelayError::Internal("empty message body".into()))
    }

    /// Persists a correlation. Store failures only skip persistence.
    async fn record(&self, route: &Route, source: SourceMessageId, destination: DestinationMessageId) {
        let correlation = NewCorrelation {
            source_peer_id: route.peer,
            source_message_id: source,
            destination_channel_id: route.channel,
            destination_message_id: destination,
        };
        if let Err(e) = self.store.add_correlation(&correlation).await {
            warn!(
                peer_id = %route.peer,
                source_message_id = %source,
                error = %e,
                "correlation not persisted"
            );
        }
    }
}
