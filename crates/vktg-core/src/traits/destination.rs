// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destination adapter trait for the network relayed content is delivered to.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::message::MediaSource;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ChannelId, DestinationMessageId};

/// Sending primitives the forwarder needs from the destination network.
///
/// Text and captions are HTML. Every send returns the id of the message
/// that later sends should thread under.
#[async_trait]
pub trait DestinationAdapter: PluginAdapter {
    async fn send_text(
        &self,
        channel: ChannelId,
        html: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError>;

    /// Sends a silent plain-text message (no notification sound, no markup).
    async fn send_notice(
        &self,
        channel: ChannelId,
        text: &str,
    ) -> Result<DestinationMessageId, RelayError>;

    async fn send_photo(
        &self,
        channel: ChannelId,
        photo: MediaSource,
        caption: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError>;

    /// Sends two or more items as an album. The caption goes on the first item.
    async fn send_media_group(
        &self,
        channel: ChannelId,
        media: Vec<MediaSource>,
        caption: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError>;

    async fn send_sticker(
        &self,
        channel: ChannelId,
        sticker_url: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError>;

    /// Replaces the channel's picture with the image at `photo_url`.
    async fn set_chat_photo(&self, channel: ChannelId, photo_url: &str) -> Result<(), RelayError>;

    async fn react(
        &self,
        channel: ChannelId,
        message: DestinationMessageId,
        emoji: &str,
    ) -> Result<(), RelayError>;

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: DestinationMessageId,
    ) -> Result<(), RelayError>;
}
