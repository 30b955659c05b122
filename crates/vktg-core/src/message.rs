// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The network-agnostic message model produced by normalization and
//! consumed by forwarding.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::html::escape_html;
use crate::types::{DestinationMessageId, PeerId, PeerKind, SourceMessageId};

/// Which content interpretation applies to a [`CanonicalMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageKind {
    Plain,
    Sticker,
    Repost,
    ReplyEnvelope,
}

/// A resolved source profile: a user or a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub peer_id: PeerId,
    pub name: String,
    pub avatar: Option<String>,
}

impl Sender {
    /// Conversation (users) or community (groups) link.
    pub fn profile_url(&self) -> String {
        match self.peer_id.kind() {
            PeerKind::User => format!("https://vk.com/im?sel={}", self.peer_id),
            PeerKind::Group => format!("https://vk.com/club{}", self.peer_id.profile_id()),
        }
    }

    /// Wall post link for a post authored by this profile.
    pub fn post_url(&self, post_id: i64) -> String {
        match self.peer_id.kind() {
            PeerKind::User => format!("https://vk.com/wall{}_{post_id}", self.peer_id),
            PeerKind::Group => {
                format!("https://vk.com/wall-{}_{post_id}", self.peer_id.profile_id())
            }
        }
    }

    pub fn signature(&self) -> Signature {
        Signature {
            name: self.name.clone(),
            url: self.profile_url(),
        }
    }

    pub fn post_signature(&self, post_id: i64) -> Signature {
        Signature {
            name: self.name.clone(),
            url: self.post_url(post_id),
        }
    }
}

/// Display name plus link, rendered as bold HTML anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub url: String,
}

impl Signature {
    pub fn to_html(&self) -> String {
        format!(
            "<a href=\"{}\"><b>{}</b></a>",
            escape_html(&self.url),
            escape_html(&self.name)
        )
    }
}

/// A nested wall post carried by a repost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repost {
    pub post_id: i64,
    /// The post itself; its signature links to the post, not the author.
    pub body: CanonicalMessage,
}

/// Normalized message ready to be forwarded.
///
/// Exactly one content interpretation applies: a sticker carries only
/// `sticker_url`, a repost carries `repost_context`, anything else is
/// plain text and media with an optional reply reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalMessage {
    pub source_message_id: SourceMessageId,
    pub sender_peer_id: PeerId,
    pub signature: Signature,
    pub text: String,
    pub images: Vec<String>,
    pub video_links: Vec<String>,
    pub video_preview_frames: Vec<Vec<u8>>,
    pub sticker_url: Option<String>,
    pub kind: MessageKind,
    /// Referenced message, left unresolved for the thread resolver.
    pub reply_to: Option<SourceMessageId>,
    /// The referenced message as embedded in the upstream payload, if any.
    pub reply_context: Option<Box<CanonicalMessage>>,
    pub repost_context: Option<Box<Repost>>,
}

impl CanonicalMessage {
    /// An empty plain message from `sender`.
    pub fn new(source_message_id: SourceMessageId, sender: &Sender) -> Self {
        Self {
            source_message_id,
            sender_peer_id: sender.peer_id,
            signature: sender.signature(),
            text: String::new(),
            images: Vec::new(),
            video_links: Vec::new(),
            video_preview_frames: Vec::new(),
            sticker_url: None,
            kind: MessageKind::Plain,
            reply_to: None,
            reply_context: None,
            repost_context: None,
        }
    }

    /// True when there is any text, image or video to show.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || self.media_count() > 0 || !self.video_links.is_empty()
    }

    /// Images plus rendered video frames.
    pub fn media_count(&self) -> usize {
        self.images.len() + self.video_preview_frames.len()
    }

    /// Checks the one-interpretation rule for this message.
    pub fn is_consistent(&self) -> bool {
        match self.kind {
            MessageKind::Sticker => {
                self.sticker_url.is_some()
                    && self.text.is_empty()
                    && self.images.is_empty()
                    && self.video_links.is_empty()
                    && self.video_preview_frames.is_empty()
                    && self.repost_context.is_none()
            }
            MessageKind::Repost => self.repost_context.is_some() && self.sticker_url.is_none(),
            MessageKind::ReplyEnvelope => {
                self.reply_to.is_some()
                    && self.sticker_url.is_none()
                    && self.repost_context.is_none()
            }
            MessageKind::Plain => self.sticker_url.is_none() && self.repost_context.is_none(),
        }
    }
}

/// What a forwarded message should be threaded under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadTarget {
    /// The referenced message is already on the destination.
    Existing(DestinationMessageId),
    /// The referenced message must be sent first to obtain an anchor.
    Reconstructed(Box<CanonicalMessage>),
}

/// One item of a photo or media-group send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    Url(String),
    Bytes(Vec<u8>),
}
