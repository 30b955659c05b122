// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content normalization: VK payloads into [`CanonicalMessage`]s.
//!
//! Content precedence is sticker, then repost, then plain. A message that
//! replies to another one keeps the referenced id and the embedded
//! payload for the thread resolver; the reference itself is never
//! resolved here.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};
use vktg_core::{
    CanonicalMessage, FrameRenderer, MessageKind, PeerId, PeerKind, RelayError, Repost, Sender,
    SourceMessageId,
};
use vktg_vk::{
    Attachment, MessageExtras, NewMessage, Video, VkApi, VkMessage, WallPost, largest_variant,
};

/// Looks up the display name and avatar of a user or group.
pub async fn resolve_sender(api: &dyn VkApi, peer: PeerId) -> Result<Sender, RelayError> {
    match peer.kind() {
        PeerKind::User => {
            let user = api.get_user(peer.0).await?;
            Ok(Sender {
                peer_id: peer,
                name: user.full_name(),
                avatar: user.photo_200,
            })
        }
        PeerKind::Group => {
            let group = api.get_group(peer.profile_id()).await?;
            Ok(Sender {
                peer_id: peer,
                name: group.name,
                avatar: group.photo_200,
            })
        }
    }
}

/// Profiles resolved while building one message.
struct SenderCache<'a> {
    api: &'a dyn VkApi,
    known: HashMap<PeerId, Sender>,
}

impl<'a> SenderCache<'a> {
    fn new(api: &'a dyn VkApi) -> Self {
        Self {
            api,
            known: HashMap::new(),
        }
    }

    async fn get(&mut self, peer: PeerId) -> Result<Sender, RelayError> {
        if let Some(sender) = self.known.get(&peer) {
            return Ok(sender.clone());
        }
        let sender = resolve_sender(self.api, peer).await?;
        self.known.insert(peer, sender.clone());
        Ok(sender)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoLinks {
    /// Embeddable player links, looked up with `video.get` when missing.
    Player,
    /// `https://vk.com/video{owner}_{id}` page links.
    Direct,
}

#[derive(Debug, Default)]
struct Media {
    images: Vec<String>,
    video_links: Vec<String>,
    frames: Vec<Vec<u8>>,
}

pub struct Normalizer {
    api: Arc<dyn VkApi>,
    renderer: Arc<dyn FrameRenderer>,
}

impl Normalizer {
    pub fn new(api: Arc<dyn VkApi>, renderer: Arc<dyn FrameRenderer>) -> Self {
        Self { api, renderer }
    }

    /// Fetches the full message for a long-poll update and normalizes it.
    pub async fn normalize_update(
        &self,
        update: &NewMessage,
    ) -> Result<CanonicalMessage, RelayError> {
        let message = self
            .api
            .get_message_by_id(update.message_id)
            .await?
            .ok_or_else(|| RelayError::EmptyResponse {
                method: "messages.getById".into(),
            })?;
        self.normalize(&message, Some(&update.extras)).await
    }

    /// Normalizes an already fetched message.
    pub async fn normalize_message(
        &self,
        message: &VkMessage,
    ) -> Result<CanonicalMessage, RelayError> {
        self.normalize(message, None).await
    }

    async fn normalize(
        &self,
        message: &VkMessage,
        extras: Option<&MessageExtras>,
    ) -> Result<CanonicalMessage, RelayError> {
        let mut senders = SenderCache::new(self.api.as_ref());
        let mut canonical = self.build(message, extras, &mut senders).await?;

        if let Some(reply) = message.reply_message.as_deref() {
            if reply.id == 0 {
                debug!(message_id = message.id, "reply reference carries no message id");
                return Ok(canonical);
            }
            canonical.reply_to = Some(SourceMessageId(reply.id));
            match self.build(reply, None, &mut senders).await {
                Ok(context) => canonical.reply_context = Some(Box::new(context)),
                Err(e) => warn!(
                    message_id = message.id,
                    reply_to = reply.id,
                    error = %e,
                    "embedded reply payload could not be normalized"
                ),
            }
            if canonical.kind == MessageKind::Plain {
                canonical.kind = MessageKind::ReplyEnvelope;
            }
        }

        Ok(canonical)
    }

    /// Sticker, repost or plain content of one message, without reply handling.
    async fn build(
        &self,
        message: &VkMessage,
        extras: Option<&MessageExtras>,
        senders: &mut SenderCache<'_>,
    ) -> Result<CanonicalMessage, RelayError> {
        let sender = senders.get(PeerId(message.from_id)).await?;
        let id = SourceMessageId(message.id);
        let mut out = CanonicalMessage::new(id, &sender);

        if let Some(url) = sticker_url(message, extras) {
            out.kind = MessageKind::Sticker;
            out.sticker_url = Some(url);
            return Ok(out);
        }

        out.text = message.text.clone();
        let media = self
            .collect_media(&message.attachments, VideoLinks::Player)
            .await;
        apply_media(&mut out, media);

        if let Some(wall) = message.wall() {
            let body = self.build_post(id, wall, senders).await?;
            out.kind = MessageKind::Repost;
            out.repost_context = Some(Box::new(Repost {
                post_id: wall.id,
                body,
            }));
        }

        Ok(out)
    }

    async fn build_post(
        &self,
        id: SourceMessageId,
        post: &WallPost,
        senders: &mut SenderCache<'_>,
    ) -> Result<CanonicalMessage, RelayError> {
        let author = senders.get(PeerId(post.from_id)).await?;
        let mut body = CanonicalMessage::new(id, &author);
        body.signature = author.post_signature(post.id);
        body.text = post.text.clone();
        let media = self
            .collect_media(&post.attachments, VideoLinks::Direct)
            .await;
        apply_media(&mut body, media);
        Ok(body)
    }

    async fn collect_media(&self, attachments: &[Attachment], links: VideoLinks) -> Media {
        let mut media = Media::default();

        for photo in attachments.iter().filter_map(|a| a.photo.as_ref()) {
            if let Some(variant) = largest_variant(&photo.sizes) {
                media.images.push(variant.url.clone());
            }
        }

        let videos: Vec<&Video> = attachments.iter().filter_map(|a| a.video.as_ref()).collect();
        for video in &videos {
            let Some(frame) = largest_variant(&video.image) else {
                continue;
            };
            match self.renderer.render(&frame.url).await {
                Ok(bytes) => media.frames.push(bytes),
                Err(e) => warn!(video = %video.page_url(), error = %e, "video frame skipped"),
            }
        }

        let players = match links {
            VideoLinks::Player => self.lookup_players(&videos).await,
            VideoLinks::Direct => Vec::new(),
        };
        for video in videos {
            let link = match links {
                VideoLinks::Direct => video.page_url(),
                VideoLinks::Player => video
                    .player
                    .clone()
                    .or_else(|| {
                        players
                            .iter()
                            .find(|p| p.id == video.id && p.owner_id == video.owner_id)
                            .and_then(|p| p.player.clone())
                    })
                    .unwrap_or_else(|| video.page_url()),
            };
            media.video_links.push(link);
        }

        media
    }

    /// One batched `video.get` for the videos that lack a player link.
    async fn lookup_players(&self, videos: &[&Video]) -> Vec<Video> {
        let keys: Vec<String> = videos
            .iter()
            .filter(|v| v.player.is_none())
            .map(|v| v.lookup_key())
            .collect();
        if keys.is_empty() {
            return Vec::new();
        }
        match self.api.get_videos(&keys).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "video lookup failed, using page links");
                Vec::new()
            }
        }
    }
}

fn apply_media(message: &mut CanonicalMessage, media: Media) {
    message.images = media.images;
    message.video_links = media.video_links;
    message.video_preview_frames = media.frames;
}

/// The sticker image, from the fetched message or the long-poll extras.
fn sticker_url(message: &VkMessage, extras: Option<&MessageExtras>) -> Option<String> {
    if let Some(url) = message.sticker().and_then(|s| s.best_url()) {
        return Some(url.to_string());
    }
    let extras = extras.filter(|x| x.has_sticker())?;
    extras
        .attachments()
        .iter()
        .find_map(|a| a.sticker.as_ref().and_then(|s| s.best_url()).map(str::to_string))
}
