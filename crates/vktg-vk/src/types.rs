// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! VK API payload types.
//!
//! Only the fields the relay reads are modelled; everything else in the
//! upstream JSON is ignored during deserialization.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// --- Long poll ---

/// Opaque long-poll position token.
///
/// VK sends `ts` as a number from `getLongPollServer` and as either a
/// number or a string from `a_check`; both are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Cursor(n.to_string()),
            Raw::Text(s) => Cursor(s),
        })
    }
}

/// `messages.getLongPollServer` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LongPollServer {
    pub key: String,
    pub server: String,
    pub ts: Cursor,
}

/// `a_check` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct LongPollResponse {
    pub ts: Cursor,
    /// Heterogeneous update tuples, decoded by [`crate::classify`].
    #[serde(default)]
    pub updates: Vec<serde_json::Value>,
}

// --- Media ---

/// One size variant of a photo, thumbnail or sticker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageVariant {
    pub url: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

impl ImageVariant {
    fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Picks the variant with the largest `width * height`.
///
/// The first of several equal maxima wins. When every area is zero (VK
/// omits dimensions on some sticker sizes) the last listed variant is used.
pub fn largest_variant(variants: &[ImageVariant]) -> Option<&ImageVariant> {
    let mut best: Option<&ImageVariant> = None;
    for variant in variants {
        let area = variant.area();
        if area > 0 && best.is_none_or(|b| area > b.area()) {
            best = Some(variant);
        }
    }
    best.or_else(|| variants.last())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Photo {
    #[serde(default)]
    pub sizes: Vec<ImageVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Video {
    pub id: i64,
    pub owner_id: i64,
    #[serde(default)]
    pub access_key: Option<String>,
    /// Thumbnail frames.
    #[serde(default)]
    pub image: Vec<ImageVariant>,
    /// Embeddable player URL, present on `video.get` items.
    #[serde(default)]
    pub player: Option<String>,
}

impl Video {
    /// `{owner}_{id}[_{access_key}]` as accepted by `video.get`.
    pub fn lookup_key(&self) -> String {
        match self.access_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => format!("{}_{}_{}", self.owner_id, self.id, key),
            None => format!("{}_{}", self.owner_id, self.id),
        }
    }

    pub fn page_url(&self) -> String {
        format!("https://vk.com/video{}_{}", self.owner_id, self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sticker {
    #[serde(default)]
    pub images: Vec<ImageVariant>,
    #[serde(default)]
    pub images_with_background: Vec<ImageVariant>,
}

impl Sticker {
    /// Largest background variant, falling back to the transparent set.
    pub fn best_url(&self) -> Option<&str> {
        largest_variant(&self.images_with_background)
            .or_else(|| largest_variant(&self.images))
            .map(|v| v.url.as_str())
    }
}

/// A wall post carried by a repost attachment.
#[derive(Debug, Clone, Deserialize)]
pub struct WallPost {
    pub id: i64,
    /// Author; equals the owner for community posts.
    pub from_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A message or wall attachment.
///
/// VK nests the payload under a key equal to `type`; unknown types keep
/// only the tag.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub photo: Option<Photo>,
    #[serde(default)]
    pub video: Option<Video>,
    #[serde(default)]
    pub sticker: Option<Sticker>,
    #[serde(default)]
    pub wall: Option<WallPost>,
}

// --- Messages and profiles ---

/// A message as returned by `messages.getById` (also used for the nested
/// `reply_message`).
#[derive(Debug, Clone, Deserialize)]
pub struct VkMessage {
    /// Absent on some embedded reply payloads.
    #[serde(default)]
    pub id: i64,
    pub from_id: i64,
    #[serde(default)]
    pub peer_id: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub reply_message: Option<Box<VkMessage>>,
}

impl VkMessage {
    pub fn sticker(&self) -> Option<&Sticker> {
        self.attachments.iter().find_map(|a| a.sticker.as_ref())
    }

    pub fn wall(&self) -> Option<&WallPost> {
        self.attachments.iter().find_map(|a| a.wall.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub photo_200: Option<String>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub photo_200: Option<String>,
}

/// A `friends.get` entry requested with `fields=nickname`.
#[derive(Debug, Clone, Deserialize)]
pub struct Friend {
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// `{count, items}` list envelope used by most list methods.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ItemList<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

/// `groups.getById` changed shape in 5.139: newer versions wrap the list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum GroupList {
    Wrapped { groups: Vec<Group> },
    Bare(Vec<Group>),
}

impl GroupList {
    pub fn into_first(self) -> Option<Group> {
        match self {
            GroupList::Wrapped { groups } | GroupList::Bare(groups) => groups.into_iter().next(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UploadServer {
    pub upload_url: String,
}

/// Body returned by the photo upload host (not wrapped in `response`).
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UploadedPhoto {
    pub server: i64,
    #[serde(default)]
    pub photo: String,
    #[serde(default)]
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SavedPhoto {
    pub id: i64,
    pub owner_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn variant(url: &str, width: u32, height: u32) -> ImageVariant {
        ImageVariant {
            url: url.into(),
            width,
            height,
        }
    }

    #[test]
    fn largest_variant_picks_max_area() {
        let sizes = vec![
            variant("s", 75, 50),
            variant("x", 604, 403),
            variant("m", 130, 87),
        ];
        assert_eq!(largest_variant(&sizes).unwrap().url, "x");
    }

    #[test]
    fn largest_variant_falls_back_to_last_when_dimensionless() {
        let sizes = vec![variant("a", 0, 0), variant("b", 0, 0)];
        assert_eq!(largest_variant(&sizes).unwrap().url, "b");
        assert!(largest_variant(&[]).is_none());
    }

    #[test]
    fn cursor_accepts_number_and_string() {
        let a: Cursor = serde_json::from_value(json!(1874)).unwrap();
        let b: Cursor = serde_json::from_value(json!("1874")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "1874");
    }

    #[test]
    fn message_with_unknown_attachment_deserializes() {
        let msg: VkMessage = serde_json::from_value(json!({
            "id": 10,
            "from_id": 1,
            "peer_id": 1,
            "text": "hi",
            "attachments": [
                {"type": "audio_message", "audio_message": {"duration": 3}},
                {"type": "sticker", "sticker": {
                    "images": [{"url": "https://vk.com/s1.png", "width": 128, "height": 128}],
                    "images_with_background": [
                        {"url": "https://vk.com/b1.png", "width": 64, "height": 64},
                        {"url": "https://vk.com/b2.png", "width": 256, "height": 256}
                    ]
                }}
            ]
        }))
        .unwrap();

        assert_eq!(msg.attachments.len(), 2);
        assert_eq!(msg.sticker().unwrap().best_url(), Some("https://vk.com/b2.png"));
        assert!(msg.wall().is_none());
    }

    #[test]
    fn video_lookup_key_includes_access_key() {
        let video: Video = serde_json::from_value(json!({
            "id": 456, "owner_id": -12, "access_key": "abc"
        }))
        .unwrap();
        assert_eq!(video.lookup_key(), "-12_456_abc");
        assert_eq!(video.page_url(), "https://vk.com/video-12_456");
    }

    #[test]
    fn group_list_accepts_both_shapes() {
        let wrapped: GroupList = serde_json::from_value(json!({
            "groups": [{"id": 1, "name": "A"}], "profiles": []
        }))
        .unwrap();
        let bare: GroupList = serde_json::from_value(json!([{"id": 2, "name": "B"}])).unwrap();
        assert_eq!(wrapped.into_first().unwrap().name, "A");
        assert_eq!(bare.into_first().unwrap().name, "B");
    }
}
