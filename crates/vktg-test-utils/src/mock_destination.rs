// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock destination adapter for deterministic testing.
//!
//! `MockDestination` implements `DestinationAdapter` and `Notifier`,
//! assigning sequential message ids and capturing every call for
//! assertion in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use vktg_core::{
    AdapterType, ChannelId, DestinationAdapter, DestinationMessageId, HealthStatus, MediaSource,
    Notifier, PluginAdapter, RelayError,
};

/// One captured destination call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        id: DestinationMessageId,
        channel: ChannelId,
        html: String,
        reply_to: Option<DestinationMessageId>,
    },
    Notice {
        id: DestinationMessageId,
        channel: ChannelId,
        text: String,
    },
    Photo {
        id: DestinationMessageId,
        channel: ChannelId,
        photo: MediaSource,
        caption: String,
        reply_to: Option<DestinationMessageId>,
    },
    MediaGroup {
        id: DestinationMessageId,
        channel: ChannelId,
        media: Vec<MediaSource>,
        caption: String,
        reply_to: Option<DestinationMessageId>,
    },
    Sticker {
        id: DestinationMessageId,
        channel: ChannelId,
        url: String,
        reply_to: Option<DestinationMessageId>,
    },
    ChatPhoto {
        channel: ChannelId,
        url: String,
    },
    Reaction {
        channel: ChannelId,
        message: DestinationMessageId,
        emoji: String,
    },
    Deleted {
        channel: ChannelId,
        message: DestinationMessageId,
    },
}

impl Sent {
    /// The id assigned to a message-producing call.
    pub fn id(&self) -> Option<DestinationMessageId> {
        match self {
            Sent::Text { id, .. }
            | Sent::Notice { id, .. }
            | Sent::Photo { id, .. }
            | Sent::MediaGroup { id, .. }
            | Sent::Sticker { id, .. } => Some(*id),
            Sent::ChatPhoto { .. } | Sent::Reaction { .. } | Sent::Deleted { .. } => None,
        }
    }

    pub fn reply_to(&self) -> Option<DestinationMessageId> {
        match self {
            Sent::Text { reply_to, .. }
            | Sent::Photo { reply_to, .. }
            | Sent::MediaGroup { reply_to, .. }
            | Sent::Sticker { reply_to, .. } => *reply_to,
            _ => None,
        }
    }

    /// Text body or caption, when the call carries one.
    pub fn body(&self) -> Option<&str> {
        match self {
            Sent::Text { html, .. } => Some(html),
            Sent::Notice { text, .. } => Some(text),
            Sent::Photo { caption, .. } | Sent::MediaGroup { caption, .. } => Some(caption),
            _ => None,
        }
    }
}

/// A mock destination network for testing.
///
/// Ids start at 1 and increase by one per message-producing call across
/// all channels.
pub struct MockDestination {
    sent: Arc<Mutex<Vec<Sent>>>,
    notifications: Arc<Mutex<Vec<String>>>,
    next_id: AtomicI32,
    fail_sends: AtomicBool,
}

impl MockDestination {
    /// Create a new mock destination with empty capture buffers.
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            notifications: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicI32::new(1),
            fail_sends: AtomicBool::new(false),
        }
    }

    /// Make every subsequent send fail with a channel error.
    pub fn set_failing(&self, failing: bool) {
        self.fail_sends.store(failing, Ordering::SeqCst);
    }

    /// Get all captured calls in order.
    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }

    /// Get the count of captured calls.
    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Get captured calls addressed to one channel.
    pub async fn sent_to(&self, channel: ChannelId) -> Vec<Sent> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|s| sent_channel(s) == channel)
            .cloned()
            .collect()
    }

    /// Get all operator notifications.
    pub async fn notifications(&self) -> Vec<String> {
        self.notifications.lock().await.clone()
    }

    /// Clear captured calls and notifications.
    pub async fn clear(&self) {
        self.sent.lock().await.clear();
        self.notifications.lock().await.clear();
    }

    async fn record(
        &self,
        build: impl FnOnce(DestinationMessageId) -> Sent,
    ) -> Result<DestinationMessageId, RelayError> {
        self.check_failing()?;
        let id = DestinationMessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().await.push(build(id));
        Ok(id)
    }

    fn check_failing(&self) -> Result<(), RelayError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(RelayError::Channel {
                message: "mock destination is failing".into(),
                source: None,
            });
        }
        Ok(())
    }
}

impl Default for MockDestination {
    fn default() -> Self {
        Self::new()
    }
}

fn sent_channel(sent: &Sent) -> ChannelId {
    match sent {
        Sent::Text { channel, .. }
        | Sent::Notice { channel, .. }
        | Sent::Photo { channel, .. }
        | Sent::MediaGroup { channel, .. }
        | Sent::Sticker { channel, .. }
        | Sent::ChatPhoto { channel, .. }
        | Sent::Reaction { channel, .. }
        | Sent::Deleted { channel, .. } => *channel,
    }
}

#[async_trait]
impl PluginAdapter for MockDestination {
    fn name(&self) -> &str {
        "mock-destination"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Destination
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        Ok(())
    }
}

#[async_trait]
impl DestinationAdapter for MockDestination {
    async fn send_text(
        &self,
        channel: ChannelId,
        html: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        self.record(|id| Sent::Text {
            id,
            channel,
            html: html.to_string(),
            reply_to,
        })
        .await
    }

    async fn send_notice(
        &self,
        channel: ChannelId,
        text: &str,
    ) -> Result<DestinationMessageId, RelayError> {
        self.record(|id| Sent::Notice {
            id,
            channel,
            text: text.to_string(),
        })
        .await
    }

    async fn send_photo(
        &self,
        channel: ChannelId,
        photo: MediaSource,
        caption: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        self.record(|id| Sent::Photo {
            id,
            channel,
            photo,
            caption: caption.to_string(),
            reply_to,
        })
        .await
    }

    async fn send_media_group(
        &self,
        channel: ChannelId,
        media: Vec<MediaSource>,
        caption: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        self.record(|id| Sent::MediaGroup {
            id,
            channel,
            media,
            caption: caption.to_string(),
            reply_to,
        })
        .await
    }

    async fn send_sticker(
        &self,
        channel: ChannelId,
        sticker_url: &str,
        reply_to: Option<DestinationMessageId>,
    ) -> Result<DestinationMessageId, RelayError> {
        self.record(|id| Sent::Sticker {
            id,
            channel,
            url: sticker_url.to_string(),
            reply_to,
        })
        .await
    }

    async fn set_chat_photo(&self, channel: ChannelId, photo_url: &str) -> Result<(), RelayError> {
        self.check_failing()?;
        self.sent.lock().await.push(Sent::ChatPhoto {
            channel,
            url: photo_url.to_string(),
        });
        Ok(())
    }

    async fn react(
        &self,
        channel: ChannelId,
        message: DestinationMessageId,
        emoji: &str,
    ) -> Result<(), RelayError> {
        self.check_failing()?;
        self.sent.lock().await.push(Sent::Reaction {
            channel,
            message,
            emoji: emoji.to_string(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        message: DestinationMessageId,
    ) -> Result<(), RelayError> {
        self.check_failing()?;
        self.sent
            .lock()
            .await
            .push(Sent::Deleted { channel, message });
        Ok(())
    }
}

#[async_trait]
impl Notifier for MockDestination {
    async fn notify(&self, text: &str) -> Result<(), RelayError> {
        self.notifications.lock().await.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ids_are_sequential_across_channels() {
        let dest = MockDestination::new();
        let a = dest.send_text(ChannelId(1), "a", None).await.unwrap();
        let b = dest.send_notice(ChannelId(2), "b").await.unwrap();
        assert_eq!(a, DestinationMessageId(1));
        assert_eq!(b, DestinationMessageId(2));
        assert_eq!(dest.sent_to(ChannelId(2)).await.len(), 1);
    }

    #[tokio::test]
    async fn failing_mode_rejects_sends() {
        let dest = MockDestination::new();
        dest.set_failing(true);
        assert!(dest.send_text(ChannelId(1), "a", None).await.is_err());
        assert_eq!(dest.sent_count().await, 0);
    }

    #[tokio::test]
    async fn notifier_captures_text() {
        let dest = MockDestination::new();
        dest.notify("quota exceeded").await.unwrap();
        assert_eq!(dest.notifications().await, vec!["quota exceeded".to_string()]);
    }
}
