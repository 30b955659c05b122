// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator commands issued from the destination network.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use vktg_core::html::escape_html;
use vktg_core::{ChannelId, ChatLink, DestinationAdapter, PeerId, RelayError, StorageAdapter};
use vktg_vk::VkApi;

use crate::listing::{paginate, send_paginated};
use crate::normalizer::resolve_sender;
use crate::read_receipts::ReadReceipts;

const HELP: &str = "Commands:\n\
/link <peer id> - relay a VK conversation into this chat (negative ids are communities)\n\
/unlink - stop relaying into this chat\n\
/read - mark the linked conversation as read\n\
/links - list linked conversations\n\
/friends - list your VK friends\n\
/help - show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Raw argument, validated on execution.
    Link(String),
    Unlink,
    Read,
    Links,
    Friends,
    Help,
}

impl Command {
    /// Parses `/name [args]`, accepting the `/name@bot` form.
    pub fn parse(text: &str) -> Option<Command> {
        let rest = text.trim().strip_prefix('/')?;
        let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
        let name = head.split('@').next().unwrap_or(head).to_ascii_lowercase();

        match name.as_str() {
            "link" => Some(Command::Link(args.trim().to_string())),
            "unlink" => Some(Command::Unlink),
            "read" => Some(Command::Read),
            "links" => Some(Command::Links),
            "friends" => Some(Command::Friends),
            "help" | "start" => Some(Command::Help),
            _ => None,
        }
    }
}

/// Accepts a decimal peer id with an optional leading `-` for communities.
pub fn parse_peer_id(raw: &str) -> Result<PeerId, RelayError> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RelayError::InvalidInput(format!(
            "\"{raw}\" is not a peer id. Usage: /link 12345 for a user, /link -12345 for a community."
        )));
    }
    match raw.parse::<i64>() {
        Ok(0) | Err(_) => Err(RelayError::InvalidInput(format!(
            "\"{raw}\" is out of range for a peer id."
        ))),
        Ok(id) => Ok(PeerId(id)),
    }
}

pub struct CommandHandler {
    api: Arc<dyn VkApi>,
    store: Arc<dyn StorageAdapter>,
    destination: Arc<dyn DestinationAdapter>,
    read_receipts: Arc<ReadReceipts>,
    control_channel: ChannelId,
    listing_chunk_chars: usize,
    listing_delay: Duration,
}

impl CommandHandler {
    pub fn new(
        api: Arc<dyn VkApi>,
        store: Arc<dyn StorageAdapter>,
        destination: Arc<dyn DestinationAdapter>,
        read_receipts: Arc<ReadReceipts>,
        control_channel: ChannelId,
        listing_chunk_chars: usize,
        listing_delay: Duration,
    ) -> Self {
        Self {
            api,
            store,
            destination,
            read_receipts,
            control_channel,
            listing_chunk_chars,
            listing_delay,
        }
    }

    /// Runs the command in `text` and replies in `channel`.
    ///
    /// Operator mistakes are answered in the chat and are not errors.
    pub async fn execute(&self, channel: ChannelId, text: &str) -> Result<(), RelayError> {
        let outcome = match Command::parse(text) {
            Some(command) => self.run(channel, command).await,
            None => Ok(Some("Unknown command. Send /help for the list.".to_string())),
        };
        let reply = match outcome {
            Ok(reply) => reply,
            Err(RelayError::InvalidInput(message)) => Some(message),
            Err(e) => return Err(e),
        };
        if let Some(reply) = reply {
            self.reply(channel, &reply).await?;
        }
        Ok(())
    }

    async fn run(&self, channel: ChannelId, command: Command) -> Result<Option<String>, RelayError> {
        match command {
            Command::Link(arg) => self.link(channel, &arg).await.map(Some),
            Command::Unlink => {
                let link = self.linked(channel).await?;
                self.store.delete_link(link.source_peer_id).await?;
                self.read_receipts.forget(link.source_peer_id);
                info!(peer_id = %link.source_peer_id, channel_id = %channel, "chat unlinked");
                Ok(Some(format!("Unlinked from {}.", link.display_name)))
            }
            Command::Read => {
                let link = self.linked(channel).await?;
                self.api.mark_as_read(link.source_peer_id).await?;
                Ok(Some(format!("Marked {} as read.", link.display_name)))
            }
            Command::Links => self.links(channel).await,
            Command::Friends => self.friends(channel).await,
            Command::Help => Ok(Some(HELP.to_string())),
        }
    }

    async fn link(&self, channel: ChannelId, arg: &str) -> Result<String, RelayError> {
        if channel == self.control_channel {
            return Err(RelayError::InvalidInput(
                "The control chat cannot be linked. Run /link in the chat you want to use.".into(),
            ));
        }
        let peer = parse_peer_id(arg)?;
        let sender = match resolve_sender(self.api.as_ref(), peer).await {
            Ok(sender) => sender,
            Err(RelayError::EmptyResponse { .. } | RelayError::Protocol { .. }) => {
                return Err(RelayError::InvalidInput(format!(
                    "No VK user or community with id {peer}."
                )));
            }
            Err(e) => return Err(e),
        };

        if let Some(previous) = self.store.get_link_by_channel(channel).await?
            && previous.source_peer_id != peer
        {
            self.store.delete_link(previous.source_peer_id).await?;
            self.read_receipts.forget(previous.source_peer_id);
        }
        self.store
            .upsert_link(&ChatLink {
                source_peer_id: peer,
                display_name: sender.name.clone(),
                destination_channel_id: channel,
            })
            .await?;
        let purged = self.store.purge_correlations(peer).await?;
        self.read_receipts.forget(peer);
        info!(peer_id = %peer, channel_id = %channel, purged, "chat linked");

        if let Some(avatar) = sender.avatar.as_deref()
            && let Err(e) = self.destination.set_chat_photo(channel, avatar).await
        {
            warn!(peer_id = %peer, channel_id = %channel, error = %e, "chat photo not updated");
        }

        Ok(format!("Linked to {}.", sender.name))
    }

    async fn links(&self, channel: ChannelId) -> Result<Option<String>, RelayError> {
        let links = self.store.list_links().await?;
        if links.is_empty() {
            return Ok(Some("No linked chats.".into()));
        }
        let lines: Vec<String> = links
            .iter()
            .map(|l| {
                escape_html(&format!(
                    "{} ({}) -> chat {}",
                    l.display_name, l.source_peer_id, l.destination_channel_id
                ))
            })
            .collect();
        let chunks = paginate(&lines, self.listing_chunk_chars);
        send_paginated(self.destination.as_ref(), channel, &chunks, self.listing_delay).await?;
        Ok(None)
    }

    async fn friends(&self, channel: ChannelId) -> Result<Option<String>, RelayError> {
        let friends = self.api.get_friends().await?;
        if friends.is_empty() {
            return Ok(Some("No friends found.".into()));
        }
        let lines: Vec<String> = friends
            .iter()
            .map(|f| escape_html(&format!("{} {}: {}", f.first_name, f.last_name, f.id)))
            .collect();
        let chunks = paginate(&lines, self.listing_chunk_chars);
        send_paginated(self.destination.as_ref(), channel, &chunks, self.listing_delay).await?;
        Ok(None)
    }

    async fn linked(&self, channel: ChannelId) -> Result<ChatLink, RelayError> {
        self.store
            .get_link_by_channel(channel)
            .await?
            .ok_or_else(|| RelayError::InvalidInput("This chat is not linked. Use /link first.".into()))
    }

    async fn reply(&self, channel: ChannelId, text: &str) -> Result<(), RelayError> {
        self.destination
            .send_text(channel, &escape_html(text), None)
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vktg_config::model::ReadNotificationMode;
    use vktg_core::{DestinationMessageId, NewCorrelation, SourceMessageId};
    use vktg_test_utils::{CONTROL_CHANNEL, Sent, TestHarness, fixtures};

    const CHANNEL: ChannelId = ChannelId(-500);

    async fn setup() -> (TestHarness, CommandHandler) {
        let h = TestHarness::builder().build().await.unwrap();
        let receipts = Arc::new(ReadReceipts::new(
            ReadNotificationMode::Notice,
            h.destination.clone(),
            h.storage_dyn(),
            h.vk.clone(),
            CONTROL_CHANNEL,
        ));
        let handler = CommandHandler::new(
            h.vk.clone(),
            h.storage_dyn(),
            h.destination.clone(),
            receipts,
            CONTROL_CHANNEL,
            4096,
            Duration::from_millis(10),
        );
        (h, handler)
    }

    async fn last_reply(h: &TestHarness) -> String {
        let sent = h.destination.sent().await;
        sent.last()
            .and_then(|s| s.body())
            .map(str::to_string)
            .unwrap_or_default()
    }

    #[test]
    fn parse_recognizes_commands() {
        assert_eq!(Command::parse("/link 42"), Some(Command::Link("42".into())));
        assert_eq!(Command::parse("/LINK@vktg_bot  -7 "), Some(Command::Link("-7".into())));
        assert_eq!(Command::parse("/unlink"), Some(Command::Unlink));
        assert_eq!(Command::parse("/links"), Some(Command::Links));
        assert_eq!(Command::parse("/start"), Some(Command::Help));
        assert_eq!(Command::parse("/nope"), None);
        assert_eq!(Command::parse("link 42"), None);
    }

    #[test]
    fn peer_id_validation() {
        assert_eq!(parse_peer_id("42").unwrap(), PeerId(42));
        assert_eq!(parse_peer_id("-42").unwrap(), PeerId(-42));
        for bad in ["", "-", "abc", "4 2", "0", "+5", "99999999999999999999"] {
            assert!(
                matches!(parse_peer_id(bad), Err(RelayError::InvalidInput(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[tokio::test]
    async fn link_creates_link_and_purges_history() {
        let (h, handler) = setup().await;
        h.vk.add_user(fixtures::user(5, "Anna", "K")).await;
        h.storage
            .add_correlation(&NewCorrelation {
                source_peer_id: PeerId(5),
                source_message_id: SourceMessageId(1),
                destination_channel_id: CONTROL_CHANNEL,
                destination_message_id: DestinationMessageId(1),
            })
            .await
            .unwrap();

        handler.execute(CHANNEL, "/link 5").await.unwrap();

        let link = h.storage.get_link_by_channel(CHANNEL).await.unwrap().unwrap();
        assert_eq!(link.source_peer_id, PeerId(5));
        assert_eq!(link.display_name, "Anna K");
        assert_eq!(h.storage.count_correlations(PeerId(5)).await.unwrap(), 0);
        assert_eq!(last_reply(&h).await, "Linked to Anna K.");
    }

    #[tokio::test]
    async fn link_sets_chat_photo_from_avatar() {
        let (h, handler) = setup().await;
        h.vk.add_user(fixtures::user(5, "Anna", "K")).await;

        handler.execute(CHANNEL, "/link 5").await.unwrap();

        let sent = h.destination.sent_to(CHANNEL).await;
        assert!(sent.iter().any(|s| matches!(
            s,
            Sent::ChatPhoto { url, .. } if url == "https://vk.com/images/u5.jpg"
        )));
    }

    #[tokio::test]
    async fn link_without_avatar_keeps_chat_photo() {
        let (h, handler) = setup().await;
        h.vk.add_group(fixtures::group(22, "Club")).await;

        handler.execute(CHANNEL, "/link -22").await.unwrap();

        assert!(h.storage.get_link_by_peer(PeerId(-22)).await.unwrap().is_some());
        let sent = h.destination.sent().await;
        assert!(!sent.iter().any(|s| matches!(s, Sent::ChatPhoto { .. })));
        assert_eq!(last_reply(&h).await, "Linked to Club.");
    }

    #[tokio::test]
    async fn links_lists_every_linked_chat() {
        let (h, handler) = setup().await;
        handler.execute(CONTROL_CHANNEL, "/links").await.unwrap();
        assert_eq!(last_reply(&h).await, "No linked chats.");

        h.vk.add_user(fixtures::user(5, "Anna", "K")).await;
        h.vk.add_group(fixtures::group(22, "<Club>")).await;
        handler.execute(CHANNEL, "/link 5").await.unwrap();
        handler.execute(ChannelId(-600), "/link -22").await.unwrap();

        handler.execute(CONTROL_CHANNEL, "/links").await.unwrap();
        let reply = last_reply(&h).await;
        assert!(reply.contains("Anna K (5) -&gt; chat -500"), "{reply}");
        assert!(reply.contains("&lt;Club&gt; (-22) -&gt; chat -600"), "{reply}");
    }

    #[tokio::test]
    async fn relinking_channel_replaces_previous_peer() {
        let (h, handler) = setup().await;
        h.vk.add_user(fixtures::user(5, "Anna", "K")).await;
        h.vk.add_group(fixtures::group(22, "Club")).await;

        handler.execute(CHANNEL, "/link 5").await.unwrap();
        handler.execute(CHANNEL, "/link -22").await.unwrap();

        assert!(h.storage.get_link_by_peer(PeerId(5)).await.unwrap().is_none());
        let link = h.storage.get_link_by_channel(CHANNEL).await.unwrap().unwrap();
        assert_eq!(link.source_peer_id, PeerId(-22));
    }

    #[tokio::test]
    async fn invalid_link_arguments_get_actionable_replies() {
        let (h, handler) = setup().await;

        handler.execute(CHANNEL, "/link abc").await.unwrap();
        assert!(last_reply(&h).await.contains("/link 12345"));

        handler.execute(CHANNEL, "/link 77").await.unwrap();
        assert_eq!(last_reply(&h).await, "No VK user or community with id 77.");

        handler.execute(CONTROL_CHANNEL, "/link 5").await.unwrap();
        assert!(last_reply(&h).await.starts_with("The control chat cannot be linked"));

        assert!(h.storage.list_links().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unlink_and_read_need_a_link() {
        let (h, handler) = setup().await;
        handler.execute(CHANNEL, "/read").await.unwrap();
        assert_eq!(last_reply(&h).await, "This chat is not linked. Use /link first.");

        h.vk.add_user(fixtures::user(5, "Anna", "K")).await;
        handler.execute(CHANNEL, "/link 5").await.unwrap();
        handler.execute(CHANNEL, "/read").await.unwrap();
        assert_eq!(h.vk.marked_read().await, vec![PeerId(5)]);

        handler.execute(CHANNEL, "/unlink").await.unwrap();
        assert_eq!(last_reply(&h).await, "Unlinked from Anna K.");
        assert!(h.storage.get_link_by_channel(CHANNEL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn friends_are_listed() {
        let (h, handler) = setup().await;
        h.vk
            .add_friend(vktg_vk::Friend {
                id: 5,
                first_name: "Anna".into(),
                last_name: "K".into(),
            })
            .await;
        h.vk
            .add_friend(vktg_vk::Friend {
                id: 6,
                first_name: "Boris".into(),
                last_name: "<P>".into(),
            })
            .await;

        handler.execute(CHANNEL, "/friends").await.unwrap();
        assert_eq!(last_reply(&h).await, "Anna K: 5\nBoris &lt;P&gt;: 6");
    }

    #[tokio::test]
    async fn help_and_unknown_commands_reply() {
        let (h, handler) = setup().await;
        handler.execute(CHANNEL, "/help").await.unwrap();
        assert!(last_reply(&h).await.contains("/friends"));
        handler.execute(CHANNEL, "/what").await.unwrap();
        assert!(last_reply(&h).await.starts_with("Unknown command"));
    }
}
