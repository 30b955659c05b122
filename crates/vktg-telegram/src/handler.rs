// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization filtering and decoding of operator messages.
//!
//! Only the operator may drive the relay: the user whose private chat is the
//! control channel, plus anyone listed in `telegram.allowed_users`.

use teloxide::prelude::*;
use tracing::debug;
use vktg_core::{ChannelId, ControlEvent, DestinationMessageId, OutboundRequest, RelayError};

use crate::media;

/// Checks whether the sender may command the relay.
///
/// Passes when the sender's id equals the control chat id (private control
/// chat) or matches an `allowed_users` entry by id or username. Messages
/// without a sender never pass.
pub fn is_authorized(
    msg: &Message,
    control_chat_id: Option<i64>,
    allowed_users: &[String],
) -> bool {
    let Some(user) = msg.from.as_ref() else {
        return false;
    };

    if let Some(control) = control_chat_id
        && i64::try_from(user.id.0) == Ok(control)
    {
        return true;
    }

    let user_id = user.id.0.to_string();
    allowed_users.iter().any(|allowed| {
        if *allowed == user_id {
            return true;
        }
        let allowed = allowed.strip_prefix('@').unwrap_or(allowed);
        user.username
            .as_deref()
            .is_some_and(|name| name.eq_ignore_ascii_case(allowed))
    })
}

/// Decodes an operator message into a [`ControlEvent`].
///
/// Text starting with `/` is a command. Anything else with text, a caption
/// or a photo is an outbound request. Other message types yield `None`.
pub async fn to_control_event(
    bot: &Bot,
    msg: &Message,
    edited: bool,
) -> Result<Option<ControlEvent>, RelayError> {
    let channel = ChannelId(msg.chat.id.0);

    if let Some(text) = msg.text()
        && text.starts_with('/')
    {
        return Ok(Some(ControlEvent::Command {
            channel,
            text: text.to_string(),
        }));
    }

    let text = msg.text().or_else(|| msg.caption()).map(str::to_string);
    let photo = match msg.photo() {
        // Edits are dropped by the relay; skip the download.
        Some(photos) if !edited => Some(media::download_largest_photo(bot, photos).await?),
        _ => None,
    };

    if text.is_none() && photo.is_none() && !edited {
        debug!(msg_id = msg.id.0, "ignoring unsupported message type");
        return Ok(None);
    }

    Ok(Some(ControlEvent::Outbound(OutboundRequest {
        channel,
        message_id: DestinationMessageId(msg.id.0),
        text,
        photo,
        reply_to: msg
            .reply_to_message()
            .map(|reply| DestinationMessageId(reply.id.0)),
        edited,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn from_json(value: Value) -> Message {
        serde_json::from_value(value).expect("failed to deserialize mock message")
    }

    fn user(id: u64, username: Option<&str>) -> Value {
        let mut user = json!({ "id": id, "is_bot": false, "first_name": "Test" });
        if let Some(name) = username {
            user["username"] = json!(name);
        }
        user
    }

    fn group_message(from: Value, text: &str) -> Value {
        json!({
            "message_id": 7,
            "date": 1700000000i64,
            "chat": { "id": -100123i64, "type": "supergroup", "title": "Anna" },
            "from": from,
            "text": text,
        })
    }

    #[test]
    fn operator_of_private_control_chat_is_authorized() {
        let msg = from_json(group_message(user(42, None), "hi"));
        assert!(is_authorized(&msg, Some(42), &[]));
        assert!(!is_authorized(&msg, Some(43), &[]));
        assert!(!is_authorized(&msg, None, &[]));
    }

    #[test]
    fn allowed_users_match_id_or_username() {
        let msg = from_json(group_message(user(42, Some("Anna")), "hi"));
        assert!(is_authorized(&msg, None, &["42".into()]));
        assert!(is_authorized(&msg, None, &["@anna".into()]));
        assert!(!is_authorized(&msg, None, &["boris".into()]));
    }

    #[test]
    fn message_without_sender_is_rejected() {
        let mut value = group_message(user(42, None), "hi");
        value.as_object_mut().unwrap().remove("from");
        let msg = from_json(value);
        assert!(!is_authorized(&msg, Some(42), &["42".into()]));
    }

    #[tokio::test]
    async fn slash_text_is_a_command() {
        let bot = Bot::new("test:token");
        let msg = from_json(group_message(user(42, None), "/link 5"));
        let event = to_control_event(&bot, &msg, false).await.unwrap();
        assert_eq!(
            event,
            Some(ControlEvent::Command {
                channel: ChannelId(-100123),
                text: "/link 5".into()
            })
        );
    }

    #[tokio::test]
    async fn reply_becomes_outbound_request() {
        let bot = Bot::new("test:token");
        let mut value = group_message(user(42, None), "hello");
        value["reply_to_message"] = json!({
            "message_id": 3,
            "date": 1700000000i64,
            "chat": { "id": -100123i64, "type": "supergroup", "title": "Anna" },
            "text": "forwarded",
        });
        let msg = from_json(value);

        let Some(ControlEvent::Outbound(request)) =
            to_control_event(&bot, &msg, false).await.unwrap()
        else {
            panic!("expected outbound request");
        };
        assert_eq!(request.message_id, DestinationMessageId(7));
        assert_eq!(request.reply_to, Some(DestinationMessageId(3)));
        assert_eq!(request.text.as_deref(), Some("hello"));
        assert!(!request.edited);
    }

    #[tokio::test]
    async fn edits_are_flagged() {
        let bot = Bot::new("test:token");
        let msg = from_json(group_message(user(42, None), "fixed"));
        let Some(ControlEvent::Outbound(request)) =
            to_control_event(&bot, &msg, true).await.unwrap()
        else {
            panic!("expected outbound request");
        };
        assert!(request.edited);
    }

    #[tokio::test]
    async fn unsupported_message_is_ignored() {
        let bot = Bot::new("test:token");
        let msg = from_json(json!({
            "message_id": 7,
            "date": 1700000000i64,
            "chat": { "id": -100123i64, "type": "supergroup", "title": "Anna" },
            "from": user(42, None),
            "location": { "latitude": 1.0, "longitude": 2.0 },
        }));
        assert_eq!(to_control_event(&bot, &msg, false).await.unwrap(), None);
    }
}
