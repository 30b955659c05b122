// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON fixtures for VK payloads.

use serde_json::{Value, json};
use vktg_vk::{Group, LongPollResponse, User, VkMessage};

pub fn user(id: i64, first_name: &str, last_name: &str) -> User {
    from_json(json!({
        "id": id,
        "first_name": first_name,
        "last_name": last_name,
        "photo_200": format!("https://vk.com/images/u{id}.jpg"),
    }))
}

pub fn group(id: i64, name: &str) -> Group {
    from_json(json!({ "id": id, "name": name }))
}

pub fn photo_attachment(url: &str) -> Value {
    json!({
        "type": "photo",
        "photo": { "sizes": [
            { "url": format!("{url}?small"), "width": 75, "height": 50 },
            { "url": url, "width": 1280, "height": 853 },
        ]}
    })
}

pub fn video_attachment(owner_id: i64, id: i64, frame_url: &str) -> Value {
    json!({
        "type": "video",
        "video": {
            "id": id,
            "owner_id": owner_id,
            "access_key": "key",
            "image": [{ "url": frame_url, "width": 800, "height": 450 }],
        }
    })
}

pub fn sticker_attachment(url: &str) -> Value {
    json!({
        "type": "sticker",
        "sticker": {
            "images": [{ "url": format!("{url}?plain"), "width": 512, "height": 512 }],
            "images_with_background": [
                { "url": format!("{url}?small"), "width": 64, "height": 64 },
                { "url": url, "width": 512, "height": 512 },
            ]
        }
    })
}

pub fn wall_attachment(post_id: i64, from_id: i64, text: &str, attachments: Vec<Value>) -> Value {
    json!({
        "type": "wall",
        "wall": {
            "id": post_id,
            "from_id": from_id,
            "text": text,
            "attachments": attachments,
        }
    })
}

/// A `messages.getById` item.
pub fn message(id: i64, from_id: i64, text: &str, attachments: Vec<Value>) -> Value {
    json!({
        "id": id,
        "from_id": from_id,
        "peer_id": from_id,
        "text": text,
        "attachments": attachments,
    })
}

/// Adds an embedded `reply_message` to a message fixture.
pub fn with_reply(mut message: Value, reply: Value) -> Value {
    message["reply_message"] = reply;
    message
}

pub fn vk_message(value: Value) -> VkMessage {
    from_json(value)
}

/// A long-poll `a_check` body.
pub fn long_poll(ts: i64, updates: Vec<Value>) -> LongPollResponse {
    from_json(json!({ "ts": ts, "updates": updates }))
}

/// A raw new-message update for an incoming message.
pub fn new_message_update(message_id: i64, peer_id: i64, text: &str, extras: Value) -> Value {
    json!([4, message_id, 1, peer_id, 1_700_000_000, text, extras])
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> T {
    match serde_json::from_value(value) {
        Ok(v) => v,
        Err(e) => panic!("invalid fixture: {e}"),
    }
}
