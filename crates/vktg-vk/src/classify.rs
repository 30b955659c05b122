// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoding of raw long-poll update tuples into [`UpdateEvent`]s.

use serde_json::{Map, Value};
use vktg_core::{PeerId, ReadReceipt, RelayError, SourceMessageId};

use crate::types::Attachment;

/// `[4, message_id, flags, peer_id, timestamp, text, extras]`
pub const NEW_MESSAGE: i64 = 4;
/// `[7, peer_id, local_id]`: outgoing messages up to `local_id` were read.
pub const OUTGOING_READ: i64 = 7;
/// Flag bit set on messages sent by the account itself.
pub const OUTBOX_FLAG: i64 = 2;

/// A new-message update as carried by the long-poll feed.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub message_id: SourceMessageId,
    pub flags: i64,
    pub peer_id: PeerId,
    pub timestamp: i64,
    pub text: String,
    pub extras: MessageExtras,
}

/// The attachment summary (`extras`) of a new-message update.
///
/// VK encodes it as a flat string map such as
/// `{"attach1_type": "sticker", "attachments": "[...]", "reply": "..."}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageExtras(Map<String, Value>);

impl MessageExtras {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    fn has_value(&self, needle: &str) -> bool {
        self.0.values().any(|v| v.as_str() == Some(needle))
    }

    pub fn has_sticker(&self) -> bool {
        self.has_value("sticker")
    }

    pub fn is_repost(&self) -> bool {
        self.has_value("wall")
    }

    pub fn has_reply(&self) -> bool {
        self.0.contains_key("reply")
    }

    /// Full attachment objects from the JSON-encoded `attachments` field.
    pub fn attachments(&self) -> Vec<Attachment> {
        self.0
            .get("attachments")
            .and_then(Value::as_str)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default()
    }
}

/// A classified long-poll update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    /// A new message received from a peer.
    InboundMessage(NewMessage),
    /// A peer has read the account's outgoing messages.
    ReadReceipt(ReadReceipt),
    /// Any update the relay does not act on, including outgoing messages.
    Ignored { code: i64 },
}

impl UpdateEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateEvent::InboundMessage(_) => "inbound_message",
            UpdateEvent::ReadReceipt(_) => "read_receipt",
            UpdateEvent::Ignored { .. } => "ignored",
        }
    }
}

pub fn is_outgoing(flags: i64) -> bool {
    flags & OUTBOX_FLAG != 0
}

/// Decodes one raw update.
///
/// Unknown type codes map to [`UpdateEvent::Ignored`]. A known code with a
/// malformed body is a [`RelayError::Decode`]; callers skip it and keep
/// processing the batch.
pub fn classify(raw: &Value) -> Result<UpdateEvent, RelayError> {
    let fields = raw
        .as_array()
        .ok_or_else(|| RelayError::Decode(format!("update is not an array: {raw}")))?;
    let code = int_at(fields, 0, "type code")?;

    match code {
        NEW_MESSAGE => {
            let flags = int_at(fields, 2, "flags")?;
            if is_outgoing(flags) {
                return Ok(UpdateEvent::Ignored { code });
            }
            let message = NewMessage {
                message_id: SourceMessageId(int_at(fields, 1, "message id")?),
                flags,
                peer_id: PeerId(int_at(fields, 3, "peer id")?),
                timestamp: fields.get(4).and_then(Value::as_i64).unwrap_or_default(),
                text: fields
                    .get(5)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                extras: fields
                    .get(6)
                    .and_then(Value::as_object)
                    .cloned()
                    .map(MessageExtras::new)
                    .unwrap_or_default(),
            };
            Ok(UpdateEvent::InboundMessage(message))
        }
        OUTGOING_READ => Ok(UpdateEvent::ReadReceipt(ReadReceipt {
            peer_id: PeerId(int_at(fields, 1, "peer id")?),
            up_to: SourceMessageId(int_at(fields, 2, "local id")?),
        })),
        other => Ok(UpdateEvent::Ignored { code: other }),
    }
}

fn int_at(fields: &[Value], index: usize, what: &str) -> Result<i64, RelayError> {
    fields
        .get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| RelayError::Decode(format!("update is missing {what} at index {index}")))
}
