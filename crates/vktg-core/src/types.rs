// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity and persistence types shared across the relay.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A source-network peer. Positive ids are users, negative ids are groups.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(pub i64);

/// Which kind of source profile a [`PeerId`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PeerKind {
    User,
    Group,
}

impl PeerId {
    pub fn kind(self) -> PeerKind {
        if self.0 < 0 {
            PeerKind::Group
        } else {
            PeerKind::User
        }
    }

    /// The unsigned profile id, as used by group lookups and profile links.
    pub fn profile_id(self) -> u64 {
        self.0.unsigned_abs()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identity on the source network (account-wide).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SourceMessageId(pub i64);

impl fmt::Display for SourceMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A destination conversation channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(pub i64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message identity on the destination network (unique within a channel).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DestinationMessageId(pub i32);

impl fmt::Display for DestinationMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Association between one source peer and one destination channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLink {
    pub source_peer_id: PeerId,
    pub display_name: String,
    pub destination_channel_id: ChannelId,
}

/// A correlation to be inserted. The store assigns the sequence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewCorrelation {
    pub source_peer_id: PeerId,
    pub source_message_id: SourceMessageId,
    pub destination_channel_id: ChannelId,
    pub destination_message_id: DestinationMessageId,
}

/// A stored source/destination message pair, scoped to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCorrelation {
    /// Insertion sequence; eviction removes the lowest ids first.
    pub id: i64,
    pub source_peer_id: PeerId,
    pub source_message_id: SourceMessageId,
    pub destination_channel_id: ChannelId,
    pub destination_message_id: DestinationMessageId,
    pub created_at: String,
}

/// The recipient of outgoing messages has read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadReceipt {
    pub peer_id: PeerId,
    /// Highest outgoing source message id covered by the receipt.
    pub up_to: SourceMessageId,
}

/// A message an operator posted on the destination network, to be relayed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub channel: ChannelId,
    pub message_id: DestinationMessageId,
    pub text: Option<String>,
    /// Bytes of the largest photo variant, already downloaded.
    pub photo: Option<Vec<u8>>,
    pub reply_to: Option<DestinationMessageId>,
    pub edited: bool,
}

/// Something an operator did on the destination network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlEvent {
    /// A `/command` message, with the raw text after the bot mention is stripped.
    Command { channel: ChannelId, text: String },
    /// Any other message, to be relayed to the source network.
    Outbound(OutboundRequest),
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays in the relay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Source,
    Destination,
    Storage,
    Renderer,
}
