// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the vktg relay.
//!
//! This crate provides the error taxonomy, the network-agnostic domain
//! model and the capability traits shared by the storage, source,
//! destination and relay crates.

pub mod error;
pub mod html;
pub mod message;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{BackoffClass, RelayError};
pub use message::{CanonicalMessage, MediaSource, MessageKind, Repost, Sender, Signature, ThreadTarget};
pub use types::{
    AdapterType, ChannelId, ChatLink, ControlEvent, DestinationMessageId, HealthStatus,
    MessageCorrelation, NewCorrelation, OutboundRequest, PeerId, PeerKind, ReadReceipt,
    SourceMessageId,
};

pub use traits::{DestinationAdapter, FrameRenderer, Notifier, PluginAdapter, StorageAdapter};
