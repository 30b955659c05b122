// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for the ID-mapping store.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChannelId, ChatLink, DestinationMessageId, MessageCorrelation, NewCorrelation, PeerId,
    SourceMessageId,
};

/// Persistence of chat links and bounded message correlation history.
///
/// Every call is atomic. Absence is reported as `Ok(None)`, never as an error.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connection, etc.).
    async fn initialize(&self) -> Result<(), RelayError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), RelayError>;

    /// Inserts or replaces the link for `link.source_peer_id`.
    ///
    /// A link previously holding the same channel is removed together with
    /// its correlations.
    async fn upsert_link(&self, link: &ChatLink) -> Result<(), RelayError>;

    async fn get_link_by_peer(&self, peer: PeerId) -> Result<Option<ChatLink>, RelayError>;

    async fn get_link_by_channel(
        &self,
        channel: ChannelId,
    ) -> Result<Option<ChatLink>, RelayError>;

    async fn list_links(&self) -> Result<Vec<ChatLink>, RelayError>;

    /// Removes the link and all of the peer's correlations. Returns whether a link existed.
    async fn delete_link(&self, peer: PeerId) -> Result<bool, RelayError>;

    /// Records a correlation, evicting the peer's oldest rows beyond the retention limit.
    async fn add_correlation(&self, correlation: &NewCorrelation) -> Result<i64, RelayError>;

    /// Earliest surviving correlation for a source message.
    async fn get_correlation_by_source(
        &self,
        source_message_id: SourceMessageId,
    ) -> Result<Option<MessageCorrelation>, RelayError>;

    async fn get_correlation_by_destination(
        &self,
        channel: ChannelId,
        destination_message_id: DestinationMessageId,
    ) -> Result<Option<MessageCorrelation>, RelayError>;

    async fn get_correlation_by_peer_and_destination(
        &self,
        peer: PeerId,
        destination_message_id: DestinationMessageId,
    ) -> Result<Option<MessageCorrelation>, RelayError>;

    /// Deletes a peer's whole correlation history, keeping its link.
    async fn purge_correlations(&self, peer: PeerId) -> Result<u64, RelayError>;

    async fn count_correlations(&self, peer: PeerId) -> Result<u64, RelayError>;
}
