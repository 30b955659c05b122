// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for relay integration tests.
//!
//! `TestHarness` bundles a temp SQLite store with the mock VK API and the
//! mock destination. Relay components are assembled by the tests from
//! these parts.

use std::sync::Arc;

use vktg_config::model::StorageConfig;
use vktg_core::{ChannelId, ChatLink, PeerId, RelayError, StorageAdapter};
use vktg_storage::SqliteStorage;

use crate::mock_destination::MockDestination;
use crate::mock_vk::MockVkApi;

/// Operator control channel used by harness-built relays.
pub const CONTROL_CHANNEL: ChannelId = ChannelId(-1_000);

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    retention: u32,
    links: Vec<ChatLink>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            retention: 1000,
            links: Vec::new(),
        }
    }

    /// Set the per-peer correlation retention limit.
    pub fn with_retention(mut self, retention: u32) -> Self {
        self.retention = retention;
        self
    }

    /// Pre-link a peer to a channel.
    pub fn with_link(mut self, peer: i64, name: &str, channel: i64) -> Self {
        self.links.push(ChatLink {
            source_peer_id: PeerId(peer),
            display_name: name.to_string(),
            destination_channel_id: ChannelId(channel),
        });
        self
    }

    /// Build the test harness, creating the temp database.
    pub async fn build(self) -> Result<TestHarness, RelayError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| RelayError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");

        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
            max_correlations_per_peer: self.retention,
        });
        storage.initialize().await?;
        for link in &self.links {
            storage.upsert_link(link).await?;
        }

        Ok(TestHarness {
            storage: Arc::new(storage),
            vk: Arc::new(MockVkApi::new()),
            destination: Arc::new(MockDestination::new()),
            _temp_dir: temp_dir,
        })
    }
}

/// Temp store plus mocks. The database lives as long as the harness.
pub struct TestHarness {
    pub storage: Arc<SqliteStorage>,
    pub vk: Arc<MockVkApi>,
    pub destination: Arc<MockDestination>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn storage_dyn(&self) -> Arc<dyn StorageAdapter> {
        self.storage.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_applies_links() {
        let harness = TestHarness::builder()
            .with_link(5, "Anna", -500)
            .build()
            .await
            .unwrap();
        let link = harness
            .storage
            .get_link_by_channel(ChannelId(-500))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.source_peer_id, PeerId(5));
    }
}
