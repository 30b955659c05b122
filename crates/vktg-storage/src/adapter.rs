// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the StorageAdapter trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use vktg_config::model::StorageConfig;
use vktg_core::{
    AdapterType, ChannelId, ChatLink, DestinationMessageId, HealthStatus, MessageCorrelation,
    NewCorrelation, PeerId, PluginAdapter, RelayError, SourceMessageId, StorageAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries::{correlations, links};

/// SQLite-backed ID-mapping store.
///
/// The database is opened on the first call to [`StorageAdapter::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, RelayError> {
        self.db.get().ok_or_else(|| RelayError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    async fn checkpoint_if_open(&self) -> Result<(), RelayError> {
        match self.db.get() {
            Some(db) if self.config.wal_mode => db.checkpoint().await,
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        self.db()?
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.checkpoint_if_open().await
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), RelayError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| RelayError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(
            path = %self.config.database_path,
            retention = self.config.max_correlations_per_peer,
            "SQLite storage initialized"
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), RelayError> {
        self.db()?;
        self.checkpoint_if_open().await
    }

    async fn upsert_link(&self, link: &ChatLink) -> Result<(), RelayError> {
        links::upsert_link(self.db()?, link).await
    }

    async fn get_link_by_peer(&self, peer: PeerId) -> Result<Option<ChatLink>, RelayError> {
        links::get_link_by_peer(self.db()?, peer).await
    }

    async fn get_link_by_channel(
        &self,
        channel: ChannelId,
    ) -> Result<Option<ChatLink>, RelayError> {
        links::get_link_by_channel(self.db()?, channel).await
    }

    async fn list_links(&self) -> Result<Vec<ChatLink>, RelayError> {
        links::list_links(self.db()?).await
    }

    async fn delete_link(&self, peer: PeerId) -> Result<bool, RelayError> {
        links::delete_link(self.db()?, peer).await
    }

    async fn add_correlation(&self, correlation: &NewCorrelation) -> Result<i64, RelayError> {
        correlations::add_correlation(
            self.db()?,
            correlation,
            self.config.max_correlations_per_peer,
        )
        .await
    }

    async fn get_correlation_by_source(
        &self,
        source_message_id: SourceMessageId,
    ) -> Result<Option<MessageCorrelation>, RelayError> {
        correlations::get_by_source(self.db()?, source_message_id).await
    }

    async fn get_correlation_by_destination(
        &self,
        channel: ChannelId,
        destination_message_id: DestinationMessageId,
    ) -> Result<Option<MessageCorrelation>, RelayError> {
        correlations::get_by_destination(self.db()?, channel, destination_message_id).await
    }

    async fn get_correlation_by_peer_and_destination(
        &self,
        peer: PeerId,
        destination_message_id: DestinationMessageId,
    ) -> Result<Option<MessageCorrelation>, RelayError> {
        correlations::get_by_peer_and_destination(self.db()?, peer, destination_message_id).await
    }

    async fn purge_correlations(&self, peer: PeerId) -> Result<u64, RelayError> {
        correlations::purge_for_peer(self.db()?, peer).await
    }

    async fn count_correlations(&self, peer: PeerId) -> Result<u64, RelayError> {
        correlations::count_for_peer(self.db()?, peer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &std::path::Path, retention: u32) -> StorageConfig {
        StorageConfig {
            database_path: path.to_str().unwrap().to_string(),
            wal_mode: true,
            max_correlations_per_peer: retention,
        }
    }

    fn corr(src: i64, dst: i32) -> NewCorrelation {
        NewCorrelation {
            source_peer_id: PeerId(10),
            source_message_id: SourceMessageId(src),
            destination_channel_id: ChannelId(-500),
            destination_message_id: DestinationMessageId(dst),
        }
    }

    #[tokio::test]
    async fn sqlite_storage_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(&dir.path().join("t.db"), 10));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(&dir.path().join("t.db"), 10));
        storage.initialize().await.unwrap();
        assert!(storage.initialize().await.is_err());
    }

    #[tokio::test]
    async fn operations_before_initialize_are_store_unavailable() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(&dir.path().join("t.db"), 10));
        assert!(matches!(
            storage.get_link_by_peer(PeerId(1)).await,
            Err(RelayError::Storage { .. })
        ));
        assert!(storage.health_check().await.is_err());
    }

    #[tokio::test]
    async fn retention_of_one_thousand_evicts_first_row() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(&dir.path().join("t.db"), 1000));
        storage.initialize().await.unwrap();

        for i in 0..1001 {
            storage.add_correlation(&corr(1_000 + i, i as i32)).await.unwrap();
        }

        assert_eq!(storage.count_correlations(PeerId(10)).await.unwrap(), 1000);
        assert!(
            storage
                .get_correlation_by_source(SourceMessageId(1_000))
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            storage
                .get_correlation_by_source(SourceMessageId(1_001))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn link_round_trip_and_cascade_through_adapter() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(&dir.path().join("t.db"), 10));
        storage.initialize().await.unwrap();

        let link = ChatLink {
            source_peer_id: PeerId(10),
            display_name: "Anna".into(),
            destination_channel_id: ChannelId(-500),
        };
        storage.upsert_link(&link).await.unwrap();
        storage.add_correlation(&corr(1, 1)).await.unwrap();
        storage.add_correlation(&corr(2, 2)).await.unwrap();

        assert_eq!(storage.get_link_by_peer(PeerId(10)).await.unwrap(), Some(link.clone()));
        assert_eq!(
            storage.get_link_by_channel(ChannelId(-500)).await.unwrap(),
            Some(link)
        );

        assert!(storage.delete_link(PeerId(10)).await.unwrap());
        assert_eq!(storage.count_correlations(PeerId(10)).await.unwrap(), 0);

        storage.close().await.unwrap();
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let storage = SqliteStorage::new(make_config(&path, 10));
            storage.initialize().await.unwrap();
            storage.add_correlation(&corr(5, 6)).await.unwrap();
            storage.shutdown().await.unwrap();
        }
        let storage = SqliteStorage::new(make_config(&path, 10));
        storage.initialize().await.unwrap();
        let row = storage
            .get_correlation_by_source(SourceMessageId(5))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.destination_message_id, DestinationMessageId(6));
    }
}
