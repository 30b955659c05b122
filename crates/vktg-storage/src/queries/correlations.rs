// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message correlation operations with FIFO retention per peer.

use rusqlite::{OptionalExtension, params};
use vktg_core::{
    ChannelId, DestinationMessageId, MessageCorrelation, NewCorrelation, PeerId, RelayError,
    SourceMessageId,
};

use crate::database::{Database, map_tr_err};

const COLUMNS: &str = "id, source_peer_id, source_message_id, destination_channel_id, \
                       destination_message_id, created_at";

fn row_to_correlation(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageCorrelation> {
    Ok(MessageCorrelation {
        id: row.get(0)?,
        source_peer_id: PeerId(row.get(1)?),
        source_message_id: SourceMessageId(row.get(2)?),
        destination_channel_id: ChannelId(row.get(3)?),
        destination_message_id: DestinationMessageId(row.get(4)?),
        created_at: row.get(5)?,
    })
}

/// Insert a correlation and evict the peer's oldest rows beyond `retention`.
///
/// Recency is insertion order only; reads never refresh a row.
pub async fn add_correlation(
    db: &Database,
    correlation: &NewCorrelation,
    retention: u32,
) -> Result<i64, RelayError> {
    let c = *correlation;
    db.connection()
        .call(move |conn| -> Result<i64, rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO message_correlations
                     (source_peer_id, source_message_id, destination_channel_id, destination_message_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    c.source_peer_id.0,
                    c.source_message_id.0,
                    c.destination_channel_id.0,
                    c.destination_message_id.0
                ],
            )?;
            let id = tx.last_insert_rowid();
            let evicted = tx.execute(
                "DELETE FROM message_correlations
                 WHERE source_peer_id = ?1 AND id NOT IN (
                     SELECT id FROM message_correlations
                     WHERE source_peer_id = ?1
                     ORDER BY id DESC
                     LIMIT ?2
                 )",
                params![c.source_peer_id.0, retention],
            )?;
            tx.commit()?;
            if evicted > 0 {
                tracing::trace!(peer_id = c.source_peer_id.0, evicted, "evicted correlations");
            }
            Ok(id)
        })
        .await
        .map_err(map_tr_err)
}

/// The earliest surviving correlation for a source message.
///
/// A repost relayed as comment plus body yields two rows; the first one
/// is the thread anchor.
pub async fn get_by_source(
    db: &Database,
    source_message_id: SourceMessageId,
) -> Result<Option<MessageCorrelation>, RelayError> {
    db.connection()
        .call(move |conn| -> Result<Option<MessageCorrelation>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM message_correlations
                     WHERE source_message_id = ?1 ORDER BY id ASC LIMIT 1"
                ),
                params![source_message_id.0],
                row_to_correlation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_by_destination(
    db: &Database,
    channel: ChannelId,
    destination_message_id: DestinationMessageId,
) -> Result<Option<MessageCorrelation>, RelayError> {
    db.connection()
        .call(move |conn| -> Result<Option<MessageCorrelation>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM message_correlations
                     WHERE destination_channel_id = ?1 AND destination_message_id = ?2
                     ORDER BY id DESC LIMIT 1"
                ),
                params![channel.0, destination_message_id.0],
                row_to_correlation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_by_peer_and_destination(
    db: &Database,
    peer: PeerId,
    destination_message_id: DestinationMessageId,
) -> Result<Option<MessageCorrelation>, RelayError> {
    db.connection()
        .call(move |conn| -> Result<Option<MessageCorrelation>, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "SELECT {COLUMNS} FROM message_correlations
                     WHERE source_peer_id = ?1 AND destination_message_id = ?2
                     ORDER BY id DESC LIMIT 1"
                ),
                params![peer.0, destination_message_id.0],
                row_to_correlation,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn purge_for_peer(db: &Database, peer: PeerId) -> Result<u64, RelayError> {
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            let deleted = conn.execute(
                "DELETE FROM message_correlations WHERE source_peer_id = ?1",
                params![peer.0],
            )?;
            Ok(deleted as u64)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn count_for_peer(db: &Database, peer: PeerId) -> Result<u64, RelayError> {
    db.connection()
        .call(move |conn| -> Result<u64, rusqlite::Error> {
            conn.query_row(
                "SELECT COUNT(*) FROM message_correlations WHERE source_peer_id = ?1",
                params![peer.0],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n as u64)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::links;
    use vktg_core::ChatLink;

    fn corr(peer: i64, src: i64, dst: i32) -> NewCorrelation {
        NewCorrelation {
            source_peer_id: PeerId(peer),
            source_message_id: SourceMessageId(src),
            destination_channel_id: ChannelId(-500),
            destination_message_id: DestinationMessageId(dst),
        }
    }

    #[tokio::test]
    async fn lookups_find_inserted_row() {
        let db = Database::open_in_memory().await.unwrap();
        add_correlation(&db, &corr(10, 111, 7), 10).await.unwrap();

        let by_src = get_by_source(&db, SourceMessageId(111)).await.unwrap().unwrap();
        assert_eq!(by_src.destination_message_id, DestinationMessageId(7));
        let by_dst = get_by_destination(&db, ChannelId(-500), DestinationMessageId(7))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_dst.source_message_id, SourceMessageId(111));
        let by_peer = get_by_peer_and_destination(&db, PeerId(10), DestinationMessageId(7))
            .await
            .unwrap();
        assert_eq!(by_peer, Some(by_src));
    }

    #[tokio::test]
    async fn destination_lookup_is_scoped_to_channel() {
        let db = Database::open_in_memory().await.unwrap();
        add_correlation(&db, &corr(10, 111, 7), 10).await.unwrap();
        let other = get_by_destination(&db, ChannelId(-999), DestinationMessageId(7))
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn insertion_beyond_retention_evicts_oldest() {
        let db = Database::open_in_memory().await.unwrap();
        let k = 5;
        for i in 0..=k {
            add_correlation(&db, &corr(10, 100 + i as i64, i as i32), k)
                .await
                .unwrap();
        }

        assert_eq!(count_for_peer(&db, PeerId(10)).await.unwrap(), k as u64);
        assert!(get_by_source(&db, SourceMessageId(100)).await.unwrap().is_none());
        for i in 1..=k {
            assert!(
                get_by_source(&db, SourceMessageId(100 + i as i64))
                    .await
                    .unwrap()
                    .is_some()
            );
        }
    }

    #[tokio::test]
    async fn reads_do_not_refresh_recency() {
        let db = Database::open_in_memory().await.unwrap();
        add_correlation(&db, &corr(10, 1, 1), 2).await.unwrap();
        add_correlation(&db, &corr(10, 2, 2), 2).await.unwrap();
        // Touch the oldest, then overflow.
        get_by_source(&db, SourceMessageId(1)).await.unwrap();
        add_correlation(&db, &corr(10, 3, 3), 2).await.unwrap();
        assert!(get_by_source(&db, SourceMessageId(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retention_is_per_peer() {
        let db = Database::open_in_memory().await.unwrap();
        add_correlation(&db, &corr(10, 1, 1), 1).await.unwrap();
        add_correlation(&db, &corr(20, 2, 2), 1).await.unwrap();
        add_correlation(&db, &corr(20, 3, 3), 1).await.unwrap();
        assert_eq!(count_for_peer(&db, PeerId(10)).await.unwrap(), 1);
        assert_eq!(count_for_peer(&db, PeerId(20)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn source_lookup_returns_earliest_row() {
        let db = Database::open_in_memory().await.unwrap();
        add_correlation(&db, &corr(10, 50, 8), 10).await.unwrap();
        add_correlation(&db, &corr(10, 50, 9), 10).await.unwrap();
        let anchor = get_by_source(&db, SourceMessageId(50)).await.unwrap().unwrap();
        assert_eq!(anchor.destination_message_id, DestinationMessageId(8));
    }

    #[tokio::test]
    async fn deleting_link_cascades_to_correlations() {
        let db = Database::open_in_memory().await.unwrap();
        let link = ChatLink {
            source_peer_id: PeerId(10),
            display_name: "Anna".into(),
            destination_channel_id: ChannelId(-500),
        };
        links::upsert_link(&db, &link).await.unwrap();
        add_correlation(&db, &corr(10, 1, 1), 10).await.unwrap();
        add_correlation(&db, &corr(20, 2, 2), 10).await.unwrap();

        links::delete_link(&db, PeerId(10)).await.unwrap();
        assert_eq!(count_for_peer(&db, PeerId(10)).await.unwrap(), 0);
        assert_eq!(count_for_peer(&db, PeerId(20)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn purge_keeps_link() {
        let db = Database::open_in_memory().await.unwrap();
        let link = ChatLink {
            source_peer_id: PeerId(10),
            display_name: "Anna".into(),
            destination_channel_id: ChannelId(-500),
        };
        links::upsert_link(&db, &link).await.unwrap();
        add_correlation(&db, &corr(10, 1, 1), 10).await.unwrap();
        assert_eq!(purge_for_peer(&db, PeerId(10)).await.unwrap(), 1);
        assert!(links::get_link_by_peer(&db, PeerId(10)).await.unwrap().is_some());
    }
}
