// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat link operations.

use rusqlite::{OptionalExtension, params};
use vktg_core::{ChannelId, ChatLink, PeerId, RelayError};

use crate::database::{Database, map_tr_err};

fn row_to_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatLink> {
    Ok(ChatLink {
        source_peer_id: PeerId(row.get(0)?),
        display_name: row.get(1)?,
        destination_channel_id: ChannelId(row.get(2)?),
    })
}

/// Insert or replace the link for a peer.
///
/// Any other peer linked to the same channel is unlinked first; the
/// cascade trigger drops that peer's correlations in the same transaction.
pub async fn upsert_link(db: &Database, link: &ChatLink) -> Result<(), RelayError> {
    let link = link.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM peer_links
                 WHERE destination_channel_id = ?1 AND source_peer_id != ?2",
                params![link.destination_channel_id.0, link.source_peer_id.0],
            )?;
            tx.execute(
                "INSERT INTO peer_links (source_peer_id, display_name, destination_channel_id)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(source_peer_id) DO UPDATE SET
                     display_name = excluded.display_name,
                     destination_channel_id = excluded.destination_channel_id,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![
                    link.source_peer_id.0,
                    link.display_name,
                    link.destination_channel_id.0
                ],
            )?;
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_link_by_peer(db: &Database, peer: PeerId) -> Result<Option<ChatLink>, RelayError> {
    db.connection()
        .call(move |conn| -> Result<Option<ChatLink>, rusqlite::Error> {
            conn.query_row(
                "SELECT source_peer_id, display_name, destination_channel_id
                 FROM peer_links WHERE source_peer_id = ?1",
                params![peer.0],
                row_to_link,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_link_by_channel(
    db: &Database,
    channel: ChannelId,
) -> Result<Option<ChatLink>, RelayError> {
    db.connection()
        .call(move |conn| -> Result<Option<ChatLink>, rusqlite::Error> {
            conn.query_row(
                "SELECT source_peer_id, display_name, destination_channel_id
                 FROM peer_links WHERE destination_channel_id = ?1",
                params![channel.0],
                row_to_link,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_links(db: &Database) -> Result<Vec<ChatLink>, RelayError> {
    db.connection()
        .call(|conn| -> Result<Vec<ChatLink>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT source_peer_id, display_name, destination_channel_id
                 FROM peer_links ORDER BY display_name, source_peer_id",
            )?;
            let rows = stmt.query_map([], row_to_link)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a link. Its correlations go with it via the cascade trigger.
pub async fn delete_link(db: &Database, peer: PeerId) -> Result<bool, RelayError> {
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let deleted = conn.execute(
                "DELETE FROM peer_links WHERE source_peer_id = ?1",
                params![peer.0],
            )?;
            Ok(deleted > 0)
        })
        .await
        .map_err(map_tr_err)
}
