// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-limited delivery of long listings.

use std::time::Duration;

use vktg_core::{ChannelId, DestinationAdapter, RelayError};

use crate::text::split_message;

/// Packs HTML lines into chunks of at most `limit` visible characters, one
/// line per row.
pub fn paginate(lines: &[String], limit: usize) -> Vec<String> {
    if lines.is_empty() {
        return Vec::new();
    }
    split_message(&lines.join("\n"), limit)
        .into_iter()
        .filter(|chunk| !chunk.is_empty())
        .collect()
}

/// Sends `chunks` in order with `delay` between consecutive sends.
pub async fn send_paginated(
    destination: &dyn DestinationAdapter,
    channel: ChannelId,
    chunks: &[String],
    delay: Duration,
) -> Result<(), RelayError> {
    for (index, chunk) in chunks.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(delay).await;
        }
        destination.send_text(channel, chunk, None).await?;
    }
    Ok(())
}
