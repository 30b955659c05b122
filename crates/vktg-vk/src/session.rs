// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-poll session lifecycle.

use std::sync::Arc;

use tracing::{debug, info};
use vktg_core::RelayError;

use crate::client::VkApi;
use crate::types::Cursor;

/// A live long-poll subscription. Process-local, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSession {
    /// Full `a_check` URL.
    pub endpoint: String,
    pub key: String,
    pub cursor: Cursor,
    expired: bool,
}

impl PollSession {
    pub fn new(endpoint: impl Into<String>, key: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            endpoint: endpoint.into(),
            key: key.into(),
            cursor,
            expired: false,
        }
    }

    /// Stores the cursor returned by a successful poll.
    pub fn advance(&mut self, cursor: Cursor) {
        self.cursor = cursor;
    }

    /// Marks the session stale so the next iteration re-acquires.
    pub fn invalidate(&mut self) {
        self.expired = true;
    }

    pub fn is_expired(&self) -> bool {
        self.expired
    }
}

/// Acquires fresh sessions from `messages.getLongPollServer`.
///
/// Retries belong to the poll loop; every session returned here carries a
/// non-empty key, endpoint and cursor.
pub struct SessionManager {
    api: Arc<dyn VkApi>,
}

impl SessionManager {
    pub fn new(api: Arc<dyn VkApi>) -> Self {
        Self { api }
    }

    pub async fn acquire_session(&self) -> Result<PollSession, RelayError> {
        debug!("requesting long-poll server");
        let server = self.api.get_long_poll_server().await?;

        if server.key.is_empty() || server.server.is_empty() || server.ts.is_empty() {
            return Err(RelayError::EmptyResponse {
                method: "messages.getLongPollServer".into(),
            });
        }

        let session = PollSession::new(endpoint_url(&server.server), server.key, server.ts);
        info!(endpoint = %session.endpoint, "long-poll session acquired");
        Ok(session)
    }

    pub fn is_live(&self, session: &PollSession) -> bool {
        !session.is_expired() && !session.cursor.is_empty() && !session.key.is_empty()
    }
}

/// VK returns the server without a scheme; absolute URLs are kept as-is.
fn endpoint_url(server: &str) -> String {
    if server.starts_with("https://") || server.starts_with("http://") {
        server.to_string()
    } else {
        format!("https://{server}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_gets_https_scheme() {
        assert_eq!(
            endpoint_url("lp.vk.com/wh123"),
            "https://lp.vk.com/wh123"
        );
        assert_eq!(endpoint_url("http://127.0.0.1:9/lp"), "http://127.0.0.1:9/lp");
    }

    #[test]
    fn advance_replaces_cursor_and_invalidate_expires() {
        let mut session = PollSession::new("https://lp", "k", Cursor::new("1"));
        session.advance(Cursor::new("2"));
        assert_eq!(session.cursor.as_str(), "2");
        assert!(!session.is_expired());
        session.invalidate();
        assert!(session.is_expired());
    }
}
