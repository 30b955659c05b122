// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the vktg relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level vktg configuration.
///
/// All sections are optional and default to sensible values. Credentials
/// are only required by `serve`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VktgConfig {
    /// Process-wide relay behavior.
    #[serde(default)]
    pub relay: RelayConfig,

    /// Source network (VK) API settings.
    #[serde(default)]
    pub vk: VkConfig,

    /// Destination network (Telegram) bot settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// ID-mapping store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Poll loop backoff intervals.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Relay behavior settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Default `tracing` level for the `vktg` target when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Hard ceiling for one chunk of a paginated listing.
    #[serde(default = "default_listing_chunk_chars")]
    pub listing_chunk_chars: usize,

    /// Pause between listing chunks, in milliseconds.
    #[serde(default = "default_listing_chunk_delay_ms")]
    pub listing_chunk_delay_ms: u64,

    /// Lifetime of the transient "Message sent." notice.
    #[serde(default = "default_sent_notice_ttl_secs")]
    pub sent_notice_ttl_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            listing_chunk_chars: default_listing_chunk_chars(),
            listing_chunk_delay_ms: default_listing_chunk_delay_ms(),
            sent_notice_ttl_secs: default_sent_notice_ttl_secs(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_listing_chunk_chars() -> usize {
    4096
}

fn default_listing_chunk_delay_ms() -> u64 {
    1000
}

fn default_sent_notice_ttl_secs() -> u64 {
    2
}

/// VK API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VkConfig {
    /// User access token, or the full OAuth redirect URL carrying it.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Base URL for API methods.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// `lp_version` passed to `messages.getLongPollServer`.
    #[serde(default = "default_lp_version")]
    pub lp_version: u32,

    /// `mode` bitmask for `a_check` requests.
    #[serde(default = "default_long_poll_mode")]
    pub long_poll_mode: u32,

    /// `version` for `a_check` requests.
    #[serde(default = "default_long_poll_version")]
    pub long_poll_version: u32,

    /// Server-side hold for one long-poll request.
    #[serde(default = "default_long_poll_wait_secs")]
    pub long_poll_wait_secs: u64,

    /// HTTP client timeout. Must exceed the long-poll wait.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for VkConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            api_base_url: default_api_base_url(),
            api_version: default_api_version(),
            lp_version: default_lp_version(),
            long_poll_mode: default_long_poll_mode(),
            long_poll_version: default_long_poll_version(),
            long_poll_wait_secs: default_long_poll_wait_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl VkConfig {
    /// The bare access token, extracted from an OAuth redirect URL if needed.
    pub fn resolved_access_token(&self) -> Option<String> {
        let raw = self.access_token.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if !raw.contains("://") {
            return Some(raw.to_string());
        }
        let fragment = raw.split_once('#').map(|(_, f)| f)?;
        fragment
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(k, _)| *k == "access_token")
            .map(|(_, v)| v.to_string())
            .filter(|v| !v.is_empty())
    }
}

fn default_api_base_url() -> String {
    "https://api.vk.com/method".to_string()
}

fn default_api_version() -> String {
    "5.199".to_string()
}

fn default_lp_version() -> u32 {
    3
}

fn default_long_poll_mode() -> u32 {
    2
}

fn default_long_poll_version() -> u32 {
    2
}

fn default_long_poll_wait_secs() -> u64 {
    25
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// How "messages were read" events are shown in linked channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadNotificationMode {
    /// Log only.
    Off,
    /// One silent notice per peer, replacing the previous one.
    #[default]
    Notice,
    /// A reaction on the specific message that was read.
    Reaction,
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Telegram Bot API token.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Operator control chat. Unlinked peers are relayed here.
    #[serde(default)]
    pub control_chat_id: Option<i64>,

    /// Additional Telegram user IDs or usernames allowed to command the bot.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    #[serde(default)]
    pub read_notification_mode: ReadNotificationMode,

    /// Timeout for a single Bot API request.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            control_chat_id: None,
            allowed_users: Vec::new(),
            read_notification_mode: ReadNotificationMode::default(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_send_timeout_secs() -> u64 {
    120
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Correlations kept per peer before the oldest are evicted.
    #[serde(default = "default_max_correlations_per_peer")]
    pub max_correlations_per_peer: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            max_correlations_per_peer: default_max_correlations_per_peer(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("vktg").join("vktg.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("vktg.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_max_correlations_per_peer() -> u32 {
    1000
}

/// Backoff intervals, one per failure class.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// After transport failures and non-200 responses.
    #[serde(default = "default_connection_interval_secs")]
    pub connection_interval_secs: u64,

    /// After structured API errors (also reported to the operator).
    #[serde(default = "default_protocol_interval_secs")]
    pub protocol_interval_secs: u64,

    /// After anything else.
    #[serde(default = "default_generic_interval_secs")]
    pub generic_interval_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            connection_interval_secs: default_connection_interval_secs(),
            protocol_interval_secs: default_protocol_interval_secs(),
            generic_interval_secs: default_generic_interval_secs(),
        }
    }
}

fn default_connection_interval_secs() -> u64 {
    30
}

fn default_protocol_interval_secs() -> u64 {
    60
}

fn default_generic_interval_secs() -> u64 {
    60
}
