// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::VktgConfig;

/// Longest hold the long-poll server accepts.
const MAX_LONG_POLL_WAIT_SECS: u64 = 90;

/// Destination message size ceiling.
const MAX_CHUNK_CHARS: usize = 4096;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &VktgConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.storage.max_correlations_per_peer == 0 {
        fail("storage.max_correlations_per_peer must be at least 1".to_string());
    }

    let wait = config.vk.long_poll_wait_secs;
    if !(1..=MAX_LONG_POLL_WAIT_SECS).contains(&wait) {
        fail(format!(
            "vk.long_poll_wait_secs must be between 1 and {MAX_LONG_POLL_WAIT_SECS}, got {wait}"
        ));
    }

    if config.vk.request_timeout_secs <= wait {
        fail(format!(
            "vk.request_timeout_secs ({}) must be greater than vk.long_poll_wait_secs ({wait})",
            config.vk.request_timeout_secs
        ));
    }

    if config.vk.api_base_url.trim().is_empty() {
        fail("vk.api_base_url must not be empty".to_string());
    }

    if let Some(token) = &config.vk.access_token
        && token.trim().is_empty()
    {
        fail("vk.access_token must not be empty when set".to_string());
    }

    if let Some(token) = &config.telegram.bot_token
        && token.trim().is_empty()
    {
        fail("telegram.bot_token must not be empty when set".to_string());
    }

    let chunk = config.relay.listing_chunk_chars;
    if !(1..=MAX_CHUNK_CHARS).contains(&chunk) {
        fail(format!(
            "relay.listing_chunk_chars must be between 1 and {MAX_CHUNK_CHARS}, got {chunk}"
        ));
    }

    for (key, value) in [
        ("retry.connection_interval_secs", config.retry.connection_interval_secs),
        ("retry.protocol_interval_secs", config.retry.protocol_interval_secs),
        ("retry.generic_interval_secs", config.retry.generic_interval_secs),
    ] {
        if value == 0 {
            fail(format!("{key} must be positive"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks the credentials and ids `serve` cannot run without.
pub fn validate_for_serve(config: &VktgConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.vk.resolved_access_token().is_none() {
        errors.push(ConfigError::MissingKey {
            key: "vk.access_token".to_string(),
        });
    }
    if config.telegram.bot_token.is_none() {
        errors.push(ConfigError::MissingKey {
            key: "telegram.bot_token".to_string(),
        });
    }
    if config.telegram.control_chat_id.is_none() {
        errors.push(ConfigError::MissingKey {
            key: "telegram.control_chat_id".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
