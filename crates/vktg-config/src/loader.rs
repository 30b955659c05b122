// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./vktg.toml` > `~/.config/vktg/vktg.toml` > `/etc/vktg/vktg.toml`
//! with environment variable overrides via `VKTG_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::VktgConfig;

/// Top-level sections, used to turn `VKTG_<SECTION>_<KEY>` into `section.key`.
const SECTIONS: &[&str] = &["relay", "vk", "telegram", "storage", "retry"];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/vktg/vktg.toml` (system-wide)
/// 3. `~/.config/vktg/vktg.toml` (user XDG config)
/// 4. `./vktg.toml` (local directory)
/// 5. `VKTG_*` environment variables
pub fn load_config() -> Result<VktgConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<VktgConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VktgConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<VktgConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(VktgConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(VktgConfig::default()))
        .merge(Toml::file("/etc/vktg/vktg.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("vktg/vktg.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("vktg.toml"))
        .merge(env_provider())
}

/// Only the first underscore after the section name becomes a dot, so
/// `VKTG_TELEGRAM_BOT_TOKEN` maps to `telegram.bot_token`.
fn env_provider() -> Env {
    Env::prefixed("VKTG_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
