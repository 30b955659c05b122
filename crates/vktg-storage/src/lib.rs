// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite ID-mapping store for the vktg relay.
//!
//! Holds chat links and the bounded message correlation history. All
//! writes are serialized through `tokio-rusqlite`'s single background
//! thread, so every query function is atomic with respect to the others.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
