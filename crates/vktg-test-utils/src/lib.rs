// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for vktg integration tests.
//!
//! Provides mock adapters and a temp-storage harness for fast,
//! deterministic tests without network access.
//!
//! # Components
//!
//! - [`MockVkApi`] - Scripted VK API with call capture
//! - [`MockDestination`] - Destination adapter and notifier that records every send
//! - [`TestHarness`] - Temp SQLite store plus both mocks

pub mod fixtures;
pub mod harness;
pub mod mock_destination;
pub mod mock_vk;

pub use harness::{CONTROL_CHANNEL, TestHarness};
pub use mock_destination::{MockDestination, Sent};
pub use mock_vk::{MockVkApi, StubFrameRenderer};
