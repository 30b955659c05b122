// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! VK source adapter for the vktg relay.
//!
//! Provides the form-encoded API client ([`VkClient`]), the long-poll
//! [`SessionManager`], the raw update [`classify`] boundary and the default
//! video frame renderer.

pub mod classify;
pub mod client;
pub mod envelope;
pub mod render;
pub mod session;
pub mod types;

pub use classify::{MessageExtras, NewMessage, UpdateEvent, classify};
pub use client::{OutgoingMessage, VkApi, VkClient};
pub use envelope::check_envelope;
pub use render::FetchFrameRenderer;
pub use session::{PollSession, SessionManager};
pub use types::{
    Attachment, Cursor, Friend, Group, ImageVariant, LongPollResponse, LongPollServer, Photo,
    Sticker, User, Video, VkMessage, WallPost, largest_variant,
};
