// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The vktg relay pipeline.
//!
//! Inbound: [`PollLoop`] drives the long-poll session and hands classified
//! updates to [`Relay`], which runs them through the [`Normalizer`], the
//! [`ThreadResolver`] and the [`Forwarder`]. Outbound: [`OutboundRelay`]
//! sends operator replies back to VK, and [`CommandHandler`] serves the
//! operator commands.

pub mod commands;
pub mod forwarder;
pub mod listing;
pub mod normalizer;
pub mod outbound;
pub mod poller;
pub mod read_receipts;
pub mod recording;
pub mod relay;
pub mod resolver;
pub mod text;

pub use commands::{Command, CommandHandler};
pub use forwarder::{Forwarder, Route};
pub use normalizer::{Normalizer, resolve_sender};
pub use outbound::OutboundRelay;
pub use poller::{BackoffPolicy, LoopState, PollLoop, UpdateSink};
pub use read_receipts::ReadReceipts;
pub use relay::Relay;
pub use resolver::ThreadResolver;
