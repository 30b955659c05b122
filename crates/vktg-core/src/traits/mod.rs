// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits injected into the relay components.
//!
//! Adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod destination;
pub mod notifier;
pub mod renderer;
pub mod storage;

pub use adapter::PluginAdapter;
pub use destination::DestinationAdapter;
pub use notifier::Notifier;
pub use renderer::FrameRenderer;
pub use storage::StorageAdapter;
