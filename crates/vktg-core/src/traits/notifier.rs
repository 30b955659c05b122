// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator notification capability.

use async_trait::async_trait;

use crate::error::RelayError;

/// Delivers plain-text notices to the operator's control channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, text: &str) -> Result<(), RelayError>;
}
