// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Video preview frame rendering.

use async_trait::async_trait;

use crate::error::RelayError;

/// Turns a video thumbnail URL into displayable image bytes.
///
/// The default implementation composites a centered play glyph onto the
/// frame.
#[async_trait]
pub trait FrameRenderer: Send + Sync {
    async fn render(&self, frame_url: &str) -> Result<Vec<u8>, RelayError>;
}
