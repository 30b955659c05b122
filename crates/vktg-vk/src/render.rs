// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Default video preview renderer.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use tracing::debug;
use vktg_core::{FrameRenderer, RelayError};

/// Badge radius as a fraction of the frame's shorter side.
const BADGE_SCALE: f32 = 0.2;

/// Opacity of the dark disc behind the triangle.
const BADGE_ALPHA: f32 = 0.55;

/// Downloads the thumbnail frame and stamps a play badge on it.
#[derive(Debug, Clone)]
pub struct FetchFrameRenderer {
    client: reqwest::Client,
}

impl FetchFrameRenderer {
    pub fn new(timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Connectivity {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { client })
    }

    async fn fetch(&self, frame_url: &str) -> Result<Vec<u8>, RelayError> {
        let response = self
            .client
            .get(frame_url)
            .send()
            .await
            .map_err(|e| RelayError::Connectivity {
                message: format!("frame download failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Connectivity {
                message: format!("frame download returned HTTP {status}"),
                source: None,
            });
        }

        let bytes = response.bytes().await.map_err(|e| RelayError::Connectivity {
            message: format!("frame download interrupted: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl FrameRenderer for FetchFrameRenderer {
    async fn render(&self, frame_url: &str) -> Result<Vec<u8>, RelayError> {
        let frame = self.fetch(frame_url).await?;
        let rendered = overlay_play(&frame)?;
        debug!(
            url = frame_url,
            fetched = frame.len(),
            rendered = rendered.len(),
            "video frame rendered"
        );
        Ok(rendered)
    }
}

/// Composites a centered play badge onto an encoded image and returns
/// it as JPEG. The badge is a translucent dark disc holding a white
/// right-pointing triangle.
pub fn overlay_play(frame: &[u8]) -> Result<Vec<u8>, RelayError> {
    let mut img = image::load_from_memory(frame)
        .map_err(|e| RelayError::Decode(format!("video frame is not an image: {e}")))?
        .to_rgb8();

    let (width, height) = img.dimensions();
    let radius = (width.min(height) as f32 * BADGE_SCALE).max(1.0);
    let center = (width as f32 / 2.0, height as f32 / 2.0);
    let triangle = [
        (center.0 - radius * 0.35, center.1 - radius * 0.5),
        (center.0 + radius * 0.55, center.1),
        (center.0 - radius * 0.35, center.1 + radius * 0.5),
    ];

    let x_range = span(center.0, radius, width);
    let y_range = span(center.1, radius, height);
    for y in y_range {
        for x in x_range.clone() {
            let p = (x as f32 + 0.5, y as f32 + 0.5);
            let (dx, dy) = (p.0 - center.0, p.1 - center.1);
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let pixel = img.get_pixel_mut(x, y);
            if inside(p, &triangle) {
                *pixel = Rgb([255, 255, 255]);
            } else {
                darken(pixel);
            }
        }
    }

    encode_jpeg(img)
}

fn span(center: f32, radius: f32, len: u32) -> std::ops::Range<u32> {
    let start = (center - radius).floor().max(0.0) as u32;
    let end = ((center + radius).ceil() as u32).min(len);
    start..end
}

fn darken(pixel: &mut Rgb<u8>) {
    for channel in pixel.0.iter_mut() {
        *channel = (f32::from(*channel) * (1.0 - BADGE_ALPHA)).round() as u8;
    }
}

fn edge(a: (f32, f32), b: (f32, f32), p: (f32, f32)) -> f32 {
    (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0)
}

fn inside(p: (f32, f32), [a, b, c]: &[(f32, f32); 3]) -> bool {
    let d = [edge(*a, *b, p), edge(*b, *c, p), edge(*c, *a, p)];
    let negative = d.iter().any(|v| *v < 0.0);
    let positive = d.iter().any(|v| *v > 0.0);
    !(negative && positive)
}

fn encode_jpeg(img: RgbImage) -> Result<Vec<u8>, RelayError> {
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Jpeg)
        .map_err(|e| RelayError::Internal(format!("cannot encode video frame: {e}")))?;
    Ok(out.into_inner())
}
