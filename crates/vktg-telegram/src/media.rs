// SPDX-FileCopyrightText: 2026 VKTG Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! File transfer between the relay and Telegram.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileMeta, InputFile, PhotoSize};
use tracing::debug;
use vktg_core::{MediaSource, RelayError};

/// Longest side of an uploaded sticker.
const STICKER_SIDE: u32 = 512;

/// Chat photos are uploaded as squares of this size.
const CHAT_PHOTO_SIDE: u32 = 400;

/// Resolves the file path with `getFile` and downloads its bytes.
pub async fn download_file(bot: &Bot, file_meta: &FileMeta) -> Result<Vec<u8>, RelayError> {
    let file = bot
        .get_file(file_meta.id.clone())
        .await
        .map_err(|e| RelayError::channel(format!("failed to get file info: {e}"), e))?;

    let mut buf = Vec::new();
    bot.download_file(&file.path, &mut buf)
        .await
        .map_err(|e| RelayError::channel(format!("failed to download file: {e}"), e))?;

    debug!(file_id = %file_meta.id, size = buf.len(), "downloaded file from Telegram");
    Ok(buf)
}

/// Downloads the largest photo variant (Telegram lists them ascending).
pub async fn download_largest_photo(
    bot: &Bot,
    photos: &[PhotoSize],
) -> Result<Vec<u8>, RelayError> {
    let largest = photos.last().ok_or_else(|| RelayError::Channel {
        message: "photo array is empty".into(),
        source: None,
    })?;
    download_file(bot, &largest.file).await
}

/// Converts a media item into an upload Telegram accepts.
pub fn input_file(media: MediaSource) -> Result<InputFile, RelayError> {
    match media {
        MediaSource::Url(url) => url_file(&url),
        MediaSource::Bytes(bytes) => Ok(InputFile::memory(bytes).file_name("frame.jpg")),
    }
}

/// Telegram fetches URL inputs itself.
fn url_file(url: &str) -> Result<InputFile, RelayError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| RelayError::channel(format!("invalid media url {url}"), e))?;
    Ok(InputFile::url(parsed))
}

/// Downloads a file that Telegram cannot fetch by URL in its current form.
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, RelayError> {
    let connectivity = |message: String, source: Option<reqwest::Error>| RelayError::Connectivity {
        message,
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    };

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| connectivity(format!("download of {url} failed: {e}"), Some(e)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(connectivity(format!("download of {url} returned HTTP {status}"), None));
    }
    let bytes = response
        .bytes()
        .await
        .map_err(|e| connectivity(format!("download of {url} interrupted: {e}"), Some(e)))?;
    debug!(url, size = bytes.len(), "media downloaded");
    Ok(bytes.to_vec())
}

/// Re-encodes a static image as a WEBP sticker of at most 512px per side.
pub fn sticker_webp(bytes: &[u8]) -> Result<Vec<u8>, RelayError> {
    let mut img = decode(bytes, "sticker")?;
    if img.width() > STICKER_SIDE || img.height() > STICKER_SIDE {
        img = img.resize(STICKER_SIDE, STICKER_SIDE, FilterType::Lanczos3);
    }
    encode(&DynamicImage::ImageRgba8(img.to_rgba8()), ImageFormat::WebP)
}

/// Scales an avatar to the square JPEG used as a chat photo.
pub fn chat_photo_jpeg(bytes: &[u8]) -> Result<Vec<u8>, RelayError> {
    let img = decode(bytes, "avatar")?.resize_exact(
        CHAT_PHOTO_SIDE,
        CHAT_PHOTO_SIDE,
        FilterType::Lanczos3,
    );
    encode(&DynamicImage::ImageRgb8(img.to_rgb8()), ImageFormat::Jpeg)
}

fn decode(bytes: &[u8], what: &str) -> Result<DynamicImage, RelayError> {
    image::load_from_memory(bytes)
        .map_err(|e| RelayError::Decode(format!("{what} is not an image: {e}")))
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, RelayError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format)
        .map_err(|e| RelayError::Internal(format!("cannot encode {format:?}: {e}")))?;
    Ok(out.into_inner())
}
