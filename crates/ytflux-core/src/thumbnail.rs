//! Thumbnail fetching and cover art preparation.
//!
//! Thumbnails arrive in whatever format the platform serves (JPEG, WebP,
//! sometimes PNG). Embedded cover art is always re-encoded to a single
//! configured [`CoverFormat`] so every managed file carries the same kind of
//! picture.

use std::fmt;
use std::io::Cursor;
use std::time::Duration;

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result, TagError};

/// Default timeout for thumbnail fetch requests.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Image format embedded cover art is converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CoverFormat {
    /// Baseline JPEG.
    #[default]
    Jpeg,
    /// Lossless PNG.
    Png,
}

impl CoverFormat {
    const fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}

impl fmt::Display for CoverFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
        }
    }
}

/// Fetch thumbnail data from a URL.
///
/// # Errors
///
/// Returns a network error if the request fails or the body is empty.
pub fn fetch_thumbnail_data(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::network_error(format!("Failed to create HTTP client: {e}")))?;

    let response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| Error::network_error(format!("Failed to fetch thumbnail: {e}")))?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.starts_with("image/") {
        warn!("Unexpected content type for thumbnail: {}", content_type);
    }

    let data = response
        .bytes()
        .map_err(|e| Error::network_error(format!("Failed to read thumbnail data: {e}")))?;

    if data.is_empty() {
        return Err(Error::network_error("Empty thumbnail data"));
    }

    debug!("Fetched thumbnail from {} ({} bytes)", url, data.len());
    Ok(data.to_vec())
}

/// High-quality thumbnail URL for a video ID.
///
/// Used when the video details do not advertise a thumbnail.
#[must_use]
pub fn youtube_thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/hqdefault.jpg")
}

/// Decode a thumbnail in any supported format and re-encode it as `format`.
///
/// Alpha is dropped; cover art is always opaque RGB.
pub fn transcode_cover(data: &[u8], format: CoverFormat) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(data)
        .map_err(|e| TagError::CoverArt(format!("Failed to decode thumbnail: {e}")))?;

    let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, format.image_format())
        .map_err(|e| TagError::CoverArt(format!("Failed to encode {format} cover: {e}")))?;

    debug!(
        "Transcoded cover art {}x{} to {} ({} bytes)",
        rgb.width(),
        rgb.height(),
        format,
        out.get_ref().len()
    );
    Ok(out.into_inner())
}
