//! Remote playlist source backed by `YouTube`.
//!
//! The [`PlaylistSource`] trait is the engine's only view of the platform:
//! the ordered ids of a playlist, per-video availability and details, the
//! audio stream and the thumbnail. [`YouTubeSource`] implements it in pure
//! Rust:
//!
//! - playlist pages are scraped from the embedded `ytInitialData` JSON, and
//!   continuation pages are followed through the innertube browse endpoint
//! - video details, availability and audio streams go through `rusty_ytdl`
//! - thumbnails are fetched with a plain blocking HTTP client
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ytflux_core::youtube::{PlaylistSource, YouTubeSource};
//!
//! let source = YouTubeSource::new().unwrap();
//! let playlist = source.playlist("PLw-VjHDlEOgvtnnnqWlTqByAtC7tXBg6D").unwrap();
//! println!("{} has {} videos", playlist.title, playlist.video_ids.len());
//! ```

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use rusty_ytdl::{Video, VideoError, VideoFormat, VideoOptions, VideoQuality, VideoSearchOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::entry::Availability;
use crate::error::{DownloadError, Error, FileSystemError, Result};
use crate::thumbnail::{DEFAULT_FETCH_TIMEOUT_SECS, fetch_thumbnail_data};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Innertube client version used when the page does not advertise one.
const FALLBACK_CLIENT_VERSION: &str = "2.20240101.00.00";

/// Upper bound on continuation requests for one playlist (100 videos each).
const MAX_CONTINUATION_PAGES: usize = 200;

/// Details of a single `YouTube` video, fetched on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDetails {
    /// Video ID.
    pub id: String,
    /// Video title.
    pub title: String,
    /// Channel/uploader name.
    pub author: Option<String>,
    /// Video description.
    pub description: Option<String>,
    /// Best thumbnail URL advertised for the video.
    pub thumbnail_url: Option<String>,
}

impl VideoDetails {
    /// Canonical watch URL of the video.
    #[must_use]
    pub fn watch_url(&self) -> String {
        watch_url(&self.id)
    }
}

/// Snapshot of a remote playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    /// Playlist ID.
    pub id: String,
    /// Playlist title.
    pub title: String,
    /// Video IDs in the order the platform lists them (newest first).
    pub video_ids: Vec<String>,
}

/// The remote platform as seen by the reconciliation engine.
#[cfg_attr(test, mockall::automock)]
pub trait PlaylistSource {
    /// Resolve a playlist and list its video IDs in platform order.
    fn playlist(&self, playlist_id: &str) -> Result<PlaylistInfo>;

    /// Live availability of a single video.
    fn availability(&self, video_id: &str) -> Result<Availability>;

    /// Title, author, description and thumbnail of a video.
    fn video_details(&self, video_id: &str) -> Result<VideoDetails>;

    /// Write the audio-only stream of a video to `destination`, replacing
    /// any existing file. Returns the number of bytes written.
    fn download_audio(&self, video_id: &str, destination: &Path) -> Result<u64>;

    /// Fetch thumbnail image bytes.
    fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>>;
}

/// Canonical watch URL for a video ID.
#[must_use]
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// Canonical playlist URL for a playlist ID.
#[must_use]
pub fn playlist_url(playlist_id: &str) -> String {
    format!("https://www.youtube.com/playlist?list={playlist_id}")
}

// ============================================================================
// URL validation
// ============================================================================

/// Result of `YouTube` URL validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeUrlValidation {
    /// Whether the URL is valid.
    pub is_valid: bool,
    /// The extracted playlist ID (if valid).
    pub playlist_id: Option<String>,
    /// The normalized/canonical URL.
    pub normalized_url: Option<String>,
    /// Error message if validation failed.
    pub error_message: Option<String>,
    /// The URL type detected.
    pub url_type: YouTubeUrlType,
}

/// Type of `YouTube` URL detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum YouTubeUrlType {
    /// Standard playlist URL (youtube.com/playlist?list=...)
    Playlist,
    /// Watch URL with playlist parameter (youtube.com/watch?v=...&list=...)
    WatchWithPlaylist,
    /// Single video URL without playlist
    SingleVideo,
    /// Short URL (youtu.be/...)
    ShortUrl,
    /// Invalid or unrecognized URL
    #[default]
    Invalid,
}

impl YouTubeUrlValidation {
    const fn valid(playlist_id: String, url_type: YouTubeUrlType, normalized_url: String) -> Self {
        Self {
            is_valid: true,
            playlist_id: Some(playlist_id),
            normalized_url: Some(normalized_url),
            error_message: None,
            url_type,
        }
    }

    const fn invalid(error_message: String, url_type: YouTubeUrlType) -> Self {
        Self {
            is_valid: false,
            playlist_id: None,
            normalized_url: None,
            error_message: Some(error_message),
            url_type,
        }
    }
}

/// Validate a `YouTube` URL and extract the playlist ID it refers to.
///
/// Accepts `youtube.com/playlist?list=`, watch URLs carrying a `list`
/// parameter and `youtu.be` short links with a `list` parameter, over
/// `http` or `https`.
///
/// ```rust
/// use ytflux_core::youtube::validate_youtube_url;
///
/// let result = validate_youtube_url("https://www.youtube.com/playlist?list=PLrAXtmErZgOei");
/// assert!(result.is_valid);
/// assert_eq!(result.playlist_id, Some("PLrAXtmErZgOei".to_string()));
///
/// let result = validate_youtube_url("https://example.com");
/// assert!(!result.is_valid);
/// ```
#[must_use]
pub fn validate_youtube_url(url: &str) -> YouTubeUrlValidation {
    let url = url.trim();

    if url.is_empty() {
        return YouTubeUrlValidation::invalid(
            "URL cannot be empty".to_string(),
            YouTubeUrlType::Invalid,
        );
    }

    let url_lower = url.to_lowercase();
    if !url_lower.starts_with("http://") && !url_lower.starts_with("https://") {
        return YouTubeUrlValidation::invalid(
            "URL must start with http:// or https://".to_string(),
            YouTubeUrlType::Invalid,
        );
    }

    let is_youtube_domain = url_lower.contains("youtube.com") || url_lower.contains("youtu.be");
    if !is_youtube_domain {
        return YouTubeUrlValidation::invalid(
            "URL must be a YouTube URL (youtube.com or youtu.be)".to_string(),
            YouTubeUrlType::Invalid,
        );
    }

    let url_type = detect_url_type(url);

    if let Some(playlist_id) = extract_list_parameter(url) {
        if let Err(validation_error) = validate_playlist_id_format(&playlist_id) {
            return YouTubeUrlValidation::invalid(validation_error, url_type);
        }
        let normalized = playlist_url(&playlist_id);
        YouTubeUrlValidation::valid(playlist_id, url_type, normalized)
    } else {
        let error_msg = match url_type {
            YouTubeUrlType::SingleVideo => {
                "URL is a single video, not a playlist. Use a playlist URL instead.".to_string()
            }
            YouTubeUrlType::ShortUrl => {
                "Short URL does not contain a playlist. Use a playlist URL instead.".to_string()
            }
            _ => "URL does not contain a valid playlist ID".to_string(),
        };
        YouTubeUrlValidation::invalid(error_msg, url_type)
    }
}

fn detect_url_type(url: &str) -> YouTubeUrlType {
    let url_lower = url.to_lowercase();

    if url_lower.contains("youtu.be/") {
        if url_lower.contains("list=") {
            YouTubeUrlType::WatchWithPlaylist
        } else {
            YouTubeUrlType::ShortUrl
        }
    } else if url_lower.contains("/playlist") {
        YouTubeUrlType::Playlist
    } else if url_lower.contains("/watch") {
        if url_lower.contains("list=") {
            YouTubeUrlType::WatchWithPlaylist
        } else {
            YouTubeUrlType::SingleVideo
        }
    } else {
        YouTubeUrlType::Invalid
    }
}

fn extract_list_parameter(url: &str) -> Option<String> {
    let url_lower = url.to_lowercase();
    let list_pos = url_lower.find("list=")?;
    let rest = &url[list_pos + 5..];

    // Until the next parameter or fragment
    let end = rest.find(['&', '#']).unwrap_or(rest.len());
    let playlist_id = rest[..end].trim();

    (!playlist_id.is_empty()).then(|| playlist_id.to_string())
}

/// Validate the shape of a playlist ID.
///
/// Playlist IDs are 2 to 64 characters of `[A-Za-z0-9_-]`. Known prefixes
/// are `PL` (user), `UU` (uploads), `LL`/`WL`/`FL` (special lists), `RD`
/// (mixes) and `OLAK5uy_` (albums); other alphanumeric IDs are accepted too.
pub fn validate_playlist_id_format(playlist_id: &str) -> std::result::Result<(), String> {
    if playlist_id.len() < 2 {
        return Err("Playlist ID is too short".to_string());
    }

    if playlist_id.len() > 64 {
        return Err("Playlist ID is too long".to_string());
    }

    if !playlist_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err("Playlist ID contains invalid characters".to_string());
    }

    let valid_prefixes = ["PL", "UU", "LL", "WL", "RD", "OLAK5uy_", "FL"];
    let has_valid_prefix = valid_prefixes
        .iter()
        .any(|prefix| playlist_id.starts_with(prefix));

    if !has_valid_prefix
        && !playlist_id
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
    {
        return Err("Playlist ID has an invalid format".to_string());
    }

    Ok(())
}

/// Extract the playlist ID from a `YouTube` playlist URL.
pub fn extract_playlist_id(url: &str) -> Result<String> {
    let validation = validate_youtube_url(url);

    match (validation.is_valid, validation.playlist_id) {
        (true, Some(id)) => Ok(id),
        _ => match validation.url_type {
            YouTubeUrlType::Invalid => Err(Error::Download(DownloadError::InvalidUrl {
                url: url.to_string(),
                reason: validation
                    .error_message
                    .unwrap_or_else(|| "Invalid URL".to_string()),
            })),
            _ => Err(Error::Download(DownloadError::NotAPlaylist {
                url: url.to_string(),
            })),
        },
    }
}

/// Turn user input into a playlist ID.
///
/// Accepts either a playlist URL or a bare playlist ID.
pub fn parse_playlist_reference(input: &str) -> Result<String> {
    let input = input.trim();
    let lower = input.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.contains("youtu") {
        let with_scheme = if lower.starts_with("http") {
            input.to_string()
        } else {
            format!("https://{input}")
        };
        return extract_playlist_id(&with_scheme);
    }

    validate_playlist_id_format(input).map_err(|reason| {
        Error::Download(DownloadError::InvalidUrl {
            url: input.to_string(),
            reason,
        })
    })?;
    Ok(input.to_string())
}

/// Longest sanitized name in UTF-8 bytes.
///
/// Leaves room for a sequence prefix, an extension and temp-file wrapping
/// under the 255-byte file name limit of common file systems.
pub const MAX_FILENAME_BYTES: usize = 200;

/// Sanitize a string for use as a filename.
///
/// Replaces reserved characters, trims whitespace and dots, and limits the
/// result to [`MAX_FILENAME_BYTES`] bytes without splitting a character.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let invalid_chars = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', '\0'];

    let sanitized: String = name
        .chars()
        .map(|c| {
            if invalid_chars.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = sanitized.trim().trim_matches('.');
    let mut end = trimmed.len().min(MAX_FILENAME_BYTES);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].trim_end().to_string()
}

// ============================================================================
// rusty_ytdl-backed source
// ============================================================================

/// Pure Rust `YouTube` source using `rusty_ytdl` and page scraping.
///
/// All calls block. The async `rusty_ytdl` API is driven on a private
/// current-thread runtime, so this type must not be used from inside another
/// tokio runtime.
pub struct YouTubeSource {
    runtime: tokio::runtime::Runtime,
    http: reqwest::blocking::Client,
    thumbnail_timeout: Duration,
}

impl YouTubeSource {
    /// Create a source with the default thumbnail timeout.
    pub fn new() -> Result<Self> {
        Self::with_thumbnail_timeout(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    /// Create a source with a custom thumbnail fetch timeout.
    pub fn with_thumbnail_timeout(thumbnail_timeout: Duration) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create tokio runtime: {e}")))?;

        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::network_error(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            runtime,
            http,
            thumbnail_timeout,
        })
    }

    fn parse_error(playlist_id: &str, reason: impl Into<String>) -> Error {
        Error::Download(DownloadError::PlaylistParseFailed {
            playlist_id: playlist_id.to_string(),
            reason: reason.into(),
        })
    }

    fn fetch_playlist_page(&self, playlist_id: &str) -> Result<String> {
        let url = playlist_url(playlist_id);
        info!("Fetching playlist page: {}", url);

        self.http
            .get(&url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| Self::parse_error(playlist_id, format!("Failed to fetch playlist page: {e}")))?
            .text()
            .map_err(|e| Self::parse_error(playlist_id, format!("Failed to read response: {e}")))
    }

    fn fetch_continuation(
        &self,
        playlist_id: &str,
        client_version: &str,
        token: &str,
    ) -> Result<serde_json::Value> {
        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": "WEB",
                    "clientVersion": client_version,
                    "hl": "en",
                }
            },
            "continuation": token,
        });

        let text = self
            .http
            .post("https://www.youtube.com/youtubei/v1/browse?prettyPrint=false")
            .header("Content-Type", "application/json")
            .body(serde_json::to_string(&body)?)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| Self::parse_error(playlist_id, format!("Continuation request failed: {e}")))?
            .text()
            .map_err(|e| Self::parse_error(playlist_id, format!("Failed to read continuation: {e}")))?;

        serde_json::from_str(&text)
            .map_err(|e| Self::parse_error(playlist_id, format!("Invalid continuation JSON: {e}")))
    }

    fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    async fn video_details_async(video_id: &str) -> Result<VideoDetails> {
        let video = Video::new(watch_url(video_id)).map_err(|e| classify_video_error(video_id, e))?;
        let info = video
            .get_basic_info()
            .await
            .map_err(|e| classify_video_error(video_id, e))?;
        let details = info.video_details;

        Ok(VideoDetails {
            id: video_id.to_string(),
            title: details.title,
            author: details.author.map(|a| a.name),
            description: Some(details.description).filter(|d| !d.is_empty()),
            thumbnail_url: details.thumbnails.last().map(|t| t.url.clone()),
        })
    }

    async fn availability_async(video_id: &str) -> Result<Availability> {
        let video = Video::new(watch_url(video_id)).map_err(|e| classify_video_error(video_id, e))?;
        match video.get_basic_info().await {
            Ok(_) => Ok(Availability::Available),
            Err(e) if is_unavailable(&e) => {
                debug!("Video {} reported unavailable: {}", video_id, e);
                Ok(Availability::Unavailable)
            }
            Err(e) => Err(classify_video_error(video_id, e)),
        }
    }

    async fn download_audio_async(video_id: &str, destination: &Path) -> Result<u64> {
        // Audio-only MP4 (m4a) so the container can carry iTunes-style tags.
        let filter: Arc<dyn Fn(&VideoFormat) -> bool + Send + Sync> = Arc::new(|format| {
            format.has_audio && !format.has_video && format.mime_type.container == "mp4"
        });
        let options = VideoOptions {
            quality: VideoQuality::HighestAudio,
            filter: VideoSearchOptions::Custom(filter),
            ..Default::default()
        };

        let video = Video::new_with_options(watch_url(video_id), options)
            .map_err(|e| classify_video_error(video_id, e))?;
        let stream = video
            .stream()
            .await
            .map_err(|e| classify_video_error(video_id, e))?;

        debug!(
            "Streaming {} ({} bytes) to {}",
            video_id,
            stream.content_length(),
            destination.display()
        );

        let mut file = std::fs::File::create(destination).map_err(|e| {
            Error::FileSystem(FileSystemError::WriteFailed {
                path: destination.to_path_buf(),
                reason: e.to_string(),
            })
        })?;

        let mut total_bytes = 0u64;
        while let Some(chunk) = stream.chunk().await.map_err(|e| {
            Error::Download(DownloadError::AudioExtractionFailed {
                video_id: video_id.to_string(),
                reason: format!("Failed to download chunk: {e}"),
            })
        })? {
            total_bytes += chunk.len() as u64;
            file.write_all(&chunk).map_err(|e| {
                Error::FileSystem(FileSystemError::WriteFailed {
                    path: destination.to_path_buf(),
                    reason: e.to_string(),
                })
            })?;
        }
        file.sync_all()?;

        Ok(total_bytes)
    }
}

impl PlaylistSource for YouTubeSource {
    fn playlist(&self, playlist_id: &str) -> Result<PlaylistInfo> {
        let html = self.fetch_playlist_page(playlist_id)?;
        let title = extract_playlist_title(&html).unwrap_or_else(|| "Unknown Playlist".to_string());
        let client_version =
            extract_client_version(&html).unwrap_or_else(|| FALLBACK_CLIENT_VERSION.to_string());

        let initial = extract_yt_initial_data(&html)
            .map_err(|reason| Self::parse_error(playlist_id, reason))?;
        let contents = find_playlist_contents(&initial).ok_or_else(|| {
            Self::parse_error(playlist_id, "Playlist not found or has no videos")
        })?;

        let mut collector = IdCollector::default();
        let mut continuation = collector.collect(contents);
        let mut pages = 0;

        while let Some(token) = continuation {
            pages += 1;
            if pages > MAX_CONTINUATION_PAGES {
                return Err(Self::parse_error(
                    playlist_id,
                    "Too many continuation pages",
                ));
            }
            debug!("Fetching continuation page {} for {}", pages, playlist_id);
            let response = self.fetch_continuation(playlist_id, &client_version, &token)?;
            let items = find_continuation_items(&response).ok_or_else(|| {
                Self::parse_error(playlist_id, "Continuation response has no items")
            })?;
            continuation = collector.collect(items);
        }

        info!(
            "Parsed playlist '{}' with {} videos",
            title,
            collector.ids.len()
        );

        Ok(PlaylistInfo {
            id: playlist_id.to_string(),
            title,
            video_ids: collector.ids,
        })
    }

    fn availability(&self, video_id: &str) -> Result<Availability> {
        self.block_on(Self::availability_async(video_id))
    }

    fn video_details(&self, video_id: &str) -> Result<VideoDetails> {
        self.block_on(Self::video_details_async(video_id))
    }

    fn download_audio(&self, video_id: &str, destination: &Path) -> Result<u64> {
        self.block_on(Self::download_audio_async(video_id, destination))
    }

    fn fetch_thumbnail(&self, url: &str) -> Result<Vec<u8>> {
        fetch_thumbnail_data(url, self.thumbnail_timeout)
    }
}

/// Whether a `rusty_ytdl` error means the platform no longer serves the video.
const fn is_unavailable(error: &VideoError) -> bool {
    matches!(
        error,
        VideoError::VideoNotFound | VideoError::VideoIsPrivate | VideoError::VideoSourceNotFound
    )
}

fn classify_video_error(video_id: &str, error: VideoError) -> Error {
    let video_id = video_id.to_string();
    let reason = error.to_string();
    match error {
        VideoError::VideoNotFound | VideoError::VideoIsPrivate => {
            Error::Download(DownloadError::VideoUnavailable { video_id, reason })
        }
        VideoError::VideoSourceNotFound | VideoError::FormatNotFound => {
            Error::Download(DownloadError::StreamUnavailable { video_id, reason })
        }
        _ => Error::Download(DownloadError::AudioExtractionFailed { video_id, reason }),
    }
}

// ============================================================================
// Page parsing
// ============================================================================

#[derive(Default)]
struct IdCollector {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl IdCollector {
    /// Record the video IDs of a page of playlist items and return the
    /// continuation token, if the page has one.
    fn collect(&mut self, items: &[serde_json::Value]) -> Option<String> {
        let mut continuation = None;
        for item in items {
            if let Some(id) = parse_playlist_item(item) {
                if self.seen.insert(id.clone()) {
                    self.ids.push(id);
                }
            } else if let Some(token) = parse_continuation_token(item) {
                continuation = Some(token);
            } else if item.get("continuationItemRenderer").is_some() {
                warn!("Continuation item without a token; playlist may be truncated");
            }
        }
        continuation
    }
}

fn extract_playlist_title(html: &str) -> Option<String> {
    let og_title_re = Regex::new(r#"<meta\s+property="og:title"\s+content="([^"]+)""#).ok()?;
    if let Some(caps) = og_title_re.captures(html) {
        return Some(html_decode(caps.get(1)?.as_str()));
    }

    let title_re = Regex::new(r"<title>([^<]+?)\s*-\s*YouTube</title>").ok()?;
    if let Some(caps) = title_re.captures(html) {
        return Some(html_decode(caps.get(1)?.as_str()));
    }

    None
}

fn extract_client_version(html: &str) -> Option<String> {
    let re = Regex::new(r#""INNERTUBE_CLIENT_VERSION"\s*:\s*"([^"]+)""#).ok()?;
    re.captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Cut the `ytInitialData` object out of the page by brace matching.
fn extract_yt_initial_data(html: &str) -> std::result::Result<serde_json::Value, String> {
    const MARKERS: [&str; 2] = ["var ytInitialData = ", "ytInitialData = "];

    let start_pos = MARKERS
        .iter()
        .find_map(|marker| html.find(marker).map(|pos| pos + marker.len()))
        .ok_or_else(|| "Could not find ytInitialData in page".to_string())?;

    let json_bytes = &html.as_bytes()[start_pos..];
    if json_bytes.first() != Some(&b'{') {
        return Err("ytInitialData does not start with '{'".to_string());
    }

    let mut depth = 0usize;
    let mut end_pos = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &byte) in json_bytes.iter().enumerate() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match byte {
            b'\\' if in_string => escape_next = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    end_pos = Some(i + 1);
                    break;
                }
            }
            _ => {}
        }
    }

    let end_pos = end_pos.ok_or_else(|| "Could not find end of ytInitialData JSON".to_string())?;
    let json_str = &html[start_pos..start_pos + end_pos];
    debug!("Extracted ytInitialData JSON: {} bytes", json_str.len());

    serde_json::from_str(json_str).map_err(|e| format!("Failed to parse ytInitialData: {e}"))
}

/// Locate the first page of playlist items.
///
/// Path: `contents.twoColumnBrowseResultsRenderer.tabs[].tabRenderer.content
/// .sectionListRenderer.contents[].itemSectionRenderer.contents[]
/// .playlistVideoListRenderer.contents`
fn find_playlist_contents(json: &serde_json::Value) -> Option<&[serde_json::Value]> {
    let tabs = json
        .get("contents")?
        .get("twoColumnBrowseResultsRenderer")?
        .get("tabs")?
        .as_array()?;

    for tab in tabs {
        let Some(sections) = tab
            .pointer("/tabRenderer/content/sectionListRenderer/contents")
            .and_then(serde_json::Value::as_array)
        else {
            continue;
        };

        for section in sections {
            let Some(items) = section
                .pointer("/itemSectionRenderer/contents")
                .and_then(serde_json::Value::as_array)
            else {
                continue;
            };

            for item in items {
                if let Some(contents) = item
                    .pointer("/playlistVideoListRenderer/contents")
                    .and_then(serde_json::Value::as_array)
                {
                    return Some(contents.as_slice());
                }
            }
        }
    }

    None
}

/// Locate the items of a continuation response.
fn find_continuation_items(json: &serde_json::Value) -> Option<&[serde_json::Value]> {
    json.get("onResponseReceivedActions")?
        .as_array()?
        .iter()
        .find_map(|action| {
            action
                .pointer("/appendContinuationItemsAction/continuationItems")
                .and_then(serde_json::Value::as_array)
        })
        .map(Vec::as_slice)
}

fn parse_playlist_item(item: &serde_json::Value) -> Option<String> {
    item.pointer("/playlistVideoRenderer/videoId")
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}

fn parse_continuation_token(item: &serde_json::Value) -> Option<String> {
    item.pointer("/continuationItemRenderer/continuationEndpoint/continuationCommand/token")
        .and_then(serde_json::Value::as_str)
        .map(String::from)
}

fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod validate_youtube_url_tests {
        use super::*;

        #[test]
        fn test_valid_standard_playlist_url() {
            let url = "https://www.youtube.com/playlist?list=PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf";
            let result = validate_youtube_url(url);

            assert!(result.is_valid);
            assert_eq!(
                result.playlist_id,
                Some("PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf".to_string())
            );
            assert_eq!(result.url_type, YouTubeUrlType::Playlist);
            assert!(result.error_message.is_none());
        }

        #[test]
        fn test_valid_watch_url_with_playlist() {
            let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLrAXtmErZgOtest";
            let result = validate_youtube_url(url);

            assert!(result.is_valid);
            assert_eq!(result.playlist_id, Some("PLrAXtmErZgOtest".to_string()));
            assert_eq!(result.url_type, YouTubeUrlType::WatchWithPlaylist);
        }

        #[test]
        fn test_valid_short_url_with_playlist() {
            let result = validate_youtube_url("https://youtu.be/dQw4w9WgXcQ?list=PLrAXtmErZgOtest");
            assert!(result.is_valid);
            assert_eq!(result.playlist_id, Some("PLrAXtmErZgOtest".to_string()));
        }

        #[test]
        fn test_url_with_hash_fragment() {
            let result = validate_youtube_url("https://www.youtube.com/playlist?list=PLtest123#top");
            assert_eq!(result.playlist_id, Some("PLtest123".to_string()));
        }

        #[test]
        fn test_normalized_url_format() {
            let result = validate_youtube_url("http://youtube.com/watch?list=PLabc&v=xyz");
            assert_eq!(
                result.normalized_url,
                Some("https://www.youtube.com/playlist?list=PLabc".to_string())
            );
        }

        #[test]
        fn test_invalid_empty_url() {
            let result = validate_youtube_url("   ");
            assert!(!result.is_valid);
            assert_eq!(result.url_type, YouTubeUrlType::Invalid);
        }

        #[test]
        fn test_invalid_not_youtube() {
            let result = validate_youtube_url("https://example.com/playlist?list=PLtest");
            assert!(!result.is_valid);
            assert!(result.error_message.unwrap().contains("YouTube"));
        }

        #[test]
        fn test_invalid_single_video_no_playlist() {
            let result = validate_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ");
            assert!(!result.is_valid);
            assert_eq!(result.url_type, YouTubeUrlType::SingleVideo);
        }

        #[test]
        fn test_invalid_playlist_id_special_chars() {
            let result = validate_youtube_url("https://www.youtube.com/playlist?list=PL<script>");
            assert!(!result.is_valid);
        }
    }

    #[test]
    fn test_extract_playlist_id_errors_are_typed() {
        let err = extract_playlist_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap_err();
        assert!(matches!(
            err,
            Error::Download(DownloadError::NotAPlaylist { .. })
        ));

        let err = extract_playlist_id("ftp://example.com").unwrap_err();
        assert!(matches!(
            err,
            Error::Download(DownloadError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_parse_playlist_reference_accepts_url_or_id() {
        assert_eq!(
            parse_playlist_reference("https://youtube.com/playlist?list=PLabc123").unwrap(),
            "PLabc123"
        );
        assert_eq!(
            parse_playlist_reference("youtube.com/playlist?list=PLabc123").unwrap(),
            "PLabc123"
        );
        assert_eq!(parse_playlist_reference("  PLabc123 ").unwrap(), "PLabc123");
        assert!(parse_playlist_reference("not a playlist!").is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("AC/DC: Back in Black?"), "AC_DC_ Back in Black_");
        assert_eq!(sanitize_filename("  ..hidden.. "), "hidden");
        assert_eq!(sanitize_filename("line\nbreak"), "line_break");
    }

    #[test]
    fn test_sanitize_filename_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.len(), MAX_FILENAME_BYTES);
        assert_eq!(sanitized.chars().count(), 100);

        // 3-byte characters do not divide the limit evenly.
        let cjk = sanitize_filename(&"あ".repeat(100));
        assert_eq!(cjk.len(), 198);
        assert!(cjk.chars().all(|c| c == 'あ'));

        let ascii = sanitize_filename(&"a".repeat(250));
        assert_eq!(ascii.len(), MAX_FILENAME_BYTES);
    }

    #[test]
    fn test_extract_yt_initial_data_and_contents() {
        let html = r#"<html><script>var ytInitialData = {"contents":{"twoColumnBrowseResultsRenderer":{"tabs":[{"tabRenderer":{"content":{"sectionListRenderer":{"contents":[{"itemSectionRenderer":{"contents":[{"playlistVideoListRenderer":{"contents":[
            {"playlistVideoRenderer":{"videoId":"aaaaaaaaaaa","title":{"runs":[{"text":"A \"quoted\" {title}"}]}}},
            {"playlistVideoRenderer":{"videoId":"bbbbbbbbbbb"}},
            {"playlistVideoRenderer":{"videoId":"aaaaaaaaaaa"}},
            {"continuationItemRenderer":{"continuationEndpoint":{"continuationCommand":{"token":"TOKEN1"}}}}
        ]}}]}}]}}}}]}}};</script></html>"#;

        let json = extract_yt_initial_data(html).unwrap();
        let contents = find_playlist_contents(&json).unwrap();
        assert_eq!(contents.len(), 4);

        let mut collector = IdCollector::default();
        let token = collector.collect(contents);
        assert_eq!(collector.ids, ["aaaaaaaaaaa", "bbbbbbbbbbb"]);
        assert_eq!(token.as_deref(), Some("TOKEN1"));
    }

    #[test]
    fn test_continuation_items_are_found() {
        let json = serde_json::json!({
            "onResponseReceivedActions": [{
                "appendContinuationItemsAction": {
                    "continuationItems": [
                        {"playlistVideoRenderer": {"videoId": "ccccccccccc"}}
                    ]
                }
            }]
        });
        let items = find_continuation_items(&json).unwrap();
        let mut collector = IdCollector::default();
        assert_eq!(collector.collect(items), None);
        assert_eq!(collector.ids, ["ccccccccccc"]);
    }

    #[test]
    fn test_missing_initial_data_is_an_error() {
        assert!(extract_yt_initial_data("<html></html>").is_err());
        assert!(extract_yt_initial_data("var ytInitialData = [1,2]").is_err());
    }

    #[test]
    fn test_extract_playlist_title_and_client_version() {
        let html = r#"<meta property="og:title" content="Road &amp; Trip"><script>{"INNERTUBE_CLIENT_VERSION":"2.20250101.01.00"}</script>"#;
        assert_eq!(extract_playlist_title(html).as_deref(), Some("Road & Trip"));
        assert_eq!(
            extract_client_version(html).as_deref(),
            Some("2.20250101.01.00")
        );
    }
}
