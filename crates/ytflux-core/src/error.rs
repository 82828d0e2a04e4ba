//! Error types for YTFlux core operations.
//!
//! Errors are grouped by domain (state store, downloads, file system, tags)
//! and wrapped by the crate-wide [`Error`] enum. Expected remote states such
//! as a video being unavailable are modelled as data wherever the caller can
//! act on them; only the acquisition boundary turns the
//! [`DownloadError::StreamUnavailable`] and [`DownloadError::VideoUnavailable`]
//! kinds into a regular outcome.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in YTFlux core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// State store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Remote lookup or download failure.
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// File system operation failed.
    #[error(transparent)]
    FileSystem(#[from] FileSystemError),

    /// Reading or writing media tags failed.
    #[error(transparent)]
    Tag(#[from] TagError),

    /// Network request failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a network error from any message.
    pub fn network_error(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Whether this error is the classified "video or stream unavailable"
    /// failure that the acquisition pipeline recovers from.
    #[must_use]
    pub const fn is_media_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Download(
                DownloadError::StreamUnavailable { .. } | DownloadError::VideoUnavailable { .. }
            )
        )
    }
}

/// Errors raised by a state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying database reported an error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A mutation addressed an entry that does not exist.
    #[error("No playlist entry for video {remote_id}")]
    EntryNotFound {
        /// Remote video identifier that was looked up.
        remote_id: String,
    },

    /// An insert collided with an existing entry.
    #[error("Playlist entry for video {remote_id} already exists")]
    DuplicateEntry {
        /// Remote video identifier that already exists.
        remote_id: String,
    },

    /// A stored value could not be decoded.
    #[error("Corrupt value in column {column}: {value}")]
    InvalidValue {
        /// Column the value was read from.
        column: &'static str,
        /// Raw stored value.
        value: String,
    },
}

/// Errors related to the remote playlist source.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL is not a valid YouTube URL.
    #[error("Invalid YouTube URL {url}: {reason}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The URL points at something that is not a playlist.
    #[error("URL is not a YouTube playlist: {url}")]
    NotAPlaylist {
        /// The rejected URL.
        url: String,
    },

    /// The playlist page could not be fetched or parsed.
    #[error("Failed to parse playlist {playlist_id}: {reason}")]
    PlaylistParseFailed {
        /// Playlist identifier.
        playlist_id: String,
        /// Failure detail.
        reason: String,
    },

    /// The video was taken down, made private, or never existed.
    #[error("Video {video_id} is unavailable: {reason}")]
    VideoUnavailable {
        /// Video identifier.
        video_id: String,
        /// Failure detail.
        reason: String,
    },

    /// The video exists but exposes no usable audio stream.
    #[error("No stream data for video {video_id}: {reason}")]
    StreamUnavailable {
        /// Video identifier.
        video_id: String,
        /// Failure detail.
        reason: String,
    },

    /// Any other failure while fetching the audio stream.
    #[error("Failed to download audio for {video_id}: {reason}")]
    AudioExtractionFailed {
        /// Video identifier.
        video_id: String,
        /// Failure detail.
        reason: String,
    },
}

/// Errors related to file system operations.
#[derive(Debug, Error)]
pub enum FileSystemError {
    /// Reading failed.
    #[error("Failed to read {path}: {reason}")]
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Failure detail.
        reason: String,
    },

    /// Writing failed.
    #[error("Failed to write {path}: {reason}")]
    WriteFailed {
        /// Path being written.
        path: PathBuf,
        /// Failure detail.
        reason: String,
    },

    /// Directory creation failed.
    #[error("Failed to create directory {path}: {reason}")]
    CreateDirFailed {
        /// Directory path.
        path: PathBuf,
        /// Failure detail.
        reason: String,
    },

    /// Deletion failed.
    #[error("Failed to delete {path}: {reason}")]
    DeleteFailed {
        /// Path being deleted.
        path: PathBuf,
        /// Failure detail.
        reason: String,
    },

    /// Rename failed.
    #[error("Failed to move {from} to {to}: {reason}")]
    RenameFailed {
        /// Source path.
        from: PathBuf,
        /// Destination path.
        to: PathBuf,
        /// Failure detail.
        reason: String,
    },
}

/// Errors related to media tags and cover art.
#[derive(Debug, Error)]
pub enum TagError {
    /// The media container could not be read.
    #[error("Failed to read media container {path}: {reason}")]
    ReadFailed {
        /// Media file path.
        path: PathBuf,
        /// Failure detail.
        reason: String,
    },

    /// Tags could not be written.
    #[error("Failed to write tags to {path}: {reason}")]
    WriteFailed {
        /// Media file path.
        path: PathBuf,
        /// Failure detail.
        reason: String,
    },

    /// The thumbnail could not be decoded or re-encoded.
    #[error("Failed to convert cover art: {0}")]
    CoverArt(String),
}
