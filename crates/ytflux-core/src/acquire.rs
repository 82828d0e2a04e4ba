//! Acquisition pipeline: download, tag and place one media file.
//!
//! A file is never written straight onto its final name. The audio stream
//! goes to a hidden `.<name>.part` file next to it, gets tagged there, and is
//! renamed over the final path only once the managed-file marker is in
//! place. An interrupted acquisition therefore leaves at most a stray temp
//! file, never a half-written file under a managed name. Leftovers carrying
//! the entry's sequence prefix are cleared at the start of the next attempt.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::entry::PlaylistEntry;
use crate::error::{Error, FileSystemError, Result};
use crate::metadata::{CoverArt, TrackTags, write_tags};
use crate::thumbnail::{CoverFormat, transcode_cover, youtube_thumbnail_url};
use crate::youtube::{PlaylistSource, VideoDetails, sanitize_filename};

/// Extension of every managed media file.
pub const MEDIA_EXTENSION: &str = "m4a";

/// Result of a single acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The file is in place, tagged and marked.
    Downloaded {
        /// File name inside the media directory.
        file_name: String,
        /// Remote title at download time.
        title: String,
    },
    /// The platform no longer serves this video.
    StreamUnavailable {
        /// What the source reported.
        reason: String,
    },
}

/// Obtains the media file for one entry.
pub trait Acquirer {
    /// Download and tag the media for `entry`.
    ///
    /// Only the "video or stream unavailable" condition is reported as
    /// [`AcquireOutcome::StreamUnavailable`]; every other failure is an error.
    fn acquire(&mut self, entry: &PlaylistEntry) -> Result<AcquireOutcome>;
}

/// Final file name for an entry: `NNNNN - <title>.m4a`.
///
/// The zero-padded sequence keeps lexical order equal to playlist order. An
/// empty title falls back to the video ID.
#[must_use]
pub fn media_file_name(sequence: i64, title: &str, remote_id: &str) -> String {
    let sanitized = sanitize_filename(title);
    let stem = if sanitized.is_empty() {
        sanitize_filename(remote_id)
    } else {
        sanitized
    };
    format!("{}{stem}.{MEDIA_EXTENSION}", media_file_prefix(sequence))
}

fn media_file_prefix(sequence: i64) -> String {
    format!("{sequence:05} - ")
}

/// Hidden temp file name used while a download is in flight.
#[must_use]
pub fn partial_file_name(file_name: &str) -> String {
    format!(".{file_name}.part")
}

/// Production [`Acquirer`] backed by a [`PlaylistSource`].
pub struct AcquisitionPipeline<'a, R: PlaylistSource + ?Sized> {
    source: &'a R,
    media_dir: PathBuf,
    cover_format: CoverFormat,
}

impl<'a, R: PlaylistSource + ?Sized> AcquisitionPipeline<'a, R> {
    /// Create a pipeline writing into `media_dir`.
    pub fn new(source: &'a R, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            media_dir: media_dir.into(),
            cover_format: CoverFormat::default(),
        }
    }

    /// Set the cover art encoding.
    #[must_use]
    pub const fn with_cover_format(mut self, cover_format: CoverFormat) -> Self {
        self.cover_format = cover_format;
        self
    }

    fn cover_art(&self, details: &VideoDetails) -> Result<CoverArt> {
        let url = details
            .thumbnail_url
            .clone()
            .unwrap_or_else(|| youtube_thumbnail_url(&details.id));
        let raw = self.source.fetch_thumbnail(&url)?;
        let data = transcode_cover(&raw, self.cover_format)?;
        Ok(CoverArt {
            data,
            format: self.cover_format,
        })
    }

    fn download_and_tag(
        &self,
        details: &VideoDetails,
        temp_path: &Path,
    ) -> Result<()> {
        let bytes = self.source.download_audio(&details.id, temp_path)?;
        debug!("Downloaded {} bytes for {}", bytes, details.id);

        let tags = TrackTags {
            title: details.title.clone(),
            artist: details.author.clone(),
            description: details.description.clone(),
            source_url: Some(details.watch_url()),
            cover: Some(self.cover_art(details)?),
        };
        write_tags(temp_path, &tags)
    }

    /// Remove media and temp files an earlier attempt left for `sequence`.
    ///
    /// Sequences are never reused, so anything carrying the prefix belongs to
    /// the entry being acquired, which has no recorded file at this point.
    fn remove_stale_files(&self, sequence: i64) -> Result<()> {
        let dir_entries = match std::fs::read_dir(&self.media_dir) {
            Ok(dir_entries) => dir_entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(Error::FileSystem(FileSystemError::ReadFailed {
                    path: self.media_dir.clone(),
                    reason: e.to_string(),
                }));
            }
        };

        let prefix = media_file_prefix(sequence);
        let media_suffix = format!(".{MEDIA_EXTENSION}");
        let partial_prefix = format!(".{prefix}");

        for dir_entry in dir_entries.flatten() {
            let name = dir_entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let stale_media = name.starts_with(&prefix) && name.ends_with(&media_suffix);
            let stale_partial = name.starts_with(&partial_prefix) && name.ends_with(".part");
            if stale_media || stale_partial {
                debug!("Clearing leftover {}", name);
                remove_file_if_present(&dir_entry.path());
            }
        }
        Ok(())
    }

    fn ensure_media_dir(&self) -> Result<()> {
        if self.media_dir.is_dir() {
            return Ok(());
        }
        std::fs::create_dir_all(&self.media_dir).map_err(|e| {
            Error::FileSystem(FileSystemError::CreateDirFailed {
                path: self.media_dir.clone(),
                reason: e.to_string(),
            })
        })
    }
}

fn remove_file_if_present(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

impl<R: PlaylistSource + ?Sized> Acquirer for AcquisitionPipeline<'_, R> {
    fn acquire(&mut self, entry: &PlaylistEntry) -> Result<AcquireOutcome> {
        self.remove_stale_files(entry.sequence)?;

        let details = match self.source.video_details(&entry.remote_id) {
            Ok(details) => details,
            Err(e) if e.is_media_unavailable() => {
                warn!("Video {} is unavailable: {}", entry.remote_id, e);
                return Ok(AcquireOutcome::StreamUnavailable {
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        self.ensure_media_dir()?;

        let file_name = media_file_name(entry.sequence, &details.title, &entry.remote_id);
        let final_path = self.media_dir.join(&file_name);
        let temp_path = self.media_dir.join(partial_file_name(&file_name));

        info!("Downloading {} -> {}", entry.remote_id, file_name);

        match self.download_and_tag(&details, &temp_path) {
            Ok(()) => {}
            Err(e) if e.is_media_unavailable() => {
                remove_file_if_present(&temp_path);
                warn!("No stream for {}: {}", entry.remote_id, e);
                return Ok(AcquireOutcome::StreamUnavailable {
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                remove_file_if_present(&temp_path);
                return Err(e);
            }
        }

        if let Err(e) = std::fs::rename(&temp_path, &final_path) {
            remove_file_if_present(&temp_path);
            return Err(Error::FileSystem(FileSystemError::RenameFailed {
                from: temp_path,
                to: final_path,
                reason: e.to_string(),
            }));
        }

        info!("Acquired {}", final_path.display());
        Ok(AcquireOutcome::Downloaded {
            file_name,
            title: details.title,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::DownloadError;
    use crate::metadata::fixtures::minimal_m4a;
    use crate::metadata::{FileHealth, MediaInspector, Mp4Inspector};
    use crate::youtube::MockPlaylistSource;
    use mockall::predicate::eq;
    use tempfile::TempDir;

    /// Longest file name most file systems accept, in bytes.
    const NAME_MAX: usize = 255;

    fn png_thumbnail() -> Vec<u8> {
        let img = image::RgbImage::new(2, 2);
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn unavailable(id: &str) -> Error {
        Error::Download(DownloadError::VideoUnavailable {
            video_id: id.to_string(),
            reason: "private".to_string(),
        })
    }

    fn details(id: &str, title: &str) -> VideoDetails {
        VideoDetails {
            id: id.to_string(),
            title: title.to_string(),
            author: Some("Channel".to_string()),
            description: None,
            thumbnail_url: None,
        }
    }

    #[test]
    fn test_media_file_name_is_zero_padded() {
        assert_eq!(
            media_file_name(7, "Artist - Song", "abc"),
            "00007 - Artist - Song.m4a"
        );
        assert_eq!(
            media_file_name(123_456, "Big", "abc"),
            "123456 - Big.m4a"
        );
    }

    #[test]
    fn test_media_file_name_sanitizes_and_falls_back() {
        assert_eq!(media_file_name(1, "AC/DC?", "abc"), "00001 - AC_DC_.m4a");
        assert_eq!(media_file_name(2, "  ... ", "dQw4w9WgXcQ"), "00002 - dQw4w9WgXcQ.m4a");
    }

    #[test]
    fn test_partial_file_name_is_hidden() {
        assert_eq!(partial_file_name("00001 - A.m4a"), ".00001 - A.m4a.part");
    }

    #[test]
    fn test_multibyte_titles_fit_file_name_limit() {
        for title in ["あ".repeat(100), "🎵".repeat(100), "é".repeat(100)] {
            for sequence in [1, 99_999, i64::MAX] {
                let name = media_file_name(sequence, &title, "id");
                assert!(
                    partial_file_name(&name).len() <= NAME_MAX,
                    "{} bytes for sequence {sequence}",
                    partial_file_name(&name).len()
                );
            }
        }
    }

    #[test]
    fn test_longest_cjk_temp_name_can_be_created() {
        let dir = TempDir::new().unwrap();
        let name = media_file_name(1, &"あ".repeat(100), "id");
        std::fs::write(dir.path().join(partial_file_name(&name)), b"").unwrap();
        std::fs::write(dir.path().join(&name), b"").unwrap();
    }

    #[test]
    fn test_successful_acquisition_is_tagged_and_renamed() {
        let mut source = MockPlaylistSource::new();
        source
            .expect_video_details()
            .with(eq("vid"))
            .returning(|id| Ok(details(id, "Song")));
        source
            .expect_download_audio()
            .withf(|id, dest| {
                id == "vid"
                    && dest.file_name().and_then(|n| n.to_str()) == Some(".00005 - Song.m4a.part")
            })
            .returning(|_, dest| {
                let data = minimal_m4a();
                std::fs::write(dest, &data).unwrap();
                Ok(data.len() as u64)
            });
        source
            .expect_fetch_thumbnail()
            .returning(|_| Ok(png_thumbnail()));

        let dir = TempDir::new().unwrap();
        let mut pipeline =
            AcquisitionPipeline::new(&source, dir.path()).with_cover_format(CoverFormat::Png);
        let outcome = pipeline
            .acquire(&PlaylistEntry::discovered(5, "vid"))
            .unwrap();

        assert_eq!(
            outcome,
            AcquireOutcome::Downloaded {
                file_name: "00005 - Song.m4a".to_string(),
                title: "Song".to_string(),
            }
        );
        let final_path = dir.path().join("00005 - Song.m4a");
        assert_eq!(
            Mp4Inspector.inspect(&final_path).unwrap(),
            FileHealth::Managed
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_leftovers_for_the_sequence_are_cleared() {
        let dir = TempDir::new().unwrap();
        for name in [
            ".00006 - Old.m4a.part",
            "00006 - Old Title.m4a",
            "00060 - Other.m4a",
            ".00060 - Other.m4a.part",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let mut source = MockPlaylistSource::new();
        source
            .expect_video_details()
            .returning(|id| Err(unavailable(id)));

        let mut pipeline = AcquisitionPipeline::new(&source, dir.path());
        let outcome = pipeline
            .acquire(&PlaylistEntry::discovered(6, "vid"))
            .unwrap();
        assert!(matches!(outcome, AcquireOutcome::StreamUnavailable { .. }));

        let mut left: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec![".00060 - Other.m4a.part", "00060 - Other.m4a", "notes.txt"]
        );
    }

    #[test]
    fn test_unavailable_details_become_outcome() {
        let mut source = MockPlaylistSource::new();
        source
            .expect_video_details()
            .with(eq("gone"))
            .returning(|id| Err(unavailable(id)));
        source.expect_download_audio().never();

        let dir = TempDir::new().unwrap();
        let mut pipeline = AcquisitionPipeline::new(&source, dir.path());
        let outcome = pipeline
            .acquire(&PlaylistEntry::discovered(1, "gone"))
            .unwrap();

        assert!(matches!(outcome, AcquireOutcome::StreamUnavailable { .. }));
    }

    #[test]
    fn test_stream_unavailable_removes_partial_file() {
        let mut source = MockPlaylistSource::new();
        source
            .expect_video_details()
            .returning(|id| Ok(details(id, "Song")));
        source.expect_download_audio().returning(|id, dest| {
            std::fs::write(dest, b"partial").unwrap();
            Err(Error::Download(DownloadError::StreamUnavailable {
                video_id: id.to_string(),
                reason: "no formats".to_string(),
            }))
        });

        let dir = TempDir::new().unwrap();
        let mut pipeline = AcquisitionPipeline::new(&source, dir.path());
        let outcome = pipeline
            .acquire(&PlaylistEntry::discovered(3, "vid"))
            .unwrap();

        assert!(matches!(outcome, AcquireOutcome::StreamUnavailable { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_other_failures_propagate_and_leave_no_file() {
        let mut source = MockPlaylistSource::new();
        source
            .expect_video_details()
            .returning(|id| Ok(details(id, "Song")));
        source.expect_download_audio().returning(|_, dest| {
            std::fs::write(dest, b"partial").unwrap();
            Err(Error::network_error("connection reset"))
        });

        let dir = TempDir::new().unwrap();
        let mut pipeline = AcquisitionPipeline::new(&source, dir.path());
        let err = pipeline
            .acquire(&PlaylistEntry::discovered(3, "vid"))
            .unwrap_err();

        assert!(matches!(err, Error::Network(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_untaggable_download_never_reaches_final_name() {
        let mut source = MockPlaylistSource::new();
        source
            .expect_video_details()
            .returning(|id| Ok(details(id, "Song")));
        source.expect_download_audio().returning(|_, dest| {
            std::fs::write(dest, b"not an mp4").unwrap();
            Ok(10)
        });
        source
            .expect_fetch_thumbnail()
            .with(eq("https://img.youtube.com/vi/vid/hqdefault.jpg"))
            .returning(|_| Ok(png_thumbnail()));

        let dir = TempDir::new().unwrap();
        let mut pipeline = AcquisitionPipeline::new(&source, dir.path().join("music"));
        let result = pipeline.acquire(&PlaylistEntry::discovered(4, "vid"));

        assert!(result.is_err());
        let final_path = dir.path().join("music").join("00004 - Song.m4a");
        assert!(!final_path.exists());
        assert_eq!(
            std::fs::read_dir(dir.path().join("music")).unwrap().count(),
            0
        );
    }
}
