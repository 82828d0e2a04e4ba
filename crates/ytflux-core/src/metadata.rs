//! MP4 (m4a) tag writing and managed-file inspection.
//!
//! Every file the acquisition pipeline produces carries iTunes-style tags
//! plus a private freeform atom, the managed-file marker:
//!
//! ```text
//! ----:io.ytflux:managed = "ytflux/<version>"
//! ```
//!
//! The marker is written last, so its presence means the whole tagging step
//! completed. Verification uses it to tell files this tool produced from
//! half-written ones or anything else dropped into the media directory.

use std::borrow::Cow;
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use lofty::config::{ParseOptions, WriteOptions};
use lofty::mp4::{Atom, AtomData, AtomIdent, Ilst, Mp4File};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TagError};
use crate::thumbnail::CoverFormat;

/// Namespace (`mean`) of the managed-file marker atom.
pub const MARKER_MEAN: &str = "io.ytflux";

/// Name of the managed-file marker atom.
pub const MARKER_NAME: &str = "managed";

/// Prefix every marker value starts with.
pub const MARKER_VALUE_PREFIX: &str = "ytflux/";

/// Marker value written by this build.
#[must_use]
pub fn marker_value() -> String {
    format!("{MARKER_VALUE_PREFIX}{}", env!("CARGO_PKG_VERSION"))
}

fn marker_ident() -> AtomIdent<'static> {
    AtomIdent::Freeform {
        mean: Cow::Borrowed(MARKER_MEAN),
        name: Cow::Borrowed(MARKER_NAME),
    }
}

/// Embedded cover picture, already encoded as `format`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverArt {
    /// Encoded image bytes.
    pub data: Vec<u8>,
    /// Encoding of `data`.
    pub format: CoverFormat,
}

/// Tags written into a downloaded track.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    /// Video title.
    pub title: String,
    /// Channel name.
    pub artist: Option<String>,
    /// Video description.
    pub description: Option<String>,
    /// Watch URL of the source video.
    pub source_url: Option<String>,
    /// Front cover.
    pub cover: Option<CoverArt>,
}

/// Replace all tags of an MP4 file with `tags` and the managed-file marker.
///
/// # Errors
///
/// Returns [`TagError::WriteFailed`] if the file is not a writable MP4.
pub fn write_tags(path: &Path, tags: &TrackTags) -> Result<()> {
    let mut ilst = Ilst::default();

    ilst.set_title(tags.title.clone());
    if let Some(artist) = &tags.artist {
        ilst.set_artist(artist.clone());
    }
    if let Some(description) = &tags.description {
        ilst.insert(Atom::new(
            AtomIdent::Fourcc(*b"desc"),
            AtomData::UTF8(description.clone()),
        ));
    }
    if let Some(url) = &tags.source_url {
        ilst.insert(Atom::new(
            AtomIdent::Fourcc(*b"purl"),
            AtomData::UTF8(url.clone()),
        ));
    }
    if let Some(cover) = &tags.cover {
        let mime = match cover.format {
            CoverFormat::Jpeg => MimeType::Jpeg,
            CoverFormat::Png => MimeType::Png,
        };
        ilst.insert_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            Some(mime),
            None,
            cover.data.clone(),
        ));
    }
    ilst.insert(Atom::new(marker_ident(), AtomData::UTF8(marker_value())));

    ilst.save_to_path(path, WriteOptions::default())
        .map_err(|e| TagError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    debug!("Tagged {} as '{}'", path.display(), tags.title);
    Ok(())
}

/// Integrity classification of a file recorded as downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileHealth {
    /// The file does not exist.
    Missing,
    /// The container could not be parsed.
    Corrupt,
    /// A valid container without any metadata.
    Untagged,
    /// Tagged, but not by this tool.
    Foreign,
    /// Tagged by this tool and carrying the marker.
    Managed,
}

impl FileHealth {
    /// Whether the file can be kept as is.
    #[must_use]
    pub const fn is_managed(self) -> bool {
        matches!(self, Self::Managed)
    }
}

/// Classifies downloaded files for the verification phase.
pub trait MediaInspector {
    /// Inspect the file at `path`.
    fn inspect(&self, path: &Path) -> Result<FileHealth>;
}

/// [`MediaInspector`] for MP4 audio files.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mp4Inspector;

impl MediaInspector for Mp4Inspector {
    fn inspect(&self, path: &Path) -> Result<FileHealth> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(FileHealth::Missing),
            Err(e) => {
                return Err(TagError::ReadFailed {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
                .into());
            }
        };

        let mp4 = match Mp4File::read_from(&mut file, ParseOptions::new().read_properties(false)) {
            Ok(mp4) => mp4,
            Err(e) => {
                debug!("Unparseable MP4 {}: {}", path.display(), e);
                return Ok(FileHealth::Corrupt);
            }
        };

        let Some(ilst) = mp4.ilst().filter(|ilst| !ilst.is_empty()) else {
            return Ok(FileHealth::Untagged);
        };

        Ok(if has_marker(ilst) {
            FileHealth::Managed
        } else {
            FileHealth::Foreign
        })
    }
}

fn has_marker(ilst: &Ilst) -> bool {
    ilst.get(&marker_ident()).is_some_and(|atom| {
        atom.data().any(|data| {
            matches!(data, AtomData::UTF8(value) if value.starts_with(MARKER_VALUE_PREFIX))
        })
    })
}
