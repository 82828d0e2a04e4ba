//! Playlist entry data model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Whether a video can still be watched on the remote platform.
///
/// `Unavailable` marks videos the platform removed or privated. Such entries
/// are archived: they keep their local file and are never downloaded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Never checked.
    #[default]
    Unknown,
    /// Playable on the platform.
    Available,
    /// Removed or made private by the platform.
    Unavailable,
}

impl Availability {
    /// Stable string form used for persistence.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Available => "available",
            Self::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Availability {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "available" => Ok(Self::Available),
            "unavailable" => Ok(Self::Unavailable),
            other => Err(StoreError::InvalidValue {
                column: "availability",
                value: other.to_string(),
            }),
        }
    }
}

/// Local record tracking one remote video's sync state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// Creation-ordered number, never reused. Drives the file name prefix.
    pub sequence: i64,
    /// Remote video identifier.
    pub remote_id: String,
    /// Last known availability on the platform.
    pub availability: Availability,
    /// Name of the downloaded file inside the media directory.
    pub file_name: Option<String>,
    /// Last known video title.
    pub title: Option<String>,
}

impl PlaylistEntry {
    /// A freshly discovered entry: available, nothing downloaded yet.
    #[must_use]
    pub fn discovered(sequence: i64, remote_id: impl Into<String>) -> Self {
        Self {
            sequence,
            remote_id: remote_id.into(),
            availability: Availability::Available,
            file_name: None,
            title: None,
        }
    }

    /// Whether the entry is waiting for its first (or a repeated) download.
    #[must_use]
    pub fn needs_download(&self) -> bool {
        self.file_name.is_none() && self.availability != Availability::Unavailable
    }
}

/// Predicates the reconciliation phases select entries by.
///
/// Stores always return matching entries ordered by sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter {
    /// Every entry.
    All,
    /// Entries with the given availability.
    WithAvailability(Availability),
    /// Entries without a file that are not archived as unavailable.
    PendingDownload,
    /// Available entries that have a file recorded.
    AvailableWithFile,
}

impl EntryFilter {
    /// Evaluate the predicate against an entry.
    #[must_use]
    pub fn matches(self, entry: &PlaylistEntry) -> bool {
        match self {
            Self::All => true,
            Self::WithAvailability(availability) => entry.availability == availability,
            Self::PendingDownload => entry.needs_download(),
            Self::AvailableWithFile => {
                entry.availability == Availability::Available && entry.file_name.is_some()
            }
        }
    }
}
