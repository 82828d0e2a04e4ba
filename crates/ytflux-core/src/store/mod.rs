//! Durable record of the configured playlist and its known entries.
//!
//! The [`StateStore`] trait is the only shared mutable resource of a
//! reconciliation run. Every mutation must be durable when the call returns,
//! so a run that aborts halfway leaves a state the next run can resume from.

mod memory;
mod sqlite;

pub use memory::MemoryStateStore;
pub use sqlite::{DEFAULT_DATABASE_FILE, SqliteStateStore};

use crate::entry::{Availability, EntryFilter, PlaylistEntry};
use crate::error::Result;

/// Storage for the configuration record and the playlist entries.
pub trait StateStore {
    /// The configured remote playlist identifier, if any.
    fn playlist_id(&self) -> Result<Option<String>>;

    /// Persist the remote playlist identifier.
    fn set_playlist_id(&mut self, playlist_id: &str) -> Result<()>;

    /// Create an entry for a newly discovered video.
    ///
    /// The store assigns the next sequence number; numbers are never reused,
    /// even after deletions.
    fn insert_entry(&mut self, remote_id: &str) -> Result<PlaylistEntry>;

    /// Look up a single entry.
    fn entry(&self, remote_id: &str) -> Result<Option<PlaylistEntry>>;

    /// All entries matching `filter`, ordered by sequence.
    fn entries(&self, filter: EntryFilter) -> Result<Vec<PlaylistEntry>>;

    /// Update an entry's availability.
    fn set_availability(&mut self, remote_id: &str, availability: Availability) -> Result<()>;

    /// Record or clear the downloaded file name.
    fn set_file_name(&mut self, remote_id: &str, file_name: Option<&str>) -> Result<()>;

    /// Record the last known title.
    fn set_title(&mut self, remote_id: &str, title: &str) -> Result<()>;

    /// Remove an entry.
    fn delete_entry(&mut self, remote_id: &str) -> Result<()>;
}
