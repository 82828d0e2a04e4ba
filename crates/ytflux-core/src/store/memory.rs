//! In-memory state store.

use std::collections::BTreeMap;

use super::StateStore;
use crate::entry::{Availability, EntryFilter, PlaylistEntry};
use crate::error::{Result, StoreError};

/// Volatile store with the same semantics as the SQLite one.
///
/// Useful for tests and dry runs. Sequence numbers keep increasing across
/// deletions exactly like `AUTOINCREMENT`.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStore {
    playlist_id: Option<String>,
    entries: BTreeMap<i64, PlaylistEntry>,
    last_sequence: i64,
}

impl MemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already configured with a playlist.
    #[must_use]
    pub fn with_playlist(playlist_id: impl Into<String>) -> Self {
        Self {
            playlist_id: Some(playlist_id.into()),
            ..Self::default()
        }
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find_mut(&mut self, remote_id: &str) -> Result<&mut PlaylistEntry> {
        self.entries
            .values_mut()
            .find(|e| e.remote_id == remote_id)
            .ok_or_else(|| {
                StoreError::EntryNotFound {
                    remote_id: remote_id.to_string(),
                }
                .into()
            })
    }
}

impl StateStore for MemoryStateStore {
    fn playlist_id(&self) -> Result<Option<String>> {
        Ok(self.playlist_id.clone())
    }

    fn set_playlist_id(&mut self, playlist_id: &str) -> Result<()> {
        self.playlist_id = Some(playlist_id.to_string());
        Ok(())
    }

    fn insert_entry(&mut self, remote_id: &str) -> Result<PlaylistEntry> {
        if self.entries.values().any(|e| e.remote_id == remote_id) {
            return Err(StoreError::DuplicateEntry {
                remote_id: remote_id.to_string(),
            }
            .into());
        }
        self.last_sequence += 1;
        let entry = PlaylistEntry::discovered(self.last_sequence, remote_id);
        self.entries.insert(entry.sequence, entry.clone());
        Ok(entry)
    }

    fn entry(&self, remote_id: &str) -> Result<Option<PlaylistEntry>> {
        Ok(self
            .entries
            .values()
            .find(|e| e.remote_id == remote_id)
            .cloned())
    }

    fn entries(&self, filter: EntryFilter) -> Result<Vec<PlaylistEntry>> {
        Ok(self
            .entries
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    fn set_availability(&mut self, remote_id: &str, availability: Availability) -> Result<()> {
        self.find_mut(remote_id)?.availability = availability;
        Ok(())
    }

    fn set_file_name(&mut self, remote_id: &str, file_name: Option<&str>) -> Result<()> {
        self.find_mut(remote_id)?.file_name = file_name.map(String::from);
        Ok(())
    }

    fn set_title(&mut self, remote_id: &str, title: &str) -> Result<()> {
        self.find_mut(remote_id)?.title = Some(title.to_string());
        Ok(())
    }

    fn delete_entry(&mut self, remote_id: &str) -> Result<()> {
        let sequence = self.find_mut(remote_id)?.sequence;
        self.entries.remove(&sequence);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_mirrors_autoincrement() {
        let mut store = MemoryStateStore::new();
        store.insert_entry("a").unwrap();
        store.insert_entry("b").unwrap();
        store.delete_entry("b").unwrap();
        let c = store.insert_entry("c").unwrap();

        assert_eq!(c.sequence, 3);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_memory_store_entries_are_ordered() {
        let mut store = MemoryStateStore::with_playlist("PLx");
        for id in ["z", "y", "x"] {
            store.insert_entry(id).unwrap();
        }
        let ids: Vec<_> = store
            .entries(EntryFilter::All)
            .unwrap()
            .into_iter()
            .map(|e| e.remote_id)
            .collect();
        assert_eq!(ids, ["z", "y", "x"]);
        assert_eq!(store.playlist_id().unwrap().as_deref(), Some("PLx"));
    }
}
