//! SQLite-backed state store.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{debug, info};

use super::StateStore;
use crate::entry::{Availability, EntryFilter, PlaylistEntry};
use crate::error::{Error, FileSystemError, Result, StoreError};

/// Default database file name inside the data directory.
pub const DEFAULT_DATABASE_FILE: &str = "ytflux.db";

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS config (
        id INTEGER NOT NULL PRIMARY KEY CHECK (id = 0),
        playlist_id TEXT NULL
    );
    INSERT OR IGNORE INTO config (id) VALUES (0);
    CREATE TABLE IF NOT EXISTS entries (
        sequence INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        remote_id TEXT NOT NULL UNIQUE,
        availability TEXT NOT NULL DEFAULT 'unknown'
            CHECK (availability IN ('unknown', 'available', 'unavailable')),
        file_name TEXT NULL,
        title TEXT NULL
    );
";

const ENTRY_COLUMNS: &str = "sequence, remote_id, availability, file_name, title";

/// State store persisted in a single SQLite database file.
///
/// Each mutation runs as its own autocommitted statement with
/// `synchronous = FULL`, so it is on disk before the call returns.
pub struct SqliteStateStore {
    conn: Connection,
}

impl SqliteStateStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::FileSystem(FileSystemError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    reason: e.to_string(),
                })
            })?;
        }

        let conn = Connection::open(path).map_err(StoreError::from)?;
        let journal_mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(StoreError::from)?;
        debug!("SQLite journal mode: {}", journal_mode);
        conn.pragma_update(None, "synchronous", "FULL")
            .map_err(StoreError::from)?;

        let store = Self::with_connection(conn)?;
        info!("Opened state store at {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory database. Nothing survives the store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(StoreError::from)?;
        Ok(Self { conn })
    }

    fn ensure_updated(changed: usize, remote_id: &str) -> Result<()> {
        if changed == 0 {
            return Err(StoreError::EntryNotFound {
                remote_id: remote_id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn where_clause(filter: EntryFilter) -> &'static str {
    match filter {
        EntryFilter::All => "",
        EntryFilter::WithAvailability(_) => "WHERE availability = ?1",
        EntryFilter::PendingDownload => {
            "WHERE file_name IS NULL AND availability != 'unavailable'"
        }
        EntryFilter::AvailableWithFile => {
            "WHERE availability = 'available' AND file_name IS NOT NULL"
        }
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<(PlaylistEntry, String)> {
    let availability: String = row.get(2)?;
    Ok((
        PlaylistEntry {
            sequence: row.get(0)?,
            remote_id: row.get(1)?,
            availability: Availability::Unknown,
            file_name: row.get(3)?,
            title: row.get(4)?,
        },
        availability,
    ))
}

fn decode(raw: (PlaylistEntry, String)) -> Result<PlaylistEntry> {
    let (mut entry, availability) = raw;
    entry.availability = availability.parse()?;
    Ok(entry)
}

impl StateStore for SqliteStateStore {
    fn playlist_id(&self) -> Result<Option<String>> {
        let id: Option<String> = self
            .conn
            .query_row("SELECT playlist_id FROM config WHERE id = 0", [], |row| {
                row.get(0)
            })
            .map_err(StoreError::from)?;
        Ok(id)
    }

    fn set_playlist_id(&mut self, playlist_id: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE config SET playlist_id = ?1 WHERE id = 0",
                params![playlist_id],
            )
            .map_err(StoreError::from)?;
        info!("Configured playlist {}", playlist_id);
        Ok(())
    }

    fn insert_entry(&mut self, remote_id: &str) -> Result<PlaylistEntry> {
        if self.entry(remote_id)?.is_some() {
            return Err(StoreError::DuplicateEntry {
                remote_id: remote_id.to_string(),
            }
            .into());
        }

        self.conn
            .execute(
                "INSERT INTO entries (remote_id, availability) VALUES (?1, ?2)",
                params![remote_id, Availability::Available.as_str()],
            )
            .map_err(StoreError::from)?;
        let sequence = self.conn.last_insert_rowid();
        debug!("Inserted entry {} for {}", sequence, remote_id);

        Ok(PlaylistEntry::discovered(sequence, remote_id))
    }

    fn entry(&self, remote_id: &str) -> Result<Option<PlaylistEntry>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE remote_id = ?1"),
                params![remote_id],
                entry_from_row,
            )
            .optional()
            .map_err(StoreError::from)?;
        raw.map(decode).transpose()
    }

    fn entries(&self, filter: EntryFilter) -> Result<Vec<PlaylistEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM entries {} ORDER BY sequence",
            where_clause(filter)
        );
        let mut stmt = self.conn.prepare(&sql).map_err(StoreError::from)?;
        let rows = match filter {
            EntryFilter::WithAvailability(availability) => {
                stmt.query_map(params![availability.as_str()], entry_from_row)
            }
            _ => stmt.query_map([], entry_from_row),
        }
        .map_err(StoreError::from)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(decode(row.map_err(StoreError::from)?)?);
        }
        Ok(out)
    }

    fn set_availability(&mut self, remote_id: &str, availability: Availability) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE entries SET availability = ?1 WHERE remote_id = ?2",
                params![availability.as_str(), remote_id],
            )
            .map_err(StoreError::from)?;
        Self::ensure_updated(changed, remote_id)
    }

    fn set_file_name(&mut self, remote_id: &str, file_name: Option<&str>) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE entries SET file_name = ?1 WHERE remote_id = ?2",
                params![file_name, remote_id],
            )
            .map_err(StoreError::from)?;
        Self::ensure_updated(changed, remote_id)
    }

    fn set_title(&mut self, remote_id: &str, title: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE entries SET title = ?1 WHERE remote_id = ?2",
                params![title, remote_id],
            )
            .map_err(StoreError::from)?;
        Self::ensure_updated(changed, remote_id)
    }

    fn delete_entry(&mut self, remote_id: &str) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "DELETE FROM entries WHERE remote_id = ?1",
                params![remote_id],
            )
            .map_err(StoreError::from)?;
        Self::ensure_updated(changed, remote_id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_playlist_id_absent_until_set() {
        let mut store = SqliteStateStore::open_in_memory().unwrap();
        assert_eq!(store.playlist_id().unwrap(), None);

        store.set_playlist_id("PLtest123").unwrap();
        assert_eq!(store.playlist_id().unwrap(), Some("PLtest123".to_string()));
    }

    #[test]
    fn test_sequences_are_not_reused_after_delete() {
        let mut store = SqliteStateStore::open_in_memory().unwrap();
        let a = store.insert_entry("aaaaaaaaaaa").unwrap();
        let b = store.insert_entry("bbbbbbbbbbb").unwrap();
        store.delete_entry("bbbbbbbbbbb").unwrap();
        let c = store.insert_entry("ccccccccccc").unwrap();

        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
        assert_eq!(c.sequence, 3);
    }

    #[test]
    fn test_duplicate_insert_is_rejected() {
        let mut store = SqliteStateStore::open_in_memory().unwrap();
        store.insert_entry("aaaaaaaaaaa").unwrap();
        let err = store.insert_entry("aaaaaaaaaaa").unwrap_err();
        assert!(matches!(
            err,
            Error::Store(StoreError::DuplicateEntry { .. })
        ));
    }

    #[test]
    fn test_filters_select_expected_entries() {
        let mut store = SqliteStateStore::open_in_memory().unwrap();
        store.insert_entry("a").unwrap();
        store.insert_entry("b").unwrap();
        store.insert_entry("c").unwrap();
        store.set_file_name("a", Some("00001 - A.m4a")).unwrap();
        store.set_availability("c", Availability::Unavailable).unwrap();

        let ids = |filter| -> Vec<String> {
            store
                .entries(filter)
                .unwrap()
                .into_iter()
                .map(|e| e.remote_id)
                .collect()
        };

        assert_eq!(ids(EntryFilter::All), ["a", "b", "c"]);
        assert_eq!(ids(EntryFilter::PendingDownload), ["b"]);
        assert_eq!(ids(EntryFilter::AvailableWithFile), ["a"]);
        assert_eq!(
            ids(EntryFilter::WithAvailability(Availability::Unavailable)),
            ["c"]
        );
        assert_eq!(
            ids(EntryFilter::WithAvailability(Availability::Available)),
            ["a", "b"]
        );
    }

    #[test]
    fn test_updates_on_missing_entry_fail() {
        let mut store = SqliteStateStore::open_in_memory().unwrap();
        assert!(store.set_file_name("missing", None).is_err());
        assert!(
            store
                .set_availability("missing", Availability::Available)
                .is_err()
        );
        assert!(store.delete_entry("missing").is_err());
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(DEFAULT_DATABASE_FILE);

        {
            let mut store = SqliteStateStore::open(&path).unwrap();
            store.set_playlist_id("PLpersist").unwrap();
            store.insert_entry("a").unwrap();
            store.set_file_name("a", Some("00001 - A.m4a")).unwrap();
            store.set_title("a", "A").unwrap();
            store.insert_entry("b").unwrap();
            store.delete_entry("b").unwrap();
        }

        let mut store = SqliteStateStore::open(&path).unwrap();
        assert_eq!(store.playlist_id().unwrap(), Some("PLpersist".to_string()));

        let a = store.entry("a").unwrap().unwrap();
        assert_eq!(a.file_name.as_deref(), Some("00001 - A.m4a"));
        assert_eq!(a.title.as_deref(), Some("A"));
        assert_eq!(a.availability, Availability::Available);

        let c = store.insert_entry("c").unwrap();
        assert_eq!(c.sequence, 3);
    }
}
