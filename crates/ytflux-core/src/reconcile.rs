//! Reconciliation engine driving local state toward the remote playlist.
//!
//! A run resolves the remote playlist once and then executes four phases in
//! a fixed order:
//!
//! 1. **Discovery**: every remote video without a local entry gets one, in
//!    oldest-first order so sequence numbers follow playlist history.
//! 2. **Pruning**: available entries that left the playlist are re-checked.
//!    Still playable means the user removed them, so the file and entry go.
//!    Unplayable means the platform removed them, so they are archived as
//!    [`Availability::Unavailable`].
//! 3. **Acquisition**: entries without a file are downloaded.
//! 4. **Verification**: recorded files are inspected and anything that is
//!    not a managed file is deleted and downloaded again.
//!
//! Each store mutation is durable on its own. Any unclassified error aborts
//! the run; the next run picks up from whatever state was reached.
//!
//! # Example
//!
//! ```rust,no_run
//! use ytflux_core::acquire::AcquisitionPipeline;
//! use ytflux_core::metadata::Mp4Inspector;
//! use ytflux_core::reconcile::Reconciler;
//! use ytflux_core::store::SqliteStateStore;
//! use ytflux_core::youtube::YouTubeSource;
//! use std::path::Path;
//!
//! # fn main() -> ytflux_core::Result<()> {
//! let mut store = SqliteStateStore::open(Path::new("ytflux.db"))?;
//! let source = YouTubeSource::new()?;
//! let mut acquirer = AcquisitionPipeline::new(&source, "music");
//! let inspector = Mp4Inspector;
//!
//! let report = Reconciler::new(&mut store, &source, &mut acquirer, &inspector, "music").run()?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::acquire::{AcquireOutcome, Acquirer};
use crate::entry::{Availability, EntryFilter, PlaylistEntry};
use crate::error::{Error, FileSystemError, Result};
use crate::metadata::{FileHealth, MediaInspector};
use crate::store::StateStore;
use crate::youtube::{PlaylistInfo, PlaylistSource};

/// Phase of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    /// Recording new remote videos.
    Discovery,
    /// Removing or archiving videos that left the playlist.
    Pruning,
    /// Downloading missing files.
    Acquisition,
    /// Checking downloaded files.
    Verification,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Discovery => write!(f, "Discovery"),
            Self::Pruning => write!(f, "Pruning"),
            Self::Acquisition => write!(f, "Acquisition"),
            Self::Verification => write!(f, "Verification"),
        }
    }
}

/// Counters collected over one reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Entries created by discovery.
    pub added: usize,
    /// Entries deleted because the user removed them from the playlist.
    pub removed: usize,
    /// Entries archived because the platform no longer serves them.
    pub marked_unavailable: usize,
    /// Files downloaded for entries that had none.
    pub downloaded: usize,
    /// Files replaced after failing verification.
    pub repaired: usize,
    /// Files that passed verification untouched.
    pub verified: usize,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

impl ReconcileReport {
    /// Whether the run changed nothing.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.added == 0
            && self.removed == 0
            && self.marked_unavailable == 0
            && self.downloaded == 0
            && self.repaired == 0
    }

    /// One-line human readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Sync completed: {} added, {} removed, {} unavailable, {} downloaded, {} repaired, {} verified in {:.2}s",
            self.added,
            self.removed,
            self.marked_unavailable,
            self.downloaded,
            self.repaired,
            self.verified,
            self.duration.as_secs_f64()
        )
    }
}

/// Runs the reconciliation phases against injected collaborators.
pub struct Reconciler<'a, S, R, A, I>
where
    S: StateStore + ?Sized,
    R: PlaylistSource + ?Sized,
    A: Acquirer + ?Sized,
    I: MediaInspector + ?Sized,
{
    store: &'a mut S,
    source: &'a R,
    acquirer: &'a mut A,
    inspector: &'a I,
    media_dir: PathBuf,
}

impl<'a, S, R, A, I> Reconciler<'a, S, R, A, I>
where
    S: StateStore + ?Sized,
    R: PlaylistSource + ?Sized,
    A: Acquirer + ?Sized,
    I: MediaInspector + ?Sized,
{
    /// Create an engine over the given store and collaborators.
    ///
    /// `media_dir` must be the directory the acquirer writes into.
    pub fn new(
        store: &'a mut S,
        source: &'a R,
        acquirer: &'a mut A,
        inspector: &'a I,
        media_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            source,
            acquirer,
            inspector,
            media_dir: media_dir.into(),
        }
    }

    /// Execute one full run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when no playlist is configured, and
    /// propagates any store, source or file system failure that is not the
    /// classified "stream unavailable" outcome.
    pub fn run(&mut self) -> Result<ReconcileReport> {
        let start = Instant::now();
        let mut report = ReconcileReport::default();

        let playlist_id = self.store.playlist_id()?.ok_or_else(|| {
            Error::Configuration("No playlist configured in the state store".to_string())
        })?;

        info!("Resolving playlist {}", playlist_id);
        let snapshot = self.source.playlist(&playlist_id)?;
        info!(
            "Playlist '{}' lists {} videos",
            snapshot.title,
            snapshot.video_ids.len()
        );

        info!("Phase 1: {}", SyncPhase::Discovery);
        report.added = self.discover(&snapshot)?;

        info!("Phase 2: {}", SyncPhase::Pruning);
        self.prune(&snapshot, &mut report)?;

        info!("Phase 3: {}", SyncPhase::Acquisition);
        self.acquire_pending(&mut report)?;

        info!("Phase 4: {}", SyncPhase::Verification);
        self.verify(&mut report)?;

        report.duration = start.elapsed();
        info!("{}", report.summary());
        Ok(report)
    }

    fn discover(&mut self, snapshot: &PlaylistInfo) -> Result<usize> {
        let mut seen = HashSet::new();
        let mut added = 0;

        // Platform order is newest first.
        for remote_id in snapshot.video_ids.iter().rev() {
            if !seen.insert(remote_id.as_str()) {
                continue;
            }
            if self.store.entry(remote_id)?.is_some() {
                continue;
            }
            let entry = self.store.insert_entry(remote_id)?;
            info!("Discovered {} as #{}", remote_id, entry.sequence);
            added += 1;
        }

        debug!("Discovery added {} entries", added);
        Ok(added)
    }

    fn prune(&mut self, snapshot: &PlaylistInfo, report: &mut ReconcileReport) -> Result<()> {
        let listed: HashSet<&str> = snapshot.video_ids.iter().map(String::as_str).collect();
        let candidates = self
            .store
            .entries(EntryFilter::WithAvailability(Availability::Available))?;

        for entry in candidates
            .into_iter()
            .filter(|entry| !listed.contains(entry.remote_id.as_str()))
        {
            match self.source.availability(&entry.remote_id)? {
                Availability::Available => {
                    if let Some(file_name) = &entry.file_name {
                        self.delete_media_file(file_name)?;
                    }
                    self.store.delete_entry(&entry.remote_id)?;
                    info!("Removed #{} ({})", entry.sequence, entry.remote_id);
                    report.removed += 1;
                }
                Availability::Unavailable => {
                    self.store
                        .set_availability(&entry.remote_id, Availability::Unavailable)?;
                    info!(
                        "Archived #{} ({}): no longer available",
                        entry.sequence, entry.remote_id
                    );
                    report.marked_unavailable += 1;
                }
                Availability::Unknown => {
                    warn!(
                        "Availability of {} could not be determined; keeping it",
                        entry.remote_id
                    );
                }
            }
        }

        Ok(())
    }

    fn acquire_pending(&mut self, report: &mut ReconcileReport) -> Result<()> {
        let pending = self.store.entries(EntryFilter::PendingDownload)?;
        info!("{} entries to download", pending.len());

        for entry in pending {
            if self.acquire_entry(&entry, report)? {
                report.downloaded += 1;
            }
        }

        Ok(())
    }

    fn verify(&mut self, report: &mut ReconcileReport) -> Result<()> {
        let recorded = self.store.entries(EntryFilter::AvailableWithFile)?;

        for mut entry in recorded {
            let Some(file_name) = entry.file_name.take() else {
                continue;
            };

            let health = self.inspector.inspect(&self.media_dir.join(&file_name))?;
            if health.is_managed() {
                debug!("Verified {}", file_name);
                report.verified += 1;
                continue;
            }

            warn!("{} failed verification ({:?}); repairing", file_name, health);
            if health != FileHealth::Missing {
                self.delete_media_file(&file_name)?;
            }
            self.store.set_file_name(&entry.remote_id, None)?;

            if self.acquire_entry(&entry, report)? {
                report.repaired += 1;
            }
        }

        Ok(())
    }

    /// Acquire one entry and persist the outcome. Returns whether a file was
    /// stored.
    fn acquire_entry(&mut self, entry: &PlaylistEntry, report: &mut ReconcileReport) -> Result<bool> {
        match self.acquirer.acquire(entry)? {
            AcquireOutcome::Downloaded { file_name, title } => {
                self.store
                    .set_file_name(&entry.remote_id, Some(&file_name))?;
                self.store.set_title(&entry.remote_id, &title)?;
                Ok(true)
            }
            AcquireOutcome::StreamUnavailable { reason } => {
                warn!(
                    "Marking #{} ({}) unavailable: {}",
                    entry.sequence, entry.remote_id, reason
                );
                self.store
                    .set_availability(&entry.remote_id, Availability::Unavailable)?;
                report.marked_unavailable += 1;
                Ok(false)
            }
        }
    }

    fn delete_media_file(&self, file_name: &str) -> Result<()> {
        let path = self.media_dir.join(file_name);
        remove_if_present(&path)
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!("Deleted {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::FileSystem(FileSystemError::DeleteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })),
    }
}
