//! YTFlux Core Library
//!
//! This crate keeps a local directory of audio files in sync with a remote
//! `YouTube` playlist:
//! - State store recording the playlist and one entry per known video
//! - Reconciliation engine (discovery, pruning, acquisition, verification)
//! - Acquisition pipeline producing tagged m4a files with a managed-file marker
//! - `YouTube` source built on `rusty_ytdl` and playlist page scraping

pub mod acquire;
pub mod config;
pub mod entry;
pub mod error;
pub mod metadata;
pub mod reconcile;
pub mod store;
pub mod thumbnail;
pub mod youtube;

pub use acquire::{AcquireOutcome, Acquirer, AcquisitionPipeline};
pub use config::AppConfig;
pub use entry::{Availability, EntryFilter, PlaylistEntry};
pub use error::{Error, Result};
pub use metadata::{FileHealth, MediaInspector, Mp4Inspector};
pub use reconcile::{ReconcileReport, Reconciler, SyncPhase};
pub use store::{MemoryStateStore, SqliteStateStore, StateStore};
pub use youtube::{PlaylistInfo, PlaylistSource, VideoDetails, YouTubeSource};
