use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use ytflux_core::{
    AcquisitionPipeline, AppConfig, Availability, EntryFilter, Mp4Inspector, PlaylistEntry,
    Reconciler, SqliteStateStore, StateStore, YouTubeSource,
};

use crate::bootstrap::ensure_playlist;

pub fn open_store(config: &AppConfig) -> Result<SqliteStateStore> {
    let path = config.database_path();
    SqliteStateStore::open(&path)
        .with_context(|| format!("failed to open state database {}", path.display()))
}

pub fn run_sync(config: &AppConfig, requested_playlist: Option<&str>) -> Result<()> {
    let mut store = open_store(config)?;
    let source =
        YouTubeSource::with_thumbnail_timeout(Duration::from_secs(config.thumbnail_timeout_secs))
            .context("failed to initialize YouTube client")?;

    let stdin = io::stdin();
    let playlist_id = ensure_playlist(
        &mut store,
        &source,
        requested_playlist,
        stdin.lock(),
        io::stdout(),
    )?;

    let media_dir = config.media_dir();
    std::fs::create_dir_all(&media_dir)
        .with_context(|| format!("failed to create media directory {}", media_dir.display()))?;
    info!(
        "Syncing playlist {} into {}",
        playlist_id,
        media_dir.display()
    );

    let mut acquirer =
        AcquisitionPipeline::new(&source, &media_dir).with_cover_format(config.cover_format);
    let inspector = Mp4Inspector;
    let report = Reconciler::new(&mut store, &source, &mut acquirer, &inspector, &media_dir)
        .run()
        .with_context(|| format!("sync of playlist {playlist_id} aborted"))?;

    println!("{}", report.summary());
    Ok(())
}

pub fn run_status(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let mut out = io::stdout().lock();
    write_status(&store, &config.media_dir(), &mut out)
}

fn write_status<S: StateStore + ?Sized, W: Write>(
    store: &S,
    media_dir: &Path,
    out: &mut W,
) -> Result<()> {
    let Some(playlist_id) = store.playlist_id()? else {
        writeln!(out, "No playlist configured. Run `ytflux sync` to set one up.")?;
        return Ok(());
    };

    let entries = store.entries(EntryFilter::All)?;
    writeln!(out, "Playlist: {playlist_id}")?;
    writeln!(out, "Media:    {}", media_dir.display())?;
    writeln!(out)?;

    for entry in &entries {
        writeln!(out, "{}", status_line(entry))?;
    }

    let count = |availability: Availability| {
        entries
            .iter()
            .filter(|e| e.availability == availability)
            .count()
    };
    let downloaded = entries.iter().filter(|e| e.file_name.is_some()).count();
    writeln!(out)?;
    writeln!(
        out,
        "{} entries: {} downloaded, {} available, {} unavailable",
        entries.len(),
        downloaded,
        count(Availability::Available),
        count(Availability::Unavailable)
    )?;
    Ok(())
}

fn status_line(entry: &PlaylistEntry) -> String {
    format!(
        "{:05}  {}  {:<11}  {}",
        entry.sequence,
        entry.remote_id,
        entry.availability,
        entry.file_name.as_deref().unwrap_or("-")
    )
}
