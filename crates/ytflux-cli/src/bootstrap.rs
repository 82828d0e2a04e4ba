//! First-run capture of the playlist to mirror.

use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use ytflux_core::youtube::parse_playlist_reference;
use ytflux_core::{PlaylistSource, StateStore};

/// Make sure the store has a playlist configured and return its ID.
///
/// A configured playlist always wins. Otherwise `requested` is used, and
/// without it the user is prompted on `input` until they enter a playlist
/// the source can resolve.
pub fn ensure_playlist<S, R, I, O>(
    store: &mut S,
    source: &R,
    requested: Option<&str>,
    mut input: I,
    mut output: O,
) -> Result<String>
where
    S: StateStore + ?Sized,
    R: PlaylistSource + ?Sized,
    I: BufRead,
    O: Write,
{
    if let Some(configured) = store.playlist_id()? {
        if let Some(requested) = requested
            && parse_playlist_reference(requested).ok().as_deref() != Some(configured.as_str())
        {
            bail!(
                "this data directory already mirrors playlist {configured}; use another --data-dir for {requested}"
            );
        }
        return Ok(configured);
    }

    if let Some(requested) = requested {
        let (playlist_id, title) = resolve(source, requested)?;
        store.set_playlist_id(&playlist_id)?;
        writeln!(output, "Mirroring playlist '{title}' ({playlist_id})")?;
        return Ok(playlist_id);
    }

    loop {
        write!(output, "YouTube playlist URL or ID: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line).context("failed to read playlist")? == 0 {
            bail!("no playlist configured");
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match resolve(source, line) {
            Ok((playlist_id, title)) => {
                store.set_playlist_id(&playlist_id)?;
                writeln!(output, "Mirroring playlist '{title}' ({playlist_id})")?;
                return Ok(playlist_id);
            }
            Err(e) => {
                warn!("Rejected playlist input {:?}: {:#}", line, e);
                writeln!(output, "{e:#}")?;
            }
        }
    }
}

/// Parse user input and check the playlist actually resolves.
fn resolve<R: PlaylistSource + ?Sized>(source: &R, input: &str) -> Result<(String, String)> {
    let playlist_id = parse_playlist_reference(input)?;
    let playlist = source
        .playlist(&playlist_id)
        .with_context(|| format!("could not load playlist {playlist_id}"))?;
    info!(
        "Resolved playlist {} with {} videos",
        playlist_id,
        playlist.video_ids.len()
    );
    Ok((playlist_id, playlist.title))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::Path;
    use ytflux_core::error::DownloadError;
    use ytflux_core::{Availability, Error, MemoryStateStore, PlaylistInfo, VideoDetails};

    /// Knows exactly one playlist.
    struct OnePlaylist;

    impl PlaylistSource for OnePlaylist {
        fn playlist(&self, playlist_id: &str) -> ytflux_core::Result<PlaylistInfo> {
            if playlist_id == "PLgood" {
                Ok(PlaylistInfo {
                    id: playlist_id.to_string(),
                    title: "Good".to_string(),
                    video_ids: vec!["aaaaaaaaaaa".to_string()],
                })
            } else {
                Err(Error::Download(DownloadError::PlaylistParseFailed {
                    playlist_id: playlist_id.to_string(),
                    reason: "not found".to_string(),
                }))
            }
        }

        fn availability(&self, _: &str) -> ytflux_core::Result<Availability> {
            unreachable!()
        }

        fn video_details(&self, _: &str) -> ytflux_core::Result<VideoDetails> {
            unreachable!()
        }

        fn download_audio(&self, _: &str, _: &Path) -> ytflux_core::Result<u64> {
            unreachable!()
        }

        fn fetch_thumbnail(&self, _: &str) -> ytflux_core::Result<Vec<u8>> {
            unreachable!()
        }
    }

    #[test]
    fn test_prompt_retries_until_playlist_resolves() {
        let mut store = MemoryStateStore::new();
        let input = b"not a url!\nPLmissing\n\nhttps://www.youtube.com/playlist?list=PLgood\n";
        let mut output = Vec::new();

        let id = ensure_playlist(&mut store, &OnePlaylist, None, &input[..], &mut output).unwrap();

        assert_eq!(id, "PLgood");
        assert_eq!(store.playlist_id().unwrap().as_deref(), Some("PLgood"));
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("could not load playlist PLmissing"));
        assert!(shown.contains("Mirroring playlist 'Good'"));
    }

    #[test]
    fn test_end_of_input_aborts() {
        let mut store = MemoryStateStore::new();
        let result = ensure_playlist(&mut store, &OnePlaylist, None, &b""[..], Vec::new());
        assert!(result.is_err());
        assert_eq!(store.playlist_id().unwrap(), None);
    }

    #[test]
    fn test_flag_is_used_without_prompting() {
        let mut store = MemoryStateStore::new();
        let id = ensure_playlist(&mut store, &OnePlaylist, Some("PLgood"), &b""[..], Vec::new())
            .unwrap();
        assert_eq!(id, "PLgood");
    }

    #[test]
    fn test_unresolvable_flag_is_an_error() {
        let mut store = MemoryStateStore::new();
        assert!(
            ensure_playlist(&mut store, &OnePlaylist, Some("PLmissing"), &b""[..], Vec::new())
                .is_err()
        );
        assert_eq!(store.playlist_id().unwrap(), None);
    }

    #[test]
    fn test_configured_playlist_wins() {
        let mut store = MemoryStateStore::with_playlist("PLgood");
        let id = ensure_playlist(&mut store, &OnePlaylist, None, &b""[..], Vec::new()).unwrap();
        assert_eq!(id, "PLgood");

        assert!(
            ensure_playlist(&mut store, &OnePlaylist, Some("PLother"), &b""[..], Vec::new())
                .is_err()
        );
    }
}
