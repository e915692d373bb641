//! Test utilities and fixtures for release-fetch tests.
//!
//! This module provides common test helpers, mock factories, and
//! ledger utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use release_fetch::test_utils::{temp_ledger, mock_release};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (ledger, _dir) = temp_ledger().await;
//!     let release = mock_release(&[(1, 1), (1, 2)]);
//!     // ... test logic
//! }
//! ```

use chrono::Utc;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::catalog::Release;
use crate::db::{LedgerEntry, SqliteLedger};
use crate::model::{AlbumMeta, QualityTier, ReleaseKind, ReleaseRef, TrackMeta};

/// Id of the release built by [`mock_release`].
pub const MOCK_ALBUM_ID: &str = "album-1";

/// Creates a ledger backed by a temporary database.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Keep the TempDir
/// alive for the duration of your test.
pub async fn temp_ledger() -> (SqliteLedger, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_url = crate::db::db_url(Some(&dir.path().join("test.db")));

    let ledger = SqliteLedger::open(&db_url)
        .await
        .expect("Failed to initialize test ledger");

    (ledger, dir)
}

/// Creates a mock TrackMeta with sensible defaults.
///
/// The track belongs to "Test Album" by "Test Artist", released in 2020 in
/// CD quality. Customize using struct update syntax:
///
/// ```ignore
/// let custom = TrackMeta {
///     composer: None,
///     ..mock_track(1, 3, "Song")
/// };
/// ```
pub fn mock_track(disc: u32, number: u32, title: &str) -> TrackMeta {
    TrackMeta {
        track_id: format!("track-{}-{}", disc, number),
        album_id: MOCK_ALBUM_ID.to_string(),
        album_url: Some(format!("https://open.qobuz.com/album/{}", MOCK_ALBUM_ID)),
        album_title: "Test Album".to_string(),
        album_title_base: "Test Album".to_string(),
        album_artist: Some("Test Artist".to_string()),
        album_version: None,
        track_title: title.to_string(),
        track_title_base: title.to_string(),
        track_artist: Some("Test Artist".to_string()),
        version: None,
        track_number: Some(number),
        track_total: Some(10),
        disc_number: Some(disc),
        disc_total: Some(1),
        isrc: Some(format!("USTEST20{:05}", disc * 100 + number)),
        upc: Some("0123456789012".to_string()),
        label: Some("Test Records".to_string()),
        copyright: Some("℗ 2020 Test Records".to_string()),
        genre: Some("Rock".to_string()),
        composer: Some("Test Composer".to_string()),
        explicit: Some(false),
        release_date: Some("2020-05-01".to_string()),
        media_type: Some("album".to_string()),
        duration: Some(180),
        bit_depth: Some(16),
        sampling_rate: Some(44.1),
        available: [QualityTier::Mp3, QualityTier::Lossless].into(),
    }
}

/// Creates a mock album release with one track per `(disc, number)` pair.
///
/// Tracks are titled "Song {number}" and listed in the order given.
pub fn mock_release(layout: &[(u32, u32)]) -> Release {
    let discs: BTreeSet<u32> = layout.iter().map(|(disc, _)| *disc).collect();
    let disc_total = discs.len() as u32;

    let tracks: Vec<TrackMeta> = layout
        .iter()
        .enumerate()
        .map(|(i, (disc, number))| TrackMeta {
            track_id: format!("track-{}", i + 1),
            track_total: Some(layout.len() as u32),
            disc_total: Some(disc_total),
            ..mock_track(*disc, *number, &format!("Song {}", number))
        })
        .collect();

    let album = AlbumMeta {
        album_id: MOCK_ALBUM_ID.to_string(),
        album_url: Some(format!("https://open.qobuz.com/album/{}", MOCK_ALBUM_ID)),
        album_title: "Test Album".to_string(),
        album_title_base: "Test Album".to_string(),
        album_artist: Some("Test Artist".to_string()),
        album_version: None,
        track_total: Some(layout.len() as u32),
        disc_total: Some(disc_total),
        upc: Some("0123456789012".to_string()),
        label: Some("Test Records".to_string()),
        copyright: Some("℗ 2020 Test Records".to_string()),
        genre: Some("Rock".to_string()),
        composer: None,
        explicit: Some(false),
        release_date: Some("2020-05-01".to_string()),
        media_type: Some("album".to_string()),
        bit_depth: Some(16),
        sampling_rate: Some(44.1),
    };

    Release {
        reference: ReleaseRef::new(ReleaseKind::Album, MOCK_ALBUM_ID),
        album,
        tracks,
        goodies: Vec::new(),
        release_type: Some("album".to_string()),
        artist_name: Some("Test Artist".to_string()),
        cover_url: Some(format!(
            "https://static.qobuz.com/images/covers/al/bu/{}_600.jpg",
            MOCK_ALBUM_ID
        )),
    }
}

/// Creates a ledger entry for an album with the given id.
pub fn mock_ledger_entry(id: &str) -> LedgerEntry {
    LedgerEntry {
        id: id.to_string(),
        media_type: ReleaseKind::Album,
        quality: QualityTier::Lossless,
        saved_path: PathBuf::from("Test Artist - Test Album"),
        url: format!("https://open.qobuz.com/album/{}", id),
        release_date: Some("2020-05-01".to_string()),
        recorded_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Ledger;

    #[tokio::test]
    async fn test_temp_ledger_creates_working_database() {
        let (ledger, _dir) = temp_ledger().await;
        assert!(!ledger.contains("anything").await.unwrap());
    }

    #[test]
    fn test_mock_release_layout() {
        let release = mock_release(&[(1, 1), (1, 2), (2, 1)]);
        assert_eq!(release.tracks.len(), 3);
        assert_eq!(release.album.disc_total, Some(2));
        assert_eq!(release.tracks[2].track_title, "Song 1");
        assert_eq!(release.tracks[2].disc_number, Some(2));
        let ids: BTreeSet<_> = release.tracks.iter().map(|t| &t.track_id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_mock_track_defaults() {
        let track = mock_track(1, 7, "Song");
        assert_eq!(track.year().as_deref(), Some("2020"));
        assert_eq!(track.track_number, Some(7));
        assert!(track.isrc.is_some());
    }
}
