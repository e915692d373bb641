//! Adapter: Converts upstream DTOs to domain types
//!
//! This is the ONLY place where DTO types are converted to domain types.
//! If the upstream API changes, only this file and dto.rs need updating.

use regex::Regex;
use std::sync::LazyLock;

use super::dto;
use crate::catalog::{CatalogError, CollectionEntry, Goody, Release};
use crate::model::{AlbumMeta, QualityTier, ReleaseKind, ReleaseRef, TrackMeta};

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

const MAIN_ARTIST_ROLE: &str = "main-artist";

/// Convert an `album/get` response into a release.
///
/// Tracks the catalog marks as not streamable are dropped.
pub fn to_release(reference: ReleaseRef, album: dto::Album) -> Result<Release, CatalogError> {
    if album.streamable == Some(false) {
        return Err(CatalogError::NotStreamable(album.title));
    }

    let meta = to_album_meta(&album);
    let items = album.tracks.as_ref().map(|p| p.items.as_slice()).unwrap_or_default();
    let tracks = items
        .iter()
        .filter(|track| {
            let streamable = track.streamable != Some(false);
            if !streamable {
                tracing::debug!(track = %track.id, "Dropping non-streamable track");
            }
            streamable
        })
        .map(|track| to_track_meta(&meta, &album, track))
        .collect();

    Ok(Release {
        reference,
        tracks,
        goodies: goodies(&album),
        release_type: album.release_type.clone(),
        artist_name: album.artist.as_ref().map(|a| a.name.clone()),
        cover_url: cover_url(&album),
        album: meta,
    })
}

/// Convert a `track/get` response into a single-track release.
pub fn track_release(reference: ReleaseRef, track: dto::Track) -> Result<Release, CatalogError> {
    if track.streamable == Some(false) {
        return Err(CatalogError::NotStreamable(track.title));
    }
    let album = track
        .album
        .as_deref()
        .ok_or_else(|| CatalogError::Parse(format!("track {} has no album", track.id)))?;

    let meta = to_album_meta(album);
    let track_meta = to_track_meta(&meta, album, &track);

    Ok(Release {
        reference,
        tracks: vec![track_meta],
        goodies: Vec::new(),
        release_type: album.release_type.clone(),
        artist_name: album.artist.as_ref().map(|a| a.name.clone()),
        cover_url: cover_url(album),
        album: meta,
    })
}

/// Album listing entry from an artist or label page.
pub fn album_entry(album: &dto::Album) -> CollectionEntry {
    CollectionEntry {
        reference: ReleaseRef::new(ReleaseKind::Album, album.id.clone()),
        title: album.title.clone(),
        version: non_empty(album.version.as_deref()),
        artist_name: album.artist.as_ref().map(|a| a.name.clone()),
        bit_depth: album.maximum_bit_depth,
        sampling_rate: album.maximum_sampling_rate,
    }
}

/// Playlist item.
pub fn track_entry(track: &dto::Track) -> CollectionEntry {
    CollectionEntry {
        reference: ReleaseRef::new(ReleaseKind::Track, track.id.clone()),
        title: track.title.clone(),
        version: non_empty(track.version.as_deref()),
        artist_name: track.performer.as_ref().map(|p| p.name.clone()),
        bit_depth: track.maximum_bit_depth,
        sampling_rate: track.maximum_sampling_rate,
    }
}

fn to_album_meta(album: &dto::Album) -> AlbumMeta {
    let version = non_empty(album.version.as_deref());
    AlbumMeta {
        album_id: album.id.clone(),
        album_url: album.url.clone(),
        album_title: title_with_version(&album.title, version.as_deref()),
        album_title_base: album.title.clone(),
        album_artist: album_artist(album),
        album_version: version,
        track_total: album.tracks_count,
        disc_total: album.media_count,
        upc: non_empty(album.upc.as_deref()),
        label: album.label.as_ref().map(|l| clean_label(&l.name)),
        copyright: album.copyright.as_deref().map(format_copyright),
        genre: format_genres(&album.genres_list),
        composer: album.composer.as_ref().map(|c| c.name.clone()),
        explicit: album.parental_warning,
        release_date: non_empty(album.release_date_original.as_deref()),
        media_type: non_empty(album.product_type.as_deref()),
        bit_depth: album.maximum_bit_depth,
        sampling_rate: album.maximum_sampling_rate,
    }
}

fn to_track_meta(meta: &AlbumMeta, album: &dto::Album, track: &dto::Track) -> TrackMeta {
    let bit_depth = track.maximum_bit_depth.or(meta.bit_depth);
    let sampling_rate = track.maximum_sampling_rate.or(meta.sampling_rate);
    let track_artist = track
        .performer
        .as_ref()
        .map(|p| p.name.clone())
        .or_else(|| album.artist.as_ref().map(|a| a.name.clone()));

    TrackMeta {
        track_id: track.id.clone(),
        album_id: meta.album_id.clone(),
        album_url: meta.album_url.clone(),
        album_title: meta.album_title.clone(),
        album_title_base: meta.album_title_base.clone(),
        album_artist: meta.album_artist.clone().or_else(|| track_artist.clone()),
        album_version: meta.album_version.clone(),
        track_title: track_title(track),
        track_title_base: track.title.clone(),
        track_artist,
        version: non_empty(track.version.as_deref()),
        track_number: track.track_number,
        track_total: meta.track_total,
        disc_number: track.media_number,
        disc_total: meta.disc_total,
        isrc: non_empty(track.isrc.as_deref()),
        upc: meta.upc.clone(),
        label: meta.label.clone(),
        copyright: meta.copyright.clone(),
        genre: meta.genre.clone(),
        composer: track.composer.as_ref().map(|c| c.name.clone()),
        explicit: track.parental_warning.or(meta.explicit),
        release_date: meta
            .release_date
            .clone()
            .or_else(|| non_empty(track.release_date_original.as_deref())),
        media_type: meta.media_type.clone(),
        duration: track.duration,
        bit_depth,
        sampling_rate,
        available: QualityTier::available_from(
            track.streamable.unwrap_or(true),
            bit_depth,
            sampling_rate,
        ),
    }
}

/// Album extras that can be downloaded. Entries without a URL are skipped.
fn goodies(album: &dto::Album) -> Vec<Goody> {
    album
        .goodies
        .iter()
        .filter_map(|goody| match non_empty(goody.url.as_deref()) {
            Some(url) => Some(Goody {
                id: goody.id.clone(),
                name: non_empty(goody.name.as_deref()),
                url,
            }),
            None => {
                tracing::warn!(goody = %goody.id, "No URL for album extra, skipping");
                None
            }
        })
        .collect()
}

/// Main artists joined as "A, B & C", or the album artist.
fn album_artist(album: &dto::Album) -> Option<String> {
    let main: Vec<&str> = album
        .artists
        .iter()
        .filter(|a| a.roles.iter().any(|r| r == MAIN_ARTIST_ROLE))
        .map(|a| a.name.as_str())
        .collect();

    match main.split_last() {
        Some((last, rest)) if !rest.is_empty() => Some(format!("{} & {}", rest.join(", "), last)),
        _ => album.artist.as_ref().map(|a| a.name.clone()),
    }
}

/// Append the version in parentheses unless the title already carries it.
fn title_with_version(title: &str, version: Option<&str>) -> String {
    match version {
        Some(v) if !title.to_lowercase().contains(&v.to_lowercase()) => {
            format!("{} ({})", title, v)
        }
        _ => title.to_string(),
    }
}

/// Full track title, prefixed with the work for classical releases.
fn track_title(track: &dto::Track) -> String {
    let title = title_with_version(&track.title, non_empty(track.version.as_deref()).as_deref());
    match non_empty(track.work.as_deref()) {
        Some(work) => format!("{}: {}", work, title),
        None => title,
    }
}

/// Flatten hierarchical genre paths (`Pop/Rock→Rock`) into a unique list.
fn format_genres(genres: &[String]) -> Option<String> {
    let mut unique: Vec<&str> = Vec::new();
    for genre in genres {
        for part in genre.split(['/', '→']).map(str::trim) {
            if !part.is_empty() && !unique.contains(&part) {
                unique.push(part);
            }
        }
    }
    (!unique.is_empty()).then(|| unique.join(", "))
}

fn format_copyright(copyright: &str) -> String {
    copyright.replace("(P)", "℗").replace("(C)", "©")
}

fn clean_label(label: &str) -> String {
    WHITESPACE.replace_all(label.trim(), " ").into_owned()
}

fn cover_url(album: &dto::Album) -> Option<String> {
    album.image.as_ref().and_then(|i| i.large.clone())
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
