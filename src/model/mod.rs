//! Core data models for release resolution.
//!
//! Defines the entities the download engine passes around:
//! - [`ReleaseRef`] - a parsed input reference (album, track, artist, ...)
//! - [`QualityTier`] - the ordered set of audio fidelity levels
//! - [`AlbumMeta`] / [`TrackMeta`] - flat, explicitly declared field records
//! - [`DiscGroup`] - tracks of one release sharing a disc number
//!
//! Every record is built once from catalog data and never mutated afterwards.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{Error, Result};

// ============================================================================
// Release references
// ============================================================================

/// What a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    Track,
    Album,
    Artist,
    Label,
    Playlist,
}

impl ReleaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Artist => "artist",
            Self::Label => "label",
            Self::Playlist => "playlist",
        }
    }

    /// Collections resolve to several releases before anything is downloaded.
    pub fn is_collection(&self) -> bool {
        matches!(self, Self::Artist | Self::Label | Self::Playlist)
    }
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "artist" => Ok(Self::Artist),
            "label" => Ok(Self::Label),
            "playlist" => Ok(Self::Playlist),
            other => Err(Error::invalid_reference(other)),
        }
    }
}

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:https://(?:www|open|play)\.qobuz\.com)?(?:/[a-z]{2}-[a-z]{2})?/(album|artist|track|playlist|label)(?:/[-\w]+)?/(\w+)",
    )
    .expect("release URL pattern is valid")
});

/// A resolvable unit, identified by kind and opaque upstream id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseRef {
    pub kind: ReleaseKind,
    pub id: String,
    pub url: String,
}

impl ReleaseRef {
    /// Build a reference for an id obtained from the catalog itself.
    pub fn new(kind: ReleaseKind, id: impl Into<String>) -> Self {
        let id = id.into();
        let url = format!("https://open.qobuz.com/{}/{}", kind, id);
        Self { kind, id, url }
    }

    /// Parse a store, player or relative URL.
    ///
    /// Accepted shapes:
    /// - `https://www.qobuz.com/us-en/album/some-name/0060254735180`
    /// - `https://open.qobuz.com/track/52151405`
    /// - `https://play.qobuz.com/artist/36819`
    /// - `/us-en/label/-/1153`
    pub fn parse(url: &str) -> Result<Self> {
        let url = url.trim();
        let caps = URL_PATTERN
            .captures(url)
            .ok_or_else(|| Error::invalid_reference(url))?;
        let kind = caps[1].parse()?;
        Ok(Self {
            kind,
            id: caps[2].to_string(),
            url: url.to_string(),
        })
    }
}

impl fmt::Display for ReleaseRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

// ============================================================================
// Quality tiers
// ============================================================================

/// Audio fidelity levels, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum QualityTier {
    /// 320 kbps MP3
    Mp3,
    /// 16 bit / 44.1 kHz FLAC
    Lossless,
    /// 24 bit up to 96 kHz FLAC
    HiRes96,
    /// 24 bit up to 192 kHz FLAC
    HiRes192,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [Self::Mp3, Self::Lossless, Self::HiRes96, Self::HiRes192];

    /// Upstream format id.
    pub fn format_id(&self) -> u8 {
        match self {
            Self::Mp3 => 5,
            Self::Lossless => 6,
            Self::HiRes96 => 7,
            Self::HiRes192 => 27,
        }
    }

    pub fn from_format_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|tier| tier.format_id() == id)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            _ => "flac",
        }
    }

    /// Container label used in folder names (`{format}`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mp3 => "MP3",
            _ => "FLAC",
        }
    }

    /// Bit depth and sampling rate (kHz) a file of this tier actually has,
    /// given the maximum the source offers.
    pub fn effective(
        &self,
        bit_depth: Option<u8>,
        sampling_rate: Option<f64>,
    ) -> (Option<u8>, Option<f64>) {
        let cap = |value: Option<f64>, max: f64| Some(value.map_or(max, |v| v.min(max)));
        match self {
            Self::Mp3 => (None, None),
            Self::Lossless => (Some(16), cap(sampling_rate, 44.1)),
            Self::HiRes96 => (
                Some(bit_depth.map_or(24, |b| b.min(24))),
                cap(sampling_rate, 96.0),
            ),
            Self::HiRes192 => (bit_depth.or(Some(24)), sampling_rate.or(Some(192.0))),
        }
    }

    /// Tiers a source can be streamed in, from its maximum resolution.
    pub fn available_from(
        streamable: bool,
        bit_depth: Option<u8>,
        sampling_rate: Option<f64>,
    ) -> BTreeSet<QualityTier> {
        let mut tiers = BTreeSet::new();
        if !streamable {
            return tiers;
        }
        tiers.insert(Self::Mp3);
        tiers.insert(Self::Lossless);
        if bit_depth.unwrap_or(16) >= 24 {
            tiers.insert(Self::HiRes96);
            if sampling_rate.unwrap_or(0.0) > 96.0 {
                tiers.insert(Self::HiRes192);
            }
        }
        tiers
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mp3 => "MP3 320",
            Self::Lossless => "FLAC 16/44.1",
            Self::HiRes96 => "FLAC 24/96",
            Self::HiRes192 => "FLAC 24/192",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Named fields
// ============================================================================

/// Field values keyed by template name.
pub type FieldMap = BTreeMap<&'static str, String>;

/// Every field name a naming pattern may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    AlbumId,
    AlbumUrl,
    AlbumTitle,
    AlbumTitleBase,
    AlbumArtist,
    AlbumVersion,
    TrackId,
    TrackTitle,
    TrackTitleBase,
    TrackArtist,
    Version,
    TrackNumber,
    TrackTotal,
    DiscNumber,
    DiscTotal,
    Isrc,
    Upc,
    Barcode,
    Label,
    Copyright,
    Genre,
    Composer,
    Explicit,
    ReleaseDate,
    Year,
    MediaType,
    Format,
    BitDepth,
    SamplingRate,
}

impl Field {
    pub const ALL: [Field; 29] = [
        Self::AlbumId,
        Self::AlbumUrl,
        Self::AlbumTitle,
        Self::AlbumTitleBase,
        Self::AlbumArtist,
        Self::AlbumVersion,
        Self::TrackId,
        Self::TrackTitle,
        Self::TrackTitleBase,
        Self::TrackArtist,
        Self::Version,
        Self::TrackNumber,
        Self::TrackTotal,
        Self::DiscNumber,
        Self::DiscTotal,
        Self::Isrc,
        Self::Upc,
        Self::Barcode,
        Self::Label,
        Self::Copyright,
        Self::Genre,
        Self::Composer,
        Self::Explicit,
        Self::ReleaseDate,
        Self::Year,
        Self::MediaType,
        Self::Format,
        Self::BitDepth,
        Self::SamplingRate,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AlbumId => "album_id",
            Self::AlbumUrl => "album_url",
            Self::AlbumTitle => "album_title",
            Self::AlbumTitleBase => "album_title_base",
            Self::AlbumArtist => "album_artist",
            Self::AlbumVersion => "album_version",
            Self::TrackId => "track_id",
            Self::TrackTitle => "track_title",
            Self::TrackTitleBase => "track_title_base",
            Self::TrackArtist => "track_artist",
            Self::Version => "version",
            Self::TrackNumber => "track_number",
            Self::TrackTotal => "track_total",
            Self::DiscNumber => "disc_number",
            Self::DiscTotal => "disc_total",
            Self::Isrc => "isrc",
            Self::Upc => "upc",
            Self::Barcode => "barcode",
            Self::Label => "label",
            Self::Copyright => "copyright",
            Self::Genre => "genre",
            Self::Composer => "composer",
            Self::Explicit => "explicit",
            Self::ReleaseDate => "release_date",
            Self::Year => "year",
            Self::MediaType => "media_type",
            Self::Format => "format",
            Self::BitDepth => "bit_depth",
            Self::SamplingRate => "sampling_rate",
        }
    }

    /// Look a field up by template name. `disc_count` and `track_count`
    /// are accepted as older spellings of the totals.
    pub fn from_name(name: &str) -> Option<Field> {
        match name {
            "disc_count" => Some(Self::DiscTotal),
            "track_count" => Some(Self::TrackTotal),
            _ => Self::ALL.into_iter().find(|f| f.name() == name),
        }
    }
}

// ============================================================================
// Album and track records
// ============================================================================

/// Album-level fields, used to name the release folder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumMeta {
    pub album_id: String,
    pub album_url: Option<String>,
    /// Title including the version suffix when there is one
    pub album_title: String,
    /// Title without any version suffix
    pub album_title_base: String,
    pub album_artist: Option<String>,
    pub album_version: Option<String>,
    pub track_total: Option<u32>,
    pub disc_total: Option<u32>,
    pub upc: Option<String>,
    pub label: Option<String>,
    pub copyright: Option<String>,
    pub genre: Option<String>,
    pub composer: Option<String>,
    pub explicit: Option<bool>,
    pub release_date: Option<String>,
    pub media_type: Option<String>,
    pub bit_depth: Option<u8>,
    pub sampling_rate: Option<f64>,
}

impl AlbumMeta {
    pub fn year(&self) -> Option<String> {
        year_of(self.release_date.as_deref())
    }

    /// Folder-name fields for a download at `tier`.
    pub fn template_fields(&self, tier: QualityTier) -> FieldMap {
        let (bit_depth, sampling_rate) = tier.effective(self.bit_depth, self.sampling_rate);
        let mut fields = FieldMap::new();
        put(&mut fields, Field::AlbumId, Some(self.album_id.clone()));
        put(&mut fields, Field::AlbumUrl, self.album_url.clone());
        put(&mut fields, Field::AlbumTitle, Some(self.album_title.clone()));
        put(&mut fields, Field::AlbumTitleBase, Some(self.album_title_base.clone()));
        put(&mut fields, Field::AlbumArtist, self.album_artist.clone());
        put(&mut fields, Field::AlbumVersion, self.album_version.clone());
        put(&mut fields, Field::TrackTotal, self.track_total.map(|n| n.to_string()));
        put(&mut fields, Field::DiscTotal, self.disc_total.map(|n| n.to_string()));
        put(&mut fields, Field::Upc, self.upc.clone());
        put(&mut fields, Field::Barcode, self.upc.clone());
        put(&mut fields, Field::Label, self.label.clone());
        put(&mut fields, Field::Copyright, self.copyright.clone());
        put(&mut fields, Field::Genre, self.genre.clone());
        put(&mut fields, Field::Composer, self.composer.clone());
        put(&mut fields, Field::Explicit, self.explicit.map(explicit_flag));
        put(&mut fields, Field::ReleaseDate, self.release_date.clone());
        put(&mut fields, Field::Year, self.year());
        put(&mut fields, Field::MediaType, self.media_type.as_deref().map(capitalize));
        put(&mut fields, Field::Format, Some(tier.label().to_string()));
        put(&mut fields, Field::BitDepth, bit_depth.map(|b| b.to_string()));
        put(&mut fields, Field::SamplingRate, sampling_rate.map(format_rate));
        fields
    }
}

/// Flat per-track record. Album-level values are copied in so a track can be
/// named and tagged without its release.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMeta {
    pub track_id: String,
    pub album_id: String,
    pub album_url: Option<String>,
    pub album_title: String,
    pub album_title_base: String,
    pub album_artist: Option<String>,
    pub album_version: Option<String>,
    /// Title including version (and work, for classical releases)
    pub track_title: String,
    /// Title exactly as the catalog lists it
    pub track_title_base: String,
    pub track_artist: Option<String>,
    pub version: Option<String>,
    pub track_number: Option<u32>,
    pub track_total: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_total: Option<u32>,
    pub isrc: Option<String>,
    pub upc: Option<String>,
    pub label: Option<String>,
    pub copyright: Option<String>,
    pub genre: Option<String>,
    pub composer: Option<String>,
    pub explicit: Option<bool>,
    pub release_date: Option<String>,
    pub media_type: Option<String>,
    /// Length in seconds
    pub duration: Option<u32>,
    pub bit_depth: Option<u8>,
    pub sampling_rate: Option<f64>,
    /// Tiers this track can be fetched in
    pub available: BTreeSet<QualityTier>,
}

impl TrackMeta {
    pub fn year(&self) -> Option<String> {
        year_of(self.release_date.as_deref())
    }

    /// Disc number with the single-disc default applied.
    pub fn disc(&self) -> u32 {
        self.disc_number.unwrap_or(1)
    }

    /// Raw catalog value of a field, unpadded and unformatted.
    ///
    /// `Format` has no per-track value; it depends on the tier chosen.
    pub fn value(&self, field: Field) -> Option<String> {
        match field {
            Field::AlbumId => Some(self.album_id.clone()),
            Field::AlbumUrl => self.album_url.clone(),
            Field::AlbumTitle => Some(self.album_title.clone()),
            Field::AlbumTitleBase => Some(self.album_title_base.clone()),
            Field::AlbumArtist => self.album_artist.clone(),
            Field::AlbumVersion => self.album_version.clone(),
            Field::TrackId => Some(self.track_id.clone()),
            Field::TrackTitle => Some(self.track_title.clone()),
            Field::TrackTitleBase => Some(self.track_title_base.clone()),
            Field::TrackArtist => self.track_artist.clone(),
            Field::Version => self.version.clone(),
            Field::TrackNumber => self.track_number.map(|n| n.to_string()),
            Field::TrackTotal => self.track_total.map(|n| n.to_string()),
            Field::DiscNumber => self.disc_number.map(|n| n.to_string()),
            Field::DiscTotal => self.disc_total.map(|n| n.to_string()),
            Field::Isrc => self.isrc.clone(),
            Field::Upc | Field::Barcode => self.upc.clone(),
            Field::Label => self.label.clone(),
            Field::Copyright => self.copyright.clone(),
            Field::Genre => self.genre.clone(),
            Field::Composer => self.composer.clone(),
            Field::Explicit => self.explicit.map(explicit_flag),
            Field::ReleaseDate => self.release_date.clone(),
            Field::Year => self.year(),
            Field::MediaType => self.media_type.clone(),
            Field::Format => None,
            Field::BitDepth => self.bit_depth.map(|b| b.to_string()),
            Field::SamplingRate => self.sampling_rate.map(format_rate),
        }
    }

    /// File-name fields for a download at `tier`. Track and disc numbers are
    /// zero-padded to two digits.
    pub fn template_fields(&self, tier: QualityTier) -> FieldMap {
        let (bit_depth, sampling_rate) = tier.effective(self.bit_depth, self.sampling_rate);
        let mut fields = FieldMap::new();
        for field in Field::ALL {
            put(&mut fields, field, self.value(field));
        }
        put(&mut fields, Field::TrackNumber, self.track_number.map(|n| format!("{:02}", n)));
        put(&mut fields, Field::DiscNumber, Some(format!("{:02}", self.disc())));
        put(&mut fields, Field::MediaType, self.media_type.as_deref().map(capitalize));
        put(&mut fields, Field::Format, Some(tier.label().to_string()));
        put(&mut fields, Field::BitDepth, bit_depth.map(|b| b.to_string()));
        put(&mut fields, Field::SamplingRate, sampling_rate.map(format_rate));
        fields
    }
}

/// Tracks of one release that share a disc number.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscGroup {
    pub disc_number: u32,
    pub tracks: Vec<TrackMeta>,
}

/// Group tracks by disc, in ascending disc order.
///
/// A track without a disc number belongs to disc 1. Within a disc, tracks are
/// ordered by track number; equal (or missing) numbers keep catalog order.
pub fn group_discs(tracks: &[TrackMeta]) -> Vec<DiscGroup> {
    let mut discs: BTreeMap<u32, Vec<TrackMeta>> = BTreeMap::new();
    for track in tracks {
        discs.entry(track.disc()).or_default().push(track.clone());
    }

    discs
        .into_iter()
        .map(|(disc_number, mut tracks)| {
            // sort_by_key is stable, so ties stay in catalog order
            tracks.sort_by_key(|t| t.track_number.unwrap_or(u32::MAX));
            DiscGroup {
                disc_number,
                tracks,
            }
        })
        .collect()
}

// ============================================================================
// Helpers
// ============================================================================

fn put(fields: &mut FieldMap, field: Field, value: Option<String>) {
    fields.insert(field.name(), value.unwrap_or_default());
}

fn year_of(date: Option<&str>) -> Option<String> {
    date.and_then(|d| d.split('-').next())
        .filter(|y| !y.is_empty())
        .map(str::to_string)
}

fn explicit_flag(explicit: bool) -> String {
    if explicit { "1" } else { "0" }.to_string()
}

/// `44.1` stays `44.1`, `96.0` becomes `96`.
fn format_rate(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{}", rate as u64)
    } else {
        format!("{}", rate)
    }
}

fn capitalize(s: &str) -> String {
    let lower = s.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
