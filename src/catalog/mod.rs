//! Catalog domain types and collaborator errors.
//!
//! A [`Release`] is everything the download engine needs to know about one
//! album or track: album-level fields, the ordered track records and the
//! cover location. Collections (artists, labels, playlists) are first
//! expanded into a [`Collection`] of entries, each of which is then fetched
//! as its own release.
//!
//! The upstream service is reached only through the traits in [`traits`];
//! the production implementation lives in [`crate::api`].

pub mod discography;
pub mod traits;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::model::{AlbumMeta, QualityTier, ReleaseKind, ReleaseRef, TrackMeta};

pub use traits::{CatalogProvider, FileWriter, Transport};

/// Artist name used by the catalog for compilations.
pub const VARIOUS_ARTISTS: &str = "Various Artists";

/// A fetched album or single track.
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub reference: ReleaseRef,
    pub album: AlbumMeta,
    /// Streamable tracks, in catalog order
    pub tracks: Vec<TrackMeta>,
    /// Extras saved next to the tracks
    pub goodies: Vec<Goody>,
    /// Upstream release type ("album", "single", "epmini", ...)
    pub release_type: Option<String>,
    /// Main artist of the album
    pub artist_name: Option<String>,
    /// Cover URL at the catalog's default (600px) size
    pub cover_url: Option<String>,
}

impl Release {
    /// Tiers every track can be fetched in.
    ///
    /// A release without tracks has no tiers, so it resolves to a skip.
    pub fn available_tiers(&self) -> BTreeSet<QualityTier> {
        let mut tracks = self.tracks.iter();
        let Some(first) = tracks.next() else {
            return BTreeSet::new();
        };
        tracks.fold(first.available.clone(), |acc, track| {
            acc.intersection(&track.available).copied().collect()
        })
    }

    /// Whether the release passes the albums-only filter.
    pub fn is_proper_album(&self) -> bool {
        let is_album = self
            .release_type
            .as_deref()
            .is_none_or(|t| t.eq_ignore_ascii_case("album"));
        let is_compilation = self
            .artist_name
            .as_deref()
            .is_some_and(|a| a == VARIOUS_ARTISTS);
        is_album && !is_compilation
    }

    /// Number of distinct discs, taking the catalog total into account.
    pub fn disc_total(&self) -> u32 {
        let observed = self
            .tracks
            .iter()
            .map(TrackMeta::disc)
            .collect::<BTreeSet<_>>()
            .len() as u32;
        self.album.disc_total.unwrap_or(1).max(observed)
    }

    pub fn is_single_track(&self) -> bool {
        self.reference.kind == ReleaseKind::Track
    }
}

/// An album extra (booklet) published as a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goody {
    pub id: String,
    pub name: Option<String>,
    pub url: String,
}

impl Goody {
    /// File name without extension, before sanitizing.
    pub fn file_stem(&self, album_title: &str) -> String {
        format!("{} ({})", album_title, self.id)
    }
}

/// One entry of an expanded collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionEntry {
    pub reference: ReleaseRef,
    pub title: String,
    pub version: Option<String>,
    pub artist_name: Option<String>,
    pub bit_depth: Option<u8>,
    pub sampling_rate: Option<f64>,
}

impl CollectionEntry {
    /// An entry known only by its reference.
    pub fn bare(reference: ReleaseRef) -> Self {
        Self {
            reference,
            title: String::new(),
            version: None,
            artist_name: None,
            bit_depth: None,
            sampling_rate: None,
        }
    }
}

/// An artist discography, label catalog or playlist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    /// Artist or label name, or playlist title
    pub name: Option<String>,
    pub entries: Vec<CollectionEntry>,
}

// ============================================================================
// Cover sizes
// ============================================================================

/// Cover art size selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CoverSize {
    Px50,
    Px100,
    Px150,
    Px300,
    Px600,
    /// Largest rendition the catalog offers
    Max,
    /// Original upload
    Original,
}

impl CoverSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Px50 => "50",
            Self::Px100 => "100",
            Self::Px150 => "150",
            Self::Px300 => "300",
            Self::Px600 => "600",
            Self::Max => "max",
            Self::Original => "org",
        }
    }

    /// Rewrite a default-size cover URL to this size.
    pub fn apply(&self, url: &str) -> String {
        url.replace("_600.", &format!("_{}.", self.as_str()))
    }
}

impl fmt::Display for CoverSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoverSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "50" => Ok(Self::Px50),
            "100" => Ok(Self::Px100),
            "150" => Ok(Self::Px150),
            "300" => Ok(Self::Px300),
            "600" => Ok(Self::Px600),
            "max" => Ok(Self::Max),
            "org" => Ok(Self::Original),
            other => Err(format!("unknown cover size '{}'", other)),
        }
    }
}

impl TryFrom<String> for CoverSize {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CoverSize> for String {
    fn from(size: CoverSize) -> Self {
        size.as_str().to_string()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors from the catalog provider. All are per-release and non-fatal.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: check the user auth token or credentials")]
    Unauthorized,

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Invalid app id")]
    InvalidAppId,

    #[error("Not streamable: {0}")]
    NotStreamable(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// Errors fetching audio or cover bytes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("No stream for track {0}")]
    NoStream(String),

    #[error("No cover available")]
    NoCover,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors writing files to disk.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to tag {path}: {message}")]
    Tag { path: PathBuf, message: String },

    #[error("Writer task failed: {0}")]
    TaskJoin(String),
}

impl WriteError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
