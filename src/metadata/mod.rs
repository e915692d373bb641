//! Tag assembly.
//!
//! Turns a [`TrackMeta`] into the set of tags written into the audio file.
//! Each tag can be switched off individually through [`TagToggles`]; a tag
//! whose value the catalog did not provide is omitted even when enabled.
//!
//! Titles always carry the version suffix (`TITLE` is the full track title,
//! `ALBUM` the full album title). Numbers are written unpadded.
//!
//! The file side lives in [`writer`], which maps [`TagName`]s onto lofty
//! item keys.

pub mod writer;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::ConfigError;
use crate::model::TrackMeta;

/// Canonical tag names, as they appear in Vorbis comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagName {
    Album,
    AlbumArtist,
    Artist,
    Title,
    TrackNumber,
    TrackTotal,
    DiscNumber,
    DiscTotal,
    Composer,
    Date,
    Year,
    Genre,
    Copyright,
    Label,
    Isrc,
    Barcode,
    MediaType,
    ItunesAdvisory,
}

impl TagName {
    pub const ALL: [TagName; 18] = [
        Self::Album,
        Self::AlbumArtist,
        Self::Artist,
        Self::Title,
        Self::TrackNumber,
        Self::TrackTotal,
        Self::DiscNumber,
        Self::DiscTotal,
        Self::Composer,
        Self::Date,
        Self::Year,
        Self::Genre,
        Self::Copyright,
        Self::Label,
        Self::Isrc,
        Self::Barcode,
        Self::MediaType,
        Self::ItunesAdvisory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Album => "ALBUM",
            Self::AlbumArtist => "ALBUMARTIST",
            Self::Artist => "ARTIST",
            Self::Title => "TITLE",
            Self::TrackNumber => "TRACKNUMBER",
            Self::TrackTotal => "TRACKTOTAL",
            Self::DiscNumber => "DISCNUMBER",
            Self::DiscTotal => "DISCTOTAL",
            Self::Composer => "COMPOSER",
            Self::Date => "DATE",
            Self::Year => "YEAR",
            Self::Genre => "GENRE",
            Self::Copyright => "COPYRIGHT",
            Self::Label => "LABEL",
            Self::Isrc => "ISRC",
            Self::Barcode => "BARCODE",
            Self::MediaType => "MEDIATYPE",
            Self::ItunesAdvisory => "ITUNESADVISORY",
        }
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tags to write, keyed by canonical name.
pub type TagSet = BTreeMap<TagName, String>;

/// Switchable tag fields, named as in the `[tags]` config section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TagField {
    AlbumTitle,
    AlbumArtist,
    TrackTitle,
    TrackArtist,
    TrackNumber,
    TrackTotal,
    DiscNumber,
    DiscTotal,
    Composer,
    /// `DATE` and `YEAR`
    ReleaseDate,
    Genre,
    Copyright,
    Label,
    Isrc,
    Upc,
    MediaType,
    Explicit,
}

impl TagField {
    pub const ALL: [TagField; 17] = [
        Self::AlbumTitle,
        Self::AlbumArtist,
        Self::TrackTitle,
        Self::TrackArtist,
        Self::TrackNumber,
        Self::TrackTotal,
        Self::DiscNumber,
        Self::DiscTotal,
        Self::Composer,
        Self::ReleaseDate,
        Self::Genre,
        Self::Copyright,
        Self::Label,
        Self::Isrc,
        Self::Upc,
        Self::MediaType,
        Self::Explicit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AlbumTitle => "album_title",
            Self::AlbumArtist => "album_artist",
            Self::TrackTitle => "track_title",
            Self::TrackArtist => "track_artist",
            Self::TrackNumber => "track_number",
            Self::TrackTotal => "track_total",
            Self::DiscNumber => "disc_number",
            Self::DiscTotal => "disc_total",
            Self::Composer => "composer",
            Self::ReleaseDate => "release_date",
            Self::Genre => "genre",
            Self::Copyright => "copyright",
            Self::Label => "label",
            Self::Isrc => "isrc",
            Self::Upc => "upc",
            Self::MediaType => "media_type",
            Self::Explicit => "explicit",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// Which tag fields are written. Fields are enabled unless switched off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagToggles {
    disabled: BTreeSet<TagField>,
}

impl TagToggles {
    /// Every tag enabled.
    pub fn all() -> Self {
        Self::default()
    }

    /// Build toggles from the `[tags]` config table.
    ///
    /// Missing keys stay enabled; unknown keys are a configuration error.
    pub fn from_map(map: &BTreeMap<String, bool>) -> Result<Self, ConfigError> {
        let mut disabled = BTreeSet::new();
        for (name, enabled) in map {
            let field =
                TagField::from_name(name).ok_or_else(|| ConfigError::UnknownTag(name.clone()))?;
            if !enabled {
                disabled.insert(field);
            }
        }
        Ok(Self { disabled })
    }

    pub fn disable(mut self, field: TagField) -> Self {
        self.disabled.insert(field);
        self
    }

    pub fn is_enabled(&self, field: TagField) -> bool {
        !self.disabled.contains(&field)
    }
}

/// Build the tag set for one track.
pub fn assemble(track: &TrackMeta, toggles: &TagToggles) -> TagSet {
    let mut tags = TagSet::new();
    let mut put = |field: TagField, name: TagName, value: Option<String>| {
        if !toggles.is_enabled(field) {
            return;
        }
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            tags.insert(name, value);
        }
    };

    put(TagField::AlbumTitle, TagName::Album, Some(track.album_title.clone()));
    put(TagField::AlbumArtist, TagName::AlbumArtist, track.album_artist.clone());
    put(TagField::TrackTitle, TagName::Title, Some(track.track_title.clone()));
    put(TagField::TrackArtist, TagName::Artist, track.track_artist.clone());
    put(TagField::Composer, TagName::Composer, track.composer.clone());
    put(TagField::ReleaseDate, TagName::Date, track.release_date.clone());
    put(TagField::ReleaseDate, TagName::Year, track.year());
    put(TagField::Genre, TagName::Genre, track.genre.clone());
    put(TagField::Copyright, TagName::Copyright, track.copyright.clone());
    put(TagField::Label, TagName::Label, track.label.clone());
    put(TagField::Isrc, TagName::Isrc, track.isrc.clone());
    put(TagField::Upc, TagName::Barcode, track.upc.clone());
    put(
        TagField::MediaType,
        TagName::MediaType,
        track.media_type.as_deref().map(str::to_uppercase),
    );
    put(
        TagField::Explicit,
        TagName::ItunesAdvisory,
        track.explicit.map(|e| if e { "1" } else { "0" }.to_string()),
    );
    put(TagField::TrackNumber, TagName::TrackNumber, track.track_number.map(|n| n.to_string()));
    put(TagField::TrackTotal, TagName::TrackTotal, track.track_total.map(|n| n.to_string()));
    put(TagField::DiscNumber, TagName::DiscNumber, Some(track.disc().to_string()));
    put(TagField::DiscTotal, TagName::DiscTotal, track.disc_total.map(|n| n.to_string()));
    tags
}
