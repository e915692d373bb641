//! Upstream API Data Transfer Objects
//!
//! These types match what the upstream `api.json/0.2` endpoints return.
//! DO NOT use these types outside the api module - convert to domain types
//! in the adapter.
//!
//! Only the fields the engine reads are declared; everything else in the
//! responses is ignored.

use serde::{Deserialize, Deserializer};

/// Ids arrive as strings for albums and as numbers for tracks and artists.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// Paginated list
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    pub total: Option<u32>,
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

/// Named reference (artist, composer, label, performer)
#[derive(Debug, Clone, Deserialize)]
pub struct Named {
    pub name: String,
}

/// Artist with roles, from an album's `artists` list
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRole {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Cover image URLs
#[derive(Debug, Clone, Deserialize)]
pub struct Image {
    /// 600px rendition
    pub large: Option<String>,
}

/// `album/get` response (also embedded in tracks and listings)
#[derive(Debug, Clone, Deserialize)]
pub struct Album {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub title: String,
    pub version: Option<String>,
    pub url: Option<String>,
    pub artist: Option<Named>,
    #[serde(default)]
    pub artists: Vec<ArtistRole>,
    pub composer: Option<Named>,
    pub label: Option<Named>,
    #[serde(default)]
    pub genres_list: Vec<String>,
    pub copyright: Option<String>,
    pub upc: Option<String>,
    pub parental_warning: Option<bool>,
    pub release_date_original: Option<String>,
    pub product_type: Option<String>,
    pub release_type: Option<String>,
    pub tracks_count: Option<u32>,
    pub media_count: Option<u32>,
    pub maximum_bit_depth: Option<u8>,
    pub maximum_sampling_rate: Option<f64>,
    pub streamable: Option<bool>,
    pub image: Option<Image>,
    /// Booklets and other extras
    #[serde(default)]
    pub goodies: Vec<Goody>,
    pub tracks: Option<Page<Track>>,
}

/// Album extra, usually a PDF booklet
#[derive(Debug, Clone, Deserialize)]
pub struct Goody {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: Option<String>,
    pub url: Option<String>,
}

/// `track/get` response (also an item of album and playlist track lists)
#[derive(Debug, Clone, Deserialize)]
pub struct Track {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub title: String,
    pub version: Option<String>,
    /// Classical work the track belongs to
    pub work: Option<String>,
    pub performer: Option<Named>,
    pub composer: Option<Named>,
    pub isrc: Option<String>,
    pub copyright: Option<String>,
    pub track_number: Option<u32>,
    pub media_number: Option<u32>,
    /// Seconds
    pub duration: Option<u32>,
    pub parental_warning: Option<bool>,
    pub maximum_bit_depth: Option<u8>,
    pub maximum_sampling_rate: Option<f64>,
    pub streamable: Option<bool>,
    pub release_date_original: Option<String>,
    /// Present on `track/get` and playlist items, absent in album listings
    pub album: Option<Box<Album>>,
}

/// `artist/get?extra=albums` response
#[derive(Debug, Clone, Deserialize)]
pub struct Artist {
    pub name: String,
    pub albums: Option<Page<Album>>,
}

/// `label/get?extra=albums` response
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
    pub albums: Option<Page<Album>>,
}

/// `playlist/get?extra=tracks` response
#[derive(Debug, Clone, Deserialize)]
pub struct Playlist {
    pub name: String,
    pub tracks: Option<Page<Track>>,
}

/// `track/getFileUrl` response
#[derive(Debug, Clone, Deserialize)]
pub struct FileUrl {
    pub url: Option<String>,
    pub format_id: Option<u8>,
    pub bit_depth: Option<u8>,
    pub sampling_rate: Option<f64>,
    /// Set when only a preview is available
    pub sample: Option<bool>,
}

/// `user/login` response
#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub user_auth_token: String,
}

/// Error body returned with non-success statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_album_parses_with_nested_tracks() {
        let json = r#"{
            "id": "0060254735180",
            "title": "Blue Train",
            "version": "Remastered",
            "artist": {"id": 123, "name": "John Coltrane"},
            "genres_list": ["Jazz", "Jazz→Hard Bop"],
            "media_count": 1,
            "maximum_bit_depth": 24,
            "maximum_sampling_rate": 192,
            "streamable": true,
            "image": {"small": "s", "large": "https://static/x_600.jpg"},
            "tracks": {"offset": 0, "limit": 50, "total": 1, "items": [
                {"id": 52151405, "title": "Blue Train", "track_number": 1, "media_number": 1}
            ]}
        }"#;
        let album: Album = serde_json::from_str(json).unwrap();
        assert_eq!(album.id, "0060254735180");
        assert_eq!(album.maximum_sampling_rate, Some(192.0));
        let tracks = album.tracks.unwrap().items;
        assert_eq!(tracks[0].id, "52151405");
        assert!(tracks[0].album.is_none());
    }

    #[test]
    fn test_numeric_album_id_accepted() {
        let album: Album = serde_json::from_str(r#"{"id": 42, "title": "X"}"#).unwrap();
        assert_eq!(album.id, "42");
    }

    #[test]
    fn test_file_url_sample_flag() {
        let parsed: FileUrl =
            serde_json::from_str(r#"{"url": "https://x", "format_id": 6, "sample": true}"#)
                .unwrap();
        assert_eq!(parsed.sample, Some(true));
        assert_eq!(parsed.bit_depth, None);
    }
}
