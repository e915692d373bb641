//! Extended M3U playlists for downloaded playlists.

use super::TrackFile;

/// Playlist file extension.
pub const EXTENSION: &str = "m3u";

/// Extended M3U listing of `files`. Paths are written as given, relative to
/// the folder the playlist is saved in; an unknown length is `-1`.
pub fn m3u(files: &[TrackFile]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for file in files {
        let seconds = file.duration.map_or(-1, i64::from);
        out.push_str(&format!(
            "#EXTINF:{}, {} - {}\n{}\n",
            seconds,
            file.artist.as_deref().unwrap_or_default(),
            file.title,
            file.relative_path.display()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(path: &str, duration: Option<u32>) -> TrackFile {
        TrackFile {
            relative_path: PathBuf::from(path),
            artist: Some("Test Artist".to_string()),
            title: "Song".to_string(),
            duration,
        }
    }

    #[test]
    fn test_m3u_lists_entries_in_order() {
        let text = m3u(&[
            file("Album A/01 - Song.flac", Some(215)),
            file("Album B/03 - Song.flac", None),
        ]);
        assert_eq!(
            text,
            "#EXTM3U\n\
             #EXTINF:215, Test Artist - Song\nAlbum A/01 - Song.flac\n\
             #EXTINF:-1, Test Artist - Song\nAlbum B/03 - Song.flac\n"
        );
    }

    #[test]
    fn test_m3u_without_entries_is_header_only() {
        assert_eq!(m3u(&[]), "#EXTM3U\n");
    }
}
