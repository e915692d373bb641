//! Release layout planning.
//!
//! Computes where every track of a release goes, relative to the download
//! directory, from the naming patterns in [`NamingConfig`]:
//!
//! ```text
//! <folder_format>/<track_format>.<ext>                        single disc
//! <folder_format>/<multiple_disc_track_format>.<ext>          multi-disc, one dir
//! <folder_format>/<prefix> NN/<multiple_disc_track_format>.<ext>  multi-disc
//! ```
//!
//! `folder_format` may contain `/` to nest folders; each segment is rendered
//! on its own. When a rendered path exceeds `max_path_length`, shorter
//! pattern combinations are tried in turn. Planning never touches the
//! filesystem; tracks that would land on the same path get a numeric
//! suffix instead.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::catalog::Release;
use crate::config::{
    DEFAULT_FOLDER, DEFAULT_MP3_FOLDER, DEFAULT_MP3_TRACK, DEFAULT_MULTIPLE_DISC_TRACK,
    DEFAULT_TRACK, NamingConfig,
};
use crate::model::{DiscGroup, FieldMap, QualityTier, TrackMeta};
use crate::template::{self, NameKind};

/// One track and where it goes.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTrack {
    /// Path relative to the download directory, including the extension
    pub relative_path: PathBuf,
    pub meta: TrackMeta,
}

/// Planned layout of one release.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    /// Release folder, relative to the download directory
    pub album_dir: PathBuf,
    /// Tracks in disc, then track order
    pub tracks: Vec<PlannedTrack>,
}

impl LayoutPlan {
    fn fits(&self, max_len: usize) -> bool {
        self.tracks
            .iter()
            .all(|t| t.relative_path.to_string_lossy().chars().count() <= max_len)
    }
}

/// Folder, track and multi-disc track patterns used together.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Patterns {
    folder: String,
    track: String,
    multi_disc_track: String,
}

impl Patterns {
    fn new(folder: &str, track: &str, multi_disc_track: &str, tier: QualityTier) -> Self {
        Self {
            folder: clean_pattern(folder, tier, DEFAULT_MP3_FOLDER),
            track: clean_pattern(track, tier, DEFAULT_MP3_TRACK),
            multi_disc_track: clean_pattern(multi_disc_track, tier, DEFAULT_MULTIPLE_DISC_TRACK),
        }
    }
}

/// Strip file extensions from a pattern and swap in `mp3_default` when an
/// MP3 download would name lossless-only fields.
fn clean_pattern(pattern: &str, tier: QualityTier, mp3_default: &str) -> String {
    let trimmed = pattern.trim();
    let stripped = trimmed
        .strip_suffix(".mp3")
        .or_else(|| trimmed.strip_suffix(".flac"))
        .unwrap_or(trimmed)
        .trim();

    if tier == QualityTier::Mp3
        && (stripped.contains("bit_depth") || stripped.contains("sampling_rate"))
    {
        tracing::warn!(
            "Pattern '{}' names lossless-only fields, using '{}' for MP3",
            stripped,
            mp3_default
        );
        return mp3_default.to_string();
    }
    stripped.to_string()
}

/// Plan the layout of `release` downloaded at `tier`.
///
/// `discs` are the release's tracks grouped by [`crate::model::group_discs`].
pub fn plan(
    release: &Release,
    discs: &[DiscGroup],
    naming: &NamingConfig,
    tier: QualityTier,
) -> LayoutPlan {
    let candidates = [
        Patterns::new(
            &naming.folder_format,
            &naming.track_format,
            &naming.multiple_disc_track_format,
            tier,
        ),
        Patterns::new(
            &naming.fallback_folder_format,
            &naming.track_format,
            &naming.multiple_disc_track_format,
            tier,
        ),
        Patterns::new(
            &naming.fallback_folder_format,
            DEFAULT_TRACK,
            DEFAULT_MULTIPLE_DISC_TRACK,
            tier,
        ),
        Patterns::new(DEFAULT_FOLDER, DEFAULT_TRACK, DEFAULT_MULTIPLE_DISC_TRACK, tier),
    ];

    let mut tried: Vec<&Patterns> = Vec::new();
    for patterns in &candidates {
        if tried.contains(&patterns) {
            continue;
        }
        tried.push(patterns);

        let layout = layout(release, discs, naming, tier, patterns);
        if layout.fits(naming.max_path_length) {
            return layout;
        }
        tracing::debug!(
            "Paths for {} exceed {} characters with folder pattern '{}'",
            release.reference,
            naming.max_path_length,
            patterns.folder
        );
    }

    tracing::warn!(
        "Paths for {} are too long, using default patterns",
        release.reference
    );
    layout(release, discs, naming, tier, &candidates[3])
}

fn layout(
    release: &Release,
    discs: &[DiscGroup],
    naming: &NamingConfig,
    tier: QualityTier,
    patterns: &Patterns,
) -> LayoutPlan {
    let album_dir = folder_path(&patterns.folder, &release.album.template_fields(tier));
    let multi_disc = !release.is_single_track() && release.disc_total() > 1;
    let extension = tier.extension();

    let mut taken = HashSet::new();
    let mut tracks = Vec::new();
    for disc in discs {
        let dir = if multi_disc && !naming.multiple_disc_one_dir {
            let name = format!("{} {:02}", naming.multiple_disc_prefix, disc.disc_number);
            album_dir.join(template::sanitize(&name, NameKind::Folder))
        } else {
            album_dir.clone()
        };
        let pattern = if multi_disc {
            &patterns.multi_disc_track
        } else {
            &patterns.track
        };

        for track in &disc.tracks {
            let stem = template::render(pattern, &track.template_fields(tier), NameKind::File);
            let relative_path = unique_path(&dir, &stem, extension, &mut taken);
            tracks.push(PlannedTrack {
                relative_path,
                meta: track.clone(),
            });
        }
    }

    LayoutPlan { album_dir, tracks }
}

/// Render a folder pattern segment by segment.
fn folder_path(pattern: &str, fields: &FieldMap) -> PathBuf {
    pattern
        .split('/')
        .filter(|segment| !segment.trim().is_empty())
        .map(|segment| template::render(segment, fields, NameKind::Folder))
        .collect()
}

/// `dir/stem.ext`, or `dir/stem (N).ext` when that path is already taken.
///
/// Paths are compared case-insensitively, since two names differing only
/// in case are the same file on common filesystems.
fn unique_path(dir: &Path, stem: &str, extension: &str, taken: &mut HashSet<String>) -> PathBuf {
    let mut candidate = dir.join(format!("{}.{}", stem, extension));
    let mut n = 2;
    while !taken.insert(candidate.to_string_lossy().to_lowercase()) {
        tracing::debug!("Name collision on {:?}", candidate);
        candidate = dir.join(format!("{} ({}).{}", stem, n, extension));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReleaseKind, ReleaseRef, group_discs};
    use crate::test_utils::mock_release;

    const ALBUM_DIR: &str = "Test Artist - Test Album (2020) [FLAC 16]";

    fn paths(plan: &LayoutPlan) -> Vec<String> {
        plan.tracks
            .iter()
            .map(|t| t.relative_path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn plan_for(release: &Release, naming: &NamingConfig, tier: QualityTier) -> LayoutPlan {
        plan(release, &group_discs(&release.tracks), naming, tier)
    }

    #[test]
    fn test_single_disc_layout() {
        let release = mock_release(&[(1, 2), (1, 1)]);
        let plan = plan_for(&release, &NamingConfig::default(), QualityTier::Lossless);

        assert_eq!(plan.album_dir, PathBuf::from(ALBUM_DIR));
        assert_eq!(
            paths(&plan),
            vec![
                format!("{}/01 - Song 1.flac", ALBUM_DIR),
                format!("{}/02 - Song 2.flac", ALBUM_DIR),
            ]
        );
    }

    #[test]
    fn test_multi_disc_subdirectories() {
        let release = mock_release(&[(1, 1), (2, 1)]);
        let plan = plan_for(&release, &NamingConfig::default(), QualityTier::Lossless);

        assert_eq!(
            paths(&plan),
            vec![
                format!("{}/CD 01/01.01 - Song 1.flac", ALBUM_DIR),
                format!("{}/CD 02/02.01 - Song 1.flac", ALBUM_DIR),
            ]
        );
    }

    #[test]
    fn test_multi_disc_one_dir() {
        let release = mock_release(&[(1, 1), (2, 1)]);
        let naming = NamingConfig {
            multiple_disc_one_dir: true,
            ..NamingConfig::default()
        };
        let plan = plan_for(&release, &naming, QualityTier::Lossless);

        assert_eq!(
            paths(&plan),
            vec![
                format!("{}/01.01 - Song 1.flac", ALBUM_DIR),
                format!("{}/02.01 - Song 1.flac", ALBUM_DIR),
            ]
        );
    }

    #[test]
    fn test_non_contiguous_discs() {
        let release = mock_release(&[(1, 1), (3, 1)]);
        let naming = NamingConfig {
            multiple_disc_prefix: "Disc".to_string(),
            ..NamingConfig::default()
        };
        let plan = plan_for(&release, &naming, QualityTier::Lossless);
        let p = paths(&plan);
        assert!(p[0].contains("/Disc 01/"));
        assert!(p[1].contains("/Disc 03/"));
    }

    #[test]
    fn test_collisions_get_suffix() {
        let release = mock_release(&[(1, 1), (2, 1)]);
        let naming = NamingConfig {
            multiple_disc_one_dir: true,
            multiple_disc_track_format: "{track_title}".to_string(),
            ..NamingConfig::default()
        };
        let plan = plan_for(&release, &naming, QualityTier::Lossless);

        assert_eq!(
            paths(&plan),
            vec![
                format!("{}/Song 1.flac", ALBUM_DIR),
                format!("{}/Song 1 (2).flac", ALBUM_DIR),
            ]
        );
    }

    #[test]
    fn test_collisions_ignore_case() {
        let mut release = mock_release(&[(1, 1), (1, 2)]);
        release.tracks[0].track_title = "SONG".to_string();
        release.tracks[1].track_title = "song".to_string();
        let naming = NamingConfig {
            track_format: "{track_title}".to_string(),
            ..NamingConfig::default()
        };
        let plan = plan_for(&release, &naming, QualityTier::Lossless);
        assert_eq!(
            paths(&plan),
            vec![
                format!("{}/SONG.flac", ALBUM_DIR),
                format!("{}/song (2).flac", ALBUM_DIR),
            ]
        );
    }

    #[test]
    fn test_nested_folder_format() {
        let release = mock_release(&[(1, 1)]);
        let naming = NamingConfig {
            folder_format: "{album_artist}/{year} - {album_title}".to_string(),
            ..NamingConfig::default()
        };
        let plan = plan_for(&release, &naming, QualityTier::Lossless);
        assert_eq!(plan.album_dir, Path::new("Test Artist").join("2020 - Test Album"));
    }

    #[test]
    fn test_mp3_uses_mp3_defaults() {
        let release = mock_release(&[(1, 1)]);
        let naming = NamingConfig {
            track_format: "{track_number} - {track_title} [{bit_depth}].flac".to_string(),
            ..NamingConfig::default()
        };
        let plan = plan_for(&release, &naming, QualityTier::Mp3);
        assert_eq!(
            paths(&plan),
            vec!["Test Artist - Test Album (2020) [MP3]/01 - Song 1.mp3".to_string()]
        );
    }

    #[test]
    fn test_pattern_extension_stripped() {
        assert_eq!(
            clean_pattern("{track_title}.flac", QualityTier::Lossless, DEFAULT_MP3_TRACK),
            "{track_title}"
        );
        assert_eq!(
            clean_pattern(" {track_title}.mp3 ", QualityTier::Lossless, DEFAULT_MP3_TRACK),
            "{track_title}"
        );
    }

    #[test]
    fn test_long_paths_fall_back() {
        let mut release = mock_release(&[(1, 1)]);
        release.album.album_title = "x".repeat(150);
        let naming = NamingConfig {
            folder_format: "{album_artist} - {album_title}".to_string(),
            fallback_folder_format: "{album_artist} ({year})".to_string(),
            ..NamingConfig::default()
        };
        let plan = plan_for(&release, &naming, QualityTier::Lossless);
        assert_eq!(plan.album_dir, PathBuf::from("Test Artist (2020)"));
    }

    #[test]
    fn test_nothing_fits_uses_defaults() {
        let mut release = mock_release(&[(1, 1)]);
        release.album.album_artist = Some("a".repeat(300));
        let plan = plan_for(&release, &NamingConfig::default(), QualityTier::Lossless);
        assert!(plan.album_dir.to_string_lossy().ends_with("(2020) [FLAC 16]"));
        assert_eq!(plan.tracks.len(), 1);
    }

    #[test]
    fn test_single_track_release_is_single_disc() {
        let mut release = mock_release(&[(2, 5)]);
        release.reference = ReleaseRef::new(ReleaseKind::Track, "t-1");
        release.album.disc_total = Some(2);
        let plan = plan_for(&release, &NamingConfig::default(), QualityTier::Lossless);
        assert_eq!(paths(&plan), vec![format!("{}/05 - Song 5.flac", ALBUM_DIR)]);
    }

    #[test]
    fn test_missing_disc_number_is_disc_one() {
        let mut release = mock_release(&[(1, 1), (2, 1)]);
        release.tracks[0].disc_number = None;
        let plan = plan_for(&release, &NamingConfig::default(), QualityTier::Lossless);
        assert!(paths(&plan)[0].contains("/CD 01/"));
    }
}
