//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\release-fetch\config.toml
//! - macOS: ~/Library/Application Support/release-fetch/config.toml
//! - Linux: ~/.config/release-fetch/config.toml
//!
//! The config file is human-readable and editable. It is loaded once at
//! startup; command line flags are layered on top and the merged value is
//! never re-read during a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::catalog::CoverSize;
use crate::metadata::TagToggles;
use crate::model::{Field, QualityTier};
use crate::template;

/// Default release folder pattern.
pub const DEFAULT_FOLDER: &str = "{album_artist} - {album_title} ({year}) [{format} {bit_depth}]";
/// Default track file pattern.
pub const DEFAULT_TRACK: &str = "{track_number} - {track_title_base}";
/// Default track file pattern for multi-disc releases.
pub const DEFAULT_MULTIPLE_DISC_TRACK: &str = "{disc_number}.{track_number} - {track_title_base}";
/// Folder pattern used for MP3 downloads when the configured one names
/// lossless-only fields.
pub const DEFAULT_MP3_FOLDER: &str = "{album_artist} - {album_title} ({year}) [MP3]";
/// Track pattern used for MP3 downloads when the configured one names
/// lossless-only fields.
pub const DEFAULT_MP3_TRACK: &str = "{track_number} - {track_title}";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upstream API credentials
    pub credentials: Credentials,

    /// Download behaviour
    pub download: DownloadConfig,

    /// Folder and file naming
    pub naming: NamingConfig,

    /// Tag toggles: tag field name -> enabled. Missing fields are enabled.
    pub tags: BTreeMap<String, bool>,

    /// Cover art handling
    pub cover: CoverConfig,
}

/// Upstream API credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub app_id: Option<String>,
    /// Secret used to sign stream URL requests
    pub app_secret: Option<String>,
    /// Token of an existing session; preferred over email/password
    pub user_auth_token: Option<String>,
    pub email: Option<String>,
    /// MD5 hex digest of the account password
    pub password_md5: Option<String>,
}

/// Download behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root directory for downloaded releases
    pub directory: PathBuf,

    /// Requested format id: 5 (MP3), 6 (16/44.1), 7 (24/96), 27 (24/192)
    pub quality: u8,

    /// Fall back to another tier when the requested one is unavailable
    pub fallback: bool,

    /// Skip releases recorded in the download ledger
    pub dedup: bool,

    /// Skip singles, EPs and compilations
    pub albums_only: bool,

    /// Filter artist discographies down to one edition per album
    pub smart_discography: bool,

    /// Concurrent track downloads within a release
    pub max_workers: usize,

    /// Do not write an `.m3u` file for downloaded playlists
    pub no_m3u: bool,

    /// Ledger database file (defaults to the config directory)
    pub database: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("Downloads"),
            quality: QualityTier::Lossless.format_id(),
            fallback: true,
            dedup: true,
            albums_only: false,
            smart_discography: false,
            max_workers: 4,
            no_m3u: false,
            database: None,
        }
    }
}

/// Folder and file naming patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Release folder; `/` separates nested folders
    pub folder_format: String,

    /// Folder pattern tried when paths get too long
    pub fallback_folder_format: String,

    /// Track file name for single-disc releases
    pub track_format: String,

    /// Disc folder prefix, followed by the zero-padded disc number
    pub multiple_disc_prefix: String,

    /// Keep all discs in the release folder instead of disc folders
    pub multiple_disc_one_dir: bool,

    /// Track file name for multi-disc releases
    pub multiple_disc_track_format: String,

    /// Longest relative path (in characters) before falling back to
    /// shorter patterns
    pub max_path_length: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            folder_format: DEFAULT_FOLDER.to_string(),
            fallback_folder_format: DEFAULT_FOLDER.to_string(),
            track_format: DEFAULT_TRACK.to_string(),
            multiple_disc_prefix: "CD".to_string(),
            multiple_disc_one_dir: false,
            multiple_disc_track_format: DEFAULT_MULTIPLE_DISC_TRACK.to_string(),
            max_path_length: 180,
        }
    }
}

impl NamingConfig {
    /// Reject patterns that reference unknown fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pattern in [
            &self.folder_format,
            &self.fallback_folder_format,
            &self.track_format,
            &self.multiple_disc_track_format,
        ] {
            if let Some(name) = template::placeholders(pattern)
                .into_iter()
                .find(|name| Field::from_name(name).is_none())
            {
                return Err(ConfigError::UnknownPlaceholder {
                    pattern: pattern.clone(),
                    name,
                });
            }
        }
        if self.max_path_length == 0 {
            return Err(ConfigError::invalid("naming.max_path_length", "must be positive"));
        }
        Ok(())
    }
}

/// Cover art handling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Embed the cover into every track
    pub embed_art: bool,

    /// Do not save `cover.jpg` next to the tracks
    pub no_cover: bool,

    /// Size of the embedded cover
    pub embedded_art_size: CoverSize,

    /// Size of the saved cover
    pub saved_art_size: CoverSize,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            embed_art: false,
            no_cover: false,
            embedded_art_size: CoverSize::Px600,
            saved_art_size: CoverSize::Original,
        }
    }
}

impl Config {
    /// The requested quality tier.
    pub fn quality_tier(&self) -> Result<QualityTier, ConfigError> {
        QualityTier::from_format_id(self.download.quality).ok_or_else(|| {
            ConfigError::invalid(
                "download.quality",
                format!("{} is not one of 5, 6, 7, 27", self.download.quality),
            )
        })
    }

    /// Tag toggles, validated.
    pub fn tag_toggles(&self) -> Result<TagToggles, ConfigError> {
        TagToggles::from_map(&self.tags)
    }

    /// Check everything a run depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quality_tier()?;
        self.tag_toggles()?;
        self.naming.validate()?;
        if self.download.max_workers == 0 {
            return Err(ConfigError::invalid("download.max_workers", "must be positive"));
        }
        Ok(())
    }

    /// Ledger database path.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.download
            .database
            .clone()
            .or_else(|| config_dir().map(|d| d.join("downloads.db")))
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("release-fetch"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from a specific file, falling back to defaults.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to the default location
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &path)?;
    Ok(path)
}

/// Save configuration to `path`
///
/// Creates the parent directory if it doesn't exist.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    // Serialize to pretty TOML
    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors. All of them are fatal and reported before any
/// download starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),

    #[error("Unknown placeholder {{{name}}} in pattern '{pattern}'")]
    UnknownPlaceholder { pattern: String, name: String },

    #[error("Unknown tag '{0}' in [tags]")]
    UnknownTag(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn invalid(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[credentials]"));
        assert!(toml.contains("[download]"));
        assert!(toml.contains("[naming]"));
        assert!(toml.contains("[cover]"));
    }

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
        assert_eq!(
            Config::default().quality_tier().unwrap(),
            QualityTier::Lossless
        );
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.credentials.app_id = Some("123456".to_string());
        config.download.quality = 27;
        config.naming.multiple_disc_one_dir = true;
        config.tags.insert("isrc".to_string(), false);
        config.cover.saved_art_size = CoverSize::Max;

        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();

        assert_eq!(parsed.credentials.app_id.as_deref(), Some("123456"));
        assert_eq!(parsed.quality_tier().unwrap(), QualityTier::HiRes192);
        assert!(parsed.naming.multiple_disc_one_dir);
        assert_eq!(parsed.tags.get("isrc"), Some(&false));
        assert_eq!(parsed.cover.saved_art_size, CoverSize::Max);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[naming]
multiple_disc_prefix = "Disc"

[cover]
embedded_art_size = "300"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.naming.multiple_disc_prefix, "Disc");
        assert_eq!(config.naming.track_format, DEFAULT_TRACK);
        assert_eq!(config.cover.embedded_art_size, CoverSize::Px300);
        assert_eq!(config.download.max_workers, 4);
        assert!(config.download.fallback);
    }

    #[test]
    fn test_bad_cover_size_rejected() {
        let toml = "[cover]\nsaved_art_size = \"huge\"\n";
        assert!(toml::from_str::<Config>(toml).is_err());
    }

    #[test]
    fn test_unknown_placeholder_rejected() {
        let naming = NamingConfig {
            track_format: "{track_number} - {tittle}".to_string(),
            ..NamingConfig::default()
        };
        match naming.validate() {
            Err(ConfigError::UnknownPlaceholder { name, .. }) => assert_eq!(name, "tittle"),
            other => panic!("expected unknown placeholder, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_placeholders_accepted() {
        let naming = NamingConfig {
            folder_format: "{album_artist}/{album_title} [{disc_count} discs]".to_string(),
            ..NamingConfig::default()
        };
        naming.validate().unwrap();
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.download.quality = 9;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));

        let mut config = Config::default();
        config.tags.insert("nonsense".to_string(), true);
        assert!(matches!(config.validate(), Err(ConfigError::UnknownTag(_))));

        let mut config = Config::default();
        config.download.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.download.directory = PathBuf::from("/music");
        save_to(&config, &path).unwrap();

        let loaded = load_from(&path);
        assert_eq!(loaded.download.directory, PathBuf::from("/music"));
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_unparsable_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is [not toml").unwrap();
        let config = load_from(&path);
        assert_eq!(config.naming, NamingConfig::default());
    }
}
