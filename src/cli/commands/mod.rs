//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `download`: Resolving and downloading releases
//! - `ledger`: Download ledger maintenance
//! - `settings`: Config file management

mod download;
mod ledger;
mod settings;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::catalog::CoverSize;

pub use download::cmd_download;
pub use ledger::cmd_purge;
pub use settings::{cmd_config_init, cmd_config_show};

/// Download releases from the streaming catalog
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download albums, tracks, artists, labels or playlists by URL
    Dl(DownloadArgs),
    /// Forget every recorded download
    Purge,
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config file actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

/// Options for `dl`. Anything left unset comes from the config file.
#[derive(Args, Debug, Default)]
pub struct DownloadArgs {
    /// URLs, or text files with one URL per line
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Download directory
    #[arg(short, long)]
    pub directory: Option<PathBuf>,

    /// Quality: 5 (MP3), 6 (16/44.1), 7 (24/96), 27 (24/192)
    #[arg(short, long)]
    pub quality: Option<u8>,

    /// Skip releases unavailable in the requested quality
    #[arg(long)]
    pub no_fallback: bool,

    /// Neither check nor update the download ledger
    #[arg(long)]
    pub no_db: bool,

    /// Skip singles, EPs and compilations
    #[arg(long)]
    pub albums_only: bool,

    /// Keep one edition per album in artist discographies
    #[arg(long)]
    pub smart_discography: bool,

    /// Release folder pattern
    #[arg(long, visible_alias = "ff")]
    pub folder_format: Option<String>,

    /// Release folder pattern used when paths get too long
    #[arg(long, visible_alias = "fbff")]
    pub fallback_folder_format: Option<String>,

    /// Track file pattern
    #[arg(long, visible_alias = "tf")]
    pub track_format: Option<String>,

    /// Do not write .m3u files for playlists
    #[arg(long)]
    pub no_m3u: bool,

    /// Embed the cover into every track
    #[arg(long)]
    pub embed_art: bool,

    /// Do not save cover.jpg
    #[arg(long)]
    pub no_cover: bool,

    /// Size of the embedded cover: 50, 100, 150, 300, 600, max or org
    #[arg(long, value_name = "SIZE")]
    pub embedded_art_size: Option<CoverSize>,

    /// Size of the saved cover.jpg: 50, 100, 150, 300, 600, max or org
    #[arg(long, value_name = "SIZE")]
    pub saved_art_size: Option<CoverSize>,

    /// Disc folder prefix
    #[arg(long, value_name = "PREFIX")]
    pub multiple_disc_prefix: Option<String>,

    /// Keep all discs in the release folder
    #[arg(long)]
    pub multiple_disc_one_dir: bool,

    /// Track file pattern for multi-disc releases
    #[arg(long, value_name = "PATTERN")]
    pub multiple_disc_track_format: Option<String>,

    /// Concurrent track downloads
    #[arg(long)]
    pub workers: Option<usize>,
}

impl DownloadArgs {
    /// Layer the flags over a loaded config.
    pub fn apply(&self, config: &mut crate::config::Config) {
        let download = &mut config.download;
        if let Some(directory) = &self.directory {
            download.directory = directory.clone();
        }
        if let Some(quality) = self.quality {
            download.quality = quality;
        }
        if let Some(workers) = self.workers {
            download.max_workers = workers;
        }
        download.fallback &= !self.no_fallback;
        download.dedup &= !self.no_db;
        download.albums_only |= self.albums_only;
        download.smart_discography |= self.smart_discography;
        download.no_m3u |= self.no_m3u;

        let naming = &mut config.naming;
        if let Some(folder) = &self.folder_format {
            naming.folder_format = folder.clone();
        }
        if let Some(folder) = &self.fallback_folder_format {
            naming.fallback_folder_format = folder.clone();
        }
        if let Some(track) = &self.track_format {
            naming.track_format = track.clone();
        }
        if let Some(prefix) = &self.multiple_disc_prefix {
            naming.multiple_disc_prefix = prefix.clone();
        }
        if let Some(track) = &self.multiple_disc_track_format {
            naming.multiple_disc_track_format = track.clone();
        }
        naming.multiple_disc_one_dir |= self.multiple_disc_one_dir;

        let cover = &mut config.cover;
        cover.embed_art |= self.embed_art;
        cover.no_cover |= self.no_cover;
        if let Some(size) = self.embedded_art_size {
            cover.embedded_art_size = size;
        }
        if let Some(size) = self.saved_art_size {
            cover.saved_art_size = size;
        }
    }
}

/// Run the parsed command.
///
/// Returns `Ok(false)` when the command ran but some releases failed.
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let rt = Runtime::new()?;

    match &cli.command {
        Commands::Dl(args) => cmd_download(&rt, args),
        Commands::Purge => {
            cmd_purge(&rt)?;
            Ok(true)
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Init { force } => cmd_config_init(*force)?,
                ConfigAction::Show => cmd_config_show()?,
            }
            Ok(true)
        }
    }
}
