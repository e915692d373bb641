//! Download orchestration.
//!
//! Drives every input reference through the release state machine:
//!
//! ```text
//! PENDING -> RESOLVING -> SKIPPED_QUALITY
//!                      -> SKIPPED_FILTERED
//!                      -> PLANNED -> WRITING -> DONE | FAILED
//!         -> SKIPPED_DUPLICATE
//! ```
//!
//! Releases are processed one at a time. Within a release, tracks are
//! fetched, tagged and written concurrently by a bounded pool of workers.
//! A release is recorded in the ledger only after every one of its tracks
//! is on disk, so an interrupted or partially failed release is retried in
//! full on the next run.
//!
//! Album extras (booklets) are saved next to the tracks, and a downloaded
//! playlist gets an `.m3u` listing in the download directory.

pub mod playlist;

use chrono::Utc;
use futures::{StreamExt, stream};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::catalog::discography;
use crate::catalog::{
    CatalogError, CatalogProvider, FileWriter, Release, Transport, TransportError, WriteError,
};
use crate::config::{Config, ConfigError, CoverConfig, NamingConfig};
use crate::db::{Ledger, LedgerEntry};
use crate::metadata::{self, TagToggles};
use crate::model::{self, QualityTier, ReleaseKind, ReleaseRef};
use crate::organizer::{self, PlannedTrack};
use crate::quality::{self, Resolution};
use crate::template::{self, NameKind};

/// Name of the cover saved next to the tracks.
pub const COVER_FILE_NAME: &str = "cover.jpg";

/// Everything a run needs, merged from config and command line.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub directory: PathBuf,
    pub quality: QualityTier,
    pub fallback: bool,
    pub dedup: bool,
    pub albums_only: bool,
    pub smart_discography: bool,
    pub max_workers: usize,
    pub no_m3u: bool,
    pub naming: NamingConfig,
    pub toggles: TagToggles,
    pub cover: CoverConfig,
}

impl DownloadOptions {
    /// Validate `config` and take the run options from it.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            directory: config.download.directory.clone(),
            quality: config.quality_tier()?,
            fallback: config.download.fallback,
            dedup: config.download.dedup,
            albums_only: config.download.albums_only,
            smart_discography: config.download.smart_discography,
            max_workers: config.download.max_workers,
            no_m3u: config.download.no_m3u,
            naming: config.naming.clone(),
            toggles: config.tag_toggles()?,
            cover: config.cover.clone(),
        })
    }
}

// ============================================================================
// Release state machine
// ============================================================================

/// Where a release is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseState {
    Pending,
    Resolving,
    SkippedDuplicate,
    SkippedQuality,
    SkippedFiltered,
    Planned,
    Writing,
    Done,
    Failed,
}

impl ReleaseState {
    /// Whether `next` is a legal successor of this state.
    pub fn can_advance_to(&self, next: ReleaseState) -> bool {
        use ReleaseState::*;
        matches!(
            (self, next),
            (Pending, Resolving)
                | (Pending, SkippedDuplicate)
                | (Pending, Failed)
                | (Resolving, SkippedQuality)
                | (Resolving, SkippedFiltered)
                | (Resolving, Planned)
                | (Resolving, Failed)
                | (Planned, Writing)
                | (Writing, Done)
                | (Writing, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::SkippedDuplicate
                | Self::SkippedQuality
                | Self::SkippedFiltered
                | Self::Done
                | Self::Failed
        )
    }
}

/// The states one release went through, in order.
#[derive(Debug)]
struct StateLog<'a> {
    reference: &'a ReleaseRef,
    states: Vec<ReleaseState>,
}

impl<'a> StateLog<'a> {
    fn new(reference: &'a ReleaseRef) -> Self {
        tracing::debug!(release = %reference, state = ?ReleaseState::Pending, "State");
        Self {
            reference,
            states: vec![ReleaseState::Pending],
        }
    }

    fn current(&self) -> ReleaseState {
        self.states
            .last()
            .copied()
            .unwrap_or(ReleaseState::Pending)
    }

    fn advance(&mut self, next: ReleaseState) {
        let current = self.current();
        debug_assert!(
            current.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            current,
            next
        );
        tracing::debug!(release = %self.reference, from = ?current, to = ?next, "State");
        self.states.push(next);
    }

    fn finish(mut self, title: Option<String>, outcome: ReleaseOutcome) -> ReleaseReport {
        let terminal = outcome.state();
        if self.current() != terminal {
            self.advance(terminal);
        }
        ReleaseReport {
            reference: self.reference.clone(),
            title,
            outcome,
            states: self.states,
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Why one track could not be written.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

/// A track that failed, with where it was headed.
#[derive(Debug)]
pub struct TrackFailure {
    pub track_id: String,
    pub path: PathBuf,
    pub error: TrackError,
}

/// A track on disk after its release finished.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFile {
    /// Relative to the download directory
    pub relative_path: PathBuf,
    pub artist: Option<String>,
    pub title: String,
    /// Seconds
    pub duration: Option<u32>,
}

impl From<&PlannedTrack> for TrackFile {
    fn from(planned: &PlannedTrack) -> Self {
        Self {
            relative_path: planned.relative_path.clone(),
            artist: planned.meta.track_artist.clone(),
            title: planned.meta.track_title.clone(),
            duration: planned.meta.duration,
        }
    }
}

/// How a release ended.
#[derive(Debug)]
pub enum ReleaseOutcome {
    /// Already in the ledger
    SkippedDuplicate,
    /// No acceptable tier
    SkippedQuality {
        requested: QualityTier,
        available: BTreeSet<QualityTier>,
    },
    /// Excluded by the albums-only filter
    Filtered,
    Done {
        tier: QualityTier,
        album_dir: PathBuf,
        /// Tracks fetched and written in this run
        written: usize,
        /// Tracks already on disk
        existing: usize,
        /// Every track of the release, in disc and track order
        files: Vec<TrackFile>,
    },
    /// At least one track failed; the release was not recorded
    Failed {
        tier: QualityTier,
        failures: Vec<TrackFailure>,
    },
    CatalogFailed(CatalogError),
    LedgerFailed(String),
}

impl ReleaseOutcome {
    /// Terminal state this outcome corresponds to.
    pub fn state(&self) -> ReleaseState {
        match self {
            Self::SkippedDuplicate => ReleaseState::SkippedDuplicate,
            Self::SkippedQuality { .. } => ReleaseState::SkippedQuality,
            Self::Filtered => ReleaseState::SkippedFiltered,
            Self::Done { .. } => ReleaseState::Done,
            Self::Failed { .. } | Self::CatalogFailed(_) | Self::LedgerFailed(_) => {
                ReleaseState::Failed
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        self.state() == ReleaseState::Failed
    }
}

/// Result of processing one release.
#[derive(Debug)]
pub struct ReleaseReport {
    pub reference: ReleaseRef,
    /// Album title, once known
    pub title: Option<String>,
    pub outcome: ReleaseOutcome,
    /// Every state visited, starting with `Pending`
    pub states: Vec<ReleaseState>,
}

impl ReleaseReport {
    /// Display name: the title when known, the reference otherwise.
    pub fn name(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.reference.to_string())
    }
}

/// Counts over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn of(reports: &[ReleaseReport]) -> Self {
        let mut summary = Self::default();
        for report in reports {
            match report.outcome.state() {
                ReleaseState::Done => summary.done += 1,
                ReleaseState::Failed => summary.failed += 1,
                _ => summary.skipped += 1,
            }
        }
        summary
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

enum TrackWrite {
    Written,
    Existing,
}

// ============================================================================
// Downloader
// ============================================================================

/// Runs downloads against injected collaborators.
pub struct Downloader<'a, C, T, W, L> {
    catalog: &'a C,
    transport: &'a T,
    writer: &'a W,
    ledger: Option<&'a L>,
    options: DownloadOptions,
}

impl<'a, C, T, W, L> Downloader<'a, C, T, W, L>
where
    C: CatalogProvider,
    T: Transport,
    W: FileWriter,
    L: Ledger,
{
    /// Without a ledger, nothing is deduplicated or recorded.
    pub fn new(
        catalog: &'a C,
        transport: &'a T,
        writer: &'a W,
        ledger: Option<&'a L>,
        options: DownloadOptions,
    ) -> Self {
        Self {
            catalog,
            transport,
            writer,
            ledger,
            options,
        }
    }

    /// Download every reference, expanding collections first.
    ///
    /// A release reached twice in one run is processed once.
    pub async fn run(&self, references: &[ReleaseRef]) -> Vec<ReleaseReport> {
        let mut reports = Vec::new();
        let mut seen: HashMap<ReleaseRef, usize> = HashMap::new();

        for reference in references {
            let (name, targets) = match self.expand(reference).await {
                Ok(expanded) => expanded,
                Err(e) => {
                    tracing::error!("Could not expand {}: {}", reference, e);
                    let log = StateLog::new(reference);
                    reports.push(log.finish(None, ReleaseOutcome::CatalogFailed(e)));
                    continue;
                }
            };

            let mut indices = Vec::with_capacity(targets.len());
            for target in targets {
                if let Some(&index) = seen.get(&target) {
                    tracing::debug!(release = %target, "Already processed in this run");
                    indices.push(index);
                    continue;
                }
                seen.insert(target.clone(), reports.len());
                indices.push(reports.len());
                reports.push(self.process(&target).await);
            }

            if reference.kind == ReleaseKind::Playlist
                && !self.options.no_m3u
                && let Some(name) = name.as_deref()
            {
                let files: Vec<TrackFile> = indices
                    .iter()
                    .filter_map(|&i| match &reports[i].outcome {
                        ReleaseOutcome::Done { files, .. } => Some(files.iter().cloned()),
                        _ => None,
                    })
                    .flatten()
                    .collect();
                self.write_playlist(name, &files).await;
            }
        }

        let summary = RunSummary::of(&reports);
        tracing::info!(
            "Run finished: {} done, {} skipped, {} failed",
            summary.done,
            summary.skipped,
            summary.failed
        );
        reports
    }

    /// Collection name and the releases a reference stands for.
    async fn expand(
        &self,
        reference: &ReleaseRef,
    ) -> Result<(Option<String>, Vec<ReleaseRef>), CatalogError> {
        if !reference.kind.is_collection() {
            return Ok((None, vec![reference.clone()]));
        }

        let collection = self.catalog.expand(reference).await?;
        let mut entries = collection.entries;

        if reference.kind == ReleaseKind::Artist
            && self.options.smart_discography
            && let Some(artist) = collection.name.as_deref()
        {
            let before = entries.len();
            entries = discography::smart_filter(artist, entries);
            tracing::info!(
                "Smart discography for {}: kept {} of {} releases",
                artist,
                entries.len(),
                before
            );
        }

        let targets = entries.into_iter().map(|e| e.reference).collect();
        Ok((collection.name, targets))
    }

    /// Write `<name>.m3u` into the download directory. Failures are logged.
    async fn write_playlist(&self, name: &str, files: &[TrackFile]) {
        if files.is_empty() {
            tracing::info!("No tracks of playlist {} on disk, not writing .m3u", name);
            return;
        }

        let file_name = format!(
            "{}.{}",
            template::sanitize(name, NameKind::File),
            playlist::EXTENSION
        );
        let path = self.options.directory.join(file_name);
        match self
            .writer
            .write_file(&path, playlist::m3u(files).as_bytes())
            .await
        {
            Ok(()) => tracing::info!("Wrote playlist {}", path.display()),
            Err(e) => tracing::warn!("Could not write playlist: {}", e),
        }
    }

    /// Take one album or track through the state machine.
    pub async fn process(&self, reference: &ReleaseRef) -> ReleaseReport {
        let mut log = StateLog::new(reference);

        if self.options.dedup
            && let Some(ledger) = self.ledger
        {
            match ledger.contains(&reference.id).await {
                Ok(true) => {
                    tracing::info!("{} is already downloaded, skipping", reference);
                    return log.finish(None, ReleaseOutcome::SkippedDuplicate);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!("Ledger lookup for {} failed: {}", reference, e);
                    return log.finish(None, ReleaseOutcome::LedgerFailed(e.to_string()));
                }
            }
        }

        log.advance(ReleaseState::Resolving);
        let release = match self.catalog.fetch(reference).await {
            Ok(release) => release,
            Err(e) => {
                tracing::error!("Could not fetch {}: {}", reference, e);
                return log.finish(None, ReleaseOutcome::CatalogFailed(e));
            }
        };
        let title = Some(release.album.album_title.clone());

        if self.options.albums_only && !release.is_proper_album() {
            tracing::info!(
                "Skipping {} ({}): not a proper album",
                release.album.album_title,
                release.release_type.as_deref().unwrap_or("unknown type")
            );
            return log.finish(title, ReleaseOutcome::Filtered);
        }

        let requested = self.options.quality;
        let available = release.available_tiers();
        let tier = match quality::resolve(requested, &available, self.options.fallback) {
            Resolution::Use(tier) => tier,
            Resolution::Skip => {
                tracing::info!(
                    "Skipping {}: {} is not available (available: {:?})",
                    release.album.album_title,
                    requested,
                    available
                );
                return log.finish(
                    title,
                    ReleaseOutcome::SkippedQuality {
                        requested,
                        available,
                    },
                );
            }
        };
        if tier != requested {
            tracing::info!(
                "{} is not available for {}, using {}",
                requested,
                release.album.album_title,
                tier
            );
        }

        let discs = model::group_discs(&release.tracks);
        let plan = organizer::plan(&release, &discs, &self.options.naming, tier);
        log.advance(ReleaseState::Planned);

        log.advance(ReleaseState::Writing);
        let album_dir = self.options.directory.join(&plan.album_dir);
        tracing::info!(
            "Downloading {} [{}] to {}",
            release.album.album_title,
            tier,
            album_dir.display()
        );

        let embedded = self.save_cover(&release, &album_dir).await;
        self.save_goodies(&release, &album_dir).await;

        let results: Vec<Result<TrackWrite, TrackFailure>> = stream::iter(plan.tracks.iter())
            .map(|planned| self.write_track(planned, tier, embedded.as_deref()))
            .buffer_unordered(self.options.max_workers.max(1))
            .collect()
            .await;

        let mut written = 0;
        let mut existing = 0;
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(TrackWrite::Written) => written += 1,
                Ok(TrackWrite::Existing) => existing += 1,
                Err(failure) => failures.push(failure),
            }
        }

        if !failures.is_empty() {
            tracing::error!(
                "{}: {} of {} tracks failed, not recording",
                release.album.album_title,
                failures.len(),
                plan.tracks.len()
            );
            return log.finish(title, ReleaseOutcome::Failed { tier, failures });
        }

        if let Some(ledger) = self.ledger {
            let entry = LedgerEntry {
                id: reference.id.clone(),
                media_type: reference.kind,
                quality: tier,
                saved_path: album_dir.clone(),
                url: reference.url.clone(),
                release_date: release.album.release_date.clone(),
                recorded_at: Utc::now(),
            };
            if let Err(e) = ledger.record(&entry).await {
                tracing::error!("Could not record {}: {}", reference, e);
                return log.finish(title, ReleaseOutcome::LedgerFailed(e.to_string()));
            }
        }

        let files = plan.tracks.iter().map(TrackFile::from).collect();
        log.finish(
            title,
            ReleaseOutcome::Done {
                tier,
                album_dir,
                written,
                existing,
                files,
            },
        )
    }

    /// Save `cover.jpg` and fetch the cover to embed, as configured.
    ///
    /// Returns the bytes to embed. Failures are logged and never fail the
    /// release.
    async fn save_cover(&self, release: &Release, album_dir: &Path) -> Option<Vec<u8>> {
        let cover = &self.options.cover;

        if !cover.no_cover {
            let path = album_dir.join(COVER_FILE_NAME);
            if self.writer.exists(&path).await {
                tracing::debug!("Cover already saved at {}", path.display());
            } else {
                match self.transport.fetch_cover(release, cover.saved_art_size).await {
                    Ok(bytes) => {
                        if let Err(e) = self.writer.write_file(&path, &bytes).await {
                            tracing::warn!("Could not save cover: {}", e);
                        }
                    }
                    Err(e) => tracing::warn!("Could not fetch cover: {}", e),
                }
            }
        }

        if !cover.embed_art {
            return None;
        }
        match self.transport.fetch_cover(release, cover.embedded_art_size).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("Could not fetch cover to embed: {}", e);
                None
            }
        }
    }

    /// Save the release's extras into the album folder.
    ///
    /// Failures are logged and never fail the release.
    async fn save_goodies(&self, release: &Release, album_dir: &Path) {
        for goody in &release.goodies {
            let stem = goody.file_stem(&release.album.album_title);
            let path = album_dir.join(format!("{}.pdf", template::sanitize(&stem, NameKind::File)));
            if self.writer.exists(&path).await {
                tracing::debug!("{} already exists, skipping", path.display());
                continue;
            }

            let bytes = match self.transport.fetch_goody(goody).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("Could not fetch extra {}: {}", goody.id, e);
                    continue;
                }
            };
            match self.writer.write_file(&path, &bytes).await {
                Ok(()) => tracing::debug!("Saved {}", path.display()),
                Err(e) => tracing::warn!("Could not save extra {}: {}", goody.id, e),
            }
        }
    }

    async fn write_track(
        &self,
        planned: &PlannedTrack,
        tier: QualityTier,
        cover: Option<&[u8]>,
    ) -> Result<TrackWrite, TrackFailure> {
        let path = self.options.directory.join(&planned.relative_path);
        let track = &planned.meta;

        if self.writer.exists(&path).await {
            tracing::debug!("{} already exists, skipping", path.display());
            return Ok(TrackWrite::Existing);
        }

        let fail = |error: TrackError| {
            tracing::warn!("Track {} failed: {}", track.track_id, error);
            TrackFailure {
                track_id: track.track_id.clone(),
                path: path.clone(),
                error,
            }
        };

        let audio = self
            .transport
            .fetch_audio(track, tier)
            .await
            .map_err(|e| fail(e.into()))?;

        let tags = metadata::assemble(track, &self.options.toggles);
        self.writer
            .write_track(&path, audio, &tags, cover)
            .await
            .map_err(|e| fail(e.into()))?;

        tracing::debug!("Wrote {}", path.display());
        Ok(TrackWrite::Written)
    }
}
