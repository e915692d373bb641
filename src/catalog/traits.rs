//! Trait definitions for the download engine's collaborators.
//!
//! These traits enable dependency injection and mocking for tests.
//! Production code uses [`crate::api::Client`] for the catalog and
//! transport, and [`crate::metadata::writer::LoftyWriter`] for files;
//! tests substitute the implementations in [`mocks`].

use async_trait::async_trait;
use std::path::Path;

use super::{CatalogError, Collection, CoverSize, Goody, Release, TransportError, WriteError};
use crate::metadata::TagSet;
use crate::model::{QualityTier, ReleaseRef, TrackMeta};

/// Source of release metadata.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Fetch an album or track with all of its track records.
    async fn fetch(&self, reference: &ReleaseRef) -> Result<Release, CatalogError>;

    /// List what a reference stands for: the reference itself for albums and
    /// tracks, the albums of an artist or label, the tracks of a playlist.
    async fn expand(&self, reference: &ReleaseRef) -> Result<Collection, CatalogError>;
}

/// Byte transport for audio and artwork.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_audio(
        &self,
        track: &TrackMeta,
        tier: QualityTier,
    ) -> Result<Vec<u8>, TransportError>;

    async fn fetch_cover(&self, release: &Release, size: CoverSize)
    -> Result<Vec<u8>, TransportError>;

    async fn fetch_goody(&self, goody: &Goody) -> Result<Vec<u8>, TransportError>;
}

/// Writes audio files with tags, and plain files, to disk.
///
/// Implementations create parent directories as needed.
#[async_trait]
pub trait FileWriter: Send + Sync {
    /// Whether a finished file is already present at `path`.
    async fn exists(&self, path: &Path) -> bool;

    async fn write_track(
        &self,
        path: &Path,
        audio: Vec<u8>,
        tags: &TagSet,
        cover: Option<&[u8]>,
    ) -> Result<(), WriteError>;

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), WriteError>;
}

/// Mock collaborators for testing.
///
/// Each mock records the calls it receives so tests can assert on what the
/// engine did (or did not) do.
#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::catalog::CollectionEntry;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet};
    use std::path::PathBuf;

    /// Mock catalog serving predefined releases and collections.
    #[derive(Default)]
    pub struct MockCatalog {
        pub releases: HashMap<String, Release>,
        pub collections: HashMap<String, Collection>,
        /// Errors by id (take precedence over releases)
        pub errors: HashMap<String, CatalogError>,
        pub fetched: Mutex<Vec<String>>,
    }

    impl MockCatalog {
        pub fn with_release(release: Release) -> Self {
            let mut mock = Self::default();
            mock.add(release);
            mock
        }

        pub fn add(&mut self, release: Release) {
            self.releases.insert(release.reference.id.clone(), release);
        }

        pub fn fetch_count(&self) -> usize {
            self.fetched.lock().len()
        }
    }

    #[async_trait]
    impl CatalogProvider for MockCatalog {
        async fn fetch(&self, reference: &ReleaseRef) -> Result<Release, CatalogError> {
            self.fetched.lock().push(reference.id.clone());
            if let Some(err) = self.errors.get(&reference.id) {
                return Err(err.clone());
            }
            self.releases
                .get(&reference.id)
                .cloned()
                .ok_or_else(|| CatalogError::NotFound(reference.to_string()))
        }

        async fn expand(&self, reference: &ReleaseRef) -> Result<Collection, CatalogError> {
            if let Some(err) = self.errors.get(&reference.id) {
                return Err(err.clone());
            }
            if !reference.kind.is_collection() {
                return Ok(Collection {
                    name: None,
                    entries: vec![CollectionEntry::bare(reference.clone())],
                });
            }
            self.collections
                .get(&reference.id)
                .cloned()
                .ok_or_else(|| CatalogError::NotFound(reference.to_string()))
        }
    }

    /// Mock transport returning fixed bytes.
    #[derive(Default)]
    pub struct MockTransport {
        /// Track ids whose audio fetch fails
        pub failing_tracks: HashSet<String>,
        /// Cover bytes; `None` makes cover fetches fail
        pub cover: Option<Vec<u8>>,
        /// Goody ids whose fetch fails
        pub failing_goodies: HashSet<String>,
        pub audio_calls: Mutex<Vec<(String, QualityTier)>>,
        pub cover_calls: Mutex<Vec<CoverSize>>,
        pub goody_calls: Mutex<Vec<String>>,
    }

    impl MockTransport {
        pub fn with_cover() -> Self {
            Self {
                cover: Some(vec![0xFF, 0xD8, 0xFF, 0xE0]),
                ..Self::default()
            }
        }

        pub fn failing(track_ids: &[&str]) -> Self {
            Self {
                failing_tracks: track_ids.iter().map(|s| s.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.audio_calls.lock().len() + self.cover_calls.lock().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn fetch_audio(
            &self,
            track: &TrackMeta,
            tier: QualityTier,
        ) -> Result<Vec<u8>, TransportError> {
            self.audio_calls.lock().push((track.track_id.clone(), tier));
            if self.failing_tracks.contains(&track.track_id) {
                return Err(TransportError::Network("connection reset".to_string()));
            }
            Ok(format!("audio:{}", track.track_id).into_bytes())
        }

        async fn fetch_cover(
            &self,
            _release: &Release,
            size: CoverSize,
        ) -> Result<Vec<u8>, TransportError> {
            self.cover_calls.lock().push(size);
            self.cover.clone().ok_or(TransportError::NoCover)
        }

        async fn fetch_goody(&self, goody: &Goody) -> Result<Vec<u8>, TransportError> {
            self.goody_calls.lock().push(goody.id.clone());
            if self.failing_goodies.contains(&goody.id) {
                return Err(TransportError::Status(404));
            }
            Ok(b"%PDF-1.4".to_vec())
        }
    }

    /// A track write captured by [`MockWriter`].
    #[derive(Debug, Clone)]
    pub struct WrittenTrack {
        pub path: PathBuf,
        pub audio: Vec<u8>,
        pub tags: TagSet,
        pub embedded_cover: bool,
    }

    /// Mock writer that records writes in memory.
    #[derive(Default)]
    pub struct MockWriter {
        /// Paths reported as already present
        pub existing: HashSet<PathBuf>,
        /// Paths whose write fails
        pub failing: HashSet<PathBuf>,
        pub tracks: Mutex<Vec<WrittenTrack>>,
        pub files: Mutex<Vec<PathBuf>>,
        /// Contents of plain files, by path
        pub contents: Mutex<HashMap<PathBuf, Vec<u8>>>,
    }

    impl MockWriter {
        pub fn written_paths(&self) -> Vec<PathBuf> {
            let mut paths: Vec<_> = self.tracks.lock().iter().map(|t| t.path.clone()).collect();
            paths.sort();
            paths
        }

        /// Text of a plain file written to `path`.
        pub fn text(&self, path: &Path) -> Option<String> {
            self.contents
                .lock()
                .get(path)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        }
    }

    #[async_trait]
    impl FileWriter for MockWriter {
        async fn exists(&self, path: &Path) -> bool {
            self.existing.contains(path)
        }

        async fn write_track(
            &self,
            path: &Path,
            audio: Vec<u8>,
            tags: &TagSet,
            cover: Option<&[u8]>,
        ) -> Result<(), WriteError> {
            if self.failing.contains(path) {
                return Err(WriteError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ));
            }
            self.tracks.lock().push(WrittenTrack {
                path: path.to_path_buf(),
                audio,
                tags: tags.clone(),
                embedded_cover: cover.is_some(),
            });
            Ok(())
        }

        async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
            if self.failing.contains(path) {
                return Err(WriteError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ));
            }
            self.files.lock().push(path.to_path_buf());
            self.contents.lock().insert(path.to_path_buf(), bytes.to_vec());
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::model::ReleaseKind;
        use crate::test_utils::{mock_release, mock_track};

        #[tokio::test]
        async fn test_mock_catalog_serves_release() {
            let release = mock_release(&[(1, 1)]);
            let reference = release.reference.clone();
            let mock = MockCatalog::with_release(release);
            let fetched = mock.fetch(&reference).await.unwrap();
            assert_eq!(fetched.reference, reference);
            assert_eq!(mock.fetch_count(), 1);
        }

        #[tokio::test]
        async fn test_mock_catalog_unknown_is_not_found() {
            let mock = MockCatalog::default();
            let result = mock.fetch(&ReleaseRef::new(ReleaseKind::Album, "nope")).await;
            assert!(matches!(result, Err(CatalogError::NotFound(_))));
        }

        #[tokio::test]
        async fn test_mock_transport_failures() {
            let mock = MockTransport::failing(&["t1"]);
            let mut track = mock_track(1, 1, "Song");
            track.track_id = "t1".to_string();
            assert!(mock.fetch_audio(&track, QualityTier::Lossless).await.is_err());
            track.track_id = "t2".to_string();
            assert!(mock.fetch_audio(&track, QualityTier::Lossless).await.is_ok());
            assert_eq!(mock.call_count(), 2);
        }
    }
}
