//! Audio file writing via lofty.
//!
//! Audio bytes land in a hidden temporary file next to the destination,
//! get tagged in place, and are renamed over the final path only once
//! tagging succeeded, so a crash never leaves a half-written file under a
//! name the next run would treat as done.

use async_trait::async_trait;
use lofty::config::{ParseOptions, WriteOptions};
use lofty::error::LoftyError;
use lofty::file::{AudioFile, FileType, TaggedFile, TaggedFileExt};
use lofty::id3::v2::Id3v2Tag;
use lofty::mpeg::MpegFile;
use lofty::picture::{Picture, PictureType};
use lofty::tag::{ItemKey, ItemValue, Tag, TagExt, TagItem, TagType};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::{TagName, TagSet};
use crate::catalog::{FileWriter, WriteError};

/// Lofty item key for a canonical tag name in a tag of `tag_type`.
///
/// `None` means lofty's generic tag cannot carry the name: ID3v2 keeps
/// `YEAR` in a `TXXX` frame, see [`user_text_names`].
fn item_key(name: TagName, tag_type: TagType) -> Option<ItemKey> {
    let id3v2 = tag_type == TagType::Id3v2;
    let key = match name {
        TagName::Album => ItemKey::AlbumTitle,
        TagName::AlbumArtist => ItemKey::AlbumArtist,
        TagName::Artist => ItemKey::TrackArtist,
        TagName::Title => ItemKey::TrackTitle,
        TagName::TrackNumber => ItemKey::TrackNumber,
        TagName::TrackTotal => ItemKey::TrackTotal,
        TagName::DiscNumber => ItemKey::DiscNumber,
        TagName::DiscTotal => ItemKey::DiscTotal,
        TagName::Composer => ItemKey::Composer,
        TagName::Date => ItemKey::RecordingDate,
        TagName::Genre => ItemKey::Genre,
        TagName::Copyright => ItemKey::CopyrightMessage,
        TagName::Label => ItemKey::Label,
        TagName::Isrc => ItemKey::Isrc,
        TagName::Barcode => ItemKey::Barcode,
        TagName::Year if id3v2 => return None,
        TagName::Year => ItemKey::Year,
        // TMED
        TagName::MediaType if id3v2 => ItemKey::OriginalMediaType,
        // TXXX:ITUNESADVISORY
        TagName::ItunesAdvisory if id3v2 => ItemKey::ParentalAdvisory,
        TagName::MediaType | TagName::ItunesAdvisory => {
            ItemKey::Unknown(name.as_str().to_string())
        }
    };
    Some(key)
}

/// Names written as ID3v2 user text frames, outside the generic tag.
fn user_text_names(tag_type: TagType) -> impl Iterator<Item = TagName> {
    TagName::ALL
        .into_iter()
        .filter(move |name| item_key(*name, tag_type).is_none())
}

/// Copy a tag set into a lofty tag, replacing existing values.
///
/// Names without an item key for the tag's type are skipped; [`tag_file`]
/// writes those through the format's own API.
pub fn apply_tags(tag: &mut Tag, tags: &TagSet) {
    let tag_type = tag.tag_type();
    for (name, value) in tags {
        match item_key(*name, tag_type) {
            None => {}
            // Free-form keys are not part of lofty's generic mapping
            Some(key @ ItemKey::Unknown(_)) => {
                tag.retain(|item| item.key() != &key);
                tag.insert_unchecked(TagItem::new(key, ItemValue::Text(value.clone())));
            }
            Some(key) => {
                tag.insert_text(key, value.clone());
            }
        }
    }
}

/// Read the canonical tags carried by a lofty tag.
pub fn read_tags(tag: &Tag) -> TagSet {
    let tag_type = tag.tag_type();
    TagName::ALL
        .into_iter()
        .filter_map(|name| {
            let key = item_key(name, tag_type)?;
            tag.get_string(&key).map(|value| (name, value.to_string()))
        })
        .collect()
}

/// Open by content, since staged files carry a `.tmp` extension.
fn open_tagged(path: &Path) -> Result<TaggedFile, LoftyError> {
    lofty::read_from(&mut std::fs::File::open(path)?)
}

fn tag_error(path: &Path, e: impl ToString) -> WriteError {
    WriteError::Tag {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Save `tag` to `path`, adding the user text frames ID3v2 needs.
fn save_tag(path: &Path, tag: &Tag, tags: &TagSet) -> Result<(), LoftyError> {
    if tag.tag_type() != TagType::Id3v2 {
        return tag.save_to_path(path, WriteOptions::default());
    }

    let mut id3v2 = Id3v2Tag::from(tag.clone());
    for name in user_text_names(TagType::Id3v2) {
        id3v2.remove_user_text(name.as_str());
        if let Some(value) = tags.get(&name) {
            id3v2.insert_user_text(name.as_str().to_string(), value.clone());
        }
    }
    id3v2.save_to_path(path, WriteOptions::default())
}

/// Tag the audio file at `path` in place.
pub fn tag_file(path: &Path, tags: &TagSet, cover: Option<&[u8]>) -> Result<(), WriteError> {
    let mut tagged_file = open_tagged(path).map_err(|e| tag_error(path, e))?;

    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .tag_mut(tag_type)
        .ok_or_else(|| tag_error(path, "no writable tag"))?;

    apply_tags(tag, tags);

    if let Some(bytes) = cover {
        match Picture::from_reader(&mut Cursor::new(bytes)) {
            Ok(mut picture) => {
                picture.set_pic_type(PictureType::CoverFront);
                tag.push_picture(picture);
            }
            Err(e) => tracing::warn!("Not embedding cover into {:?}: {}", path, e),
        }
    }

    save_tag(path, tag, tags).map_err(|e| tag_error(path, e))
}

/// Read the canonical tags of the audio file at `path`.
pub fn read_file_tags(path: &Path) -> Result<TagSet, WriteError> {
    let tagged_file = open_tagged(path).map_err(|e| tag_error(path, e))?;
    let mut tags = tagged_file
        .primary_tag()
        .map(read_tags)
        .unwrap_or_default();

    if tagged_file.file_type() == FileType::Mpeg {
        let mut file = std::fs::File::open(path).map_err(|e| WriteError::io(path, e))?;
        let mpeg = MpegFile::read_from(&mut file, ParseOptions::new())
            .map_err(|e| tag_error(path, e))?;
        if let Some(id3v2) = mpeg.id3v2() {
            for name in user_text_names(TagType::Id3v2) {
                if let Some(value) = id3v2.get_user_text(name.as_str()) {
                    tags.insert(name, value.to_string());
                }
            }
        }
    }
    Ok(tags)
}

/// Hidden temporary path next to `path`.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

async fn ensure_parent(path: &Path) -> Result<(), WriteError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| WriteError::io(parent, e))?;
    }
    Ok(())
}

/// Writes tagged audio files to the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyWriter;

#[async_trait]
impl FileWriter for LoftyWriter {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn write_track(
        &self,
        path: &Path,
        audio: Vec<u8>,
        tags: &TagSet,
        cover: Option<&[u8]>,
    ) -> Result<(), WriteError> {
        ensure_parent(path).await?;

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, &audio)
            .await
            .map_err(|e| WriteError::io(&tmp, e))?;

        let tags = tags.clone();
        let cover = cover.map(<[u8]>::to_vec);
        let tagged = {
            let tmp = tmp.clone();
            tokio::task::spawn_blocking(move || tag_file(&tmp, &tags, cover.as_deref()))
                .await
                .map_err(|e| WriteError::TaskJoin(e.to_string()))
                .and_then(|result| result)
        };

        let finished = match tagged {
            Ok(()) => tokio::fs::rename(&tmp, path)
                .await
                .map_err(|e| WriteError::io(path, e)),
            Err(e) => Err(e),
        };
        if finished.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        finished
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
        ensure_parent(path).await?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| WriteError::io(path, e))
    }
}
