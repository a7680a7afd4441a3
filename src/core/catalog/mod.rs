//! # Catalog Module
//!
//! The local record set built by one crawl pass.
//!
//! ## Tables
//! - `media` - one row per cataloged file ([`MediaRecord`])
//! - `empty_folder` - one row per folder holding no files at any depth
//!   ([`EmptyFolderRecord`])
//!
//! Both tables are cleared at the start of every crawl; rows are never
//! updated in place.
//!
//! ## Concurrency
//! Every component opens its own [`CatalogStore`] handle. One crawler may
//! write while detectors read; SQLite serializes individual statements and
//! no snapshot is held across queries.

mod sqlite;

pub use sqlite::CatalogStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Kinds of files the crawler catalogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

impl MediaKind {
    /// Classify a MIME type by prefix
    ///
    /// Returns `None` for prefixes the catalog does not track.
    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else if mime.starts_with("application/") {
            Some(MediaKind::Document)
        } else {
            None
        }
    }

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "document" => Ok(MediaKind::Document),
            other => Err(format!("unknown media kind '{other}'")),
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "Image"),
            MediaKind::Video => write!(f, "Video"),
            MediaKind::Document => write!(f, "Document"),
        }
    }
}

/// One cataloged file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Remote-unique identifier
    pub id: String,
    pub kind: MediaKind,
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Content digest reported by the drive, absent for some file types
    pub content_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Hex perceptual hash; only ever set on images
    perceptual_hash: Option<String>,
    /// Parent folder path, without the name
    pub path: String,
}

impl MediaRecord {
    /// Create a record without a perceptual hash
    pub fn new(
        id: impl Into<String>,
        kind: MediaKind,
        name: impl Into<String>,
        size: u64,
        path: impl Into<String>,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            size,
            content_hash: None,
            created_at,
            modified_at,
            perceptual_hash: None,
            path: path.into(),
        }
    }

    /// Set the drive's content digest
    pub fn with_content_hash(mut self, hash: Option<String>) -> Self {
        self.content_hash = hash.filter(|h| !h.is_empty());
        self
    }

    /// Attach a perceptual hash
    ///
    /// Ignored unless the record is an image.
    pub fn with_perceptual_hash(mut self, hash: Option<String>) -> Self {
        if self.kind == MediaKind::Image {
            self.perceptual_hash = hash.filter(|h| !h.is_empty());
        }
        self
    }

    pub fn perceptual_hash(&self) -> Option<&str> {
        self.perceptual_hash.as_deref()
    }

    /// Parent path and name joined for display
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.path, self.name)
    }
}

/// A folder holding no files at any depth
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyFolderRecord {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub path: String,
}

impl EmptyFolderRecord {
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.path, self.name)
    }
}

/// The two catalog tables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogTable {
    Media,
    EmptyFolders,
}

impl CatalogTable {
    pub(crate) fn table_name(&self) -> &'static str {
        match self {
            CatalogTable::Media => "media",
            CatalogTable::EmptyFolders => "empty_folder",
        }
    }
}

/// Keys the exact-match queries group on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DuplicateKey {
    /// Same name and same size
    NameAndSize,
    /// Same size only
    Size,
    /// Same drive content digest
    ContentHash,
}

/// Aggregate numbers about the current catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub images: usize,
    pub videos: usize,
    pub documents: usize,
    /// Images carrying a perceptual hash
    pub hashed_images: usize,
    pub empty_folders: usize,
    pub total_size_bytes: u64,
}

impl CatalogStats {
    pub fn total_files(&self) -> usize {
        self.images + self.videos + self.documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: MediaKind) -> MediaRecord {
        let now = Utc::now();
        MediaRecord::new("ID1", kind, "a.jpg", 10, "/drive/root:", now, now)
    }

    #[test]
    fn mime_prefix_classification() {
        assert_eq!(MediaKind::from_mime("image/jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("video/mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("application/pdf"), Some(MediaKind::Document));
        assert_eq!(MediaKind::from_mime("text/plain"), None);
        assert_eq!(MediaKind::from_mime("audio/mpeg"), None);
    }

    #[test]
    fn media_kind_round_trips_through_storage_name() {
        for kind in [MediaKind::Image, MediaKind::Video, MediaKind::Document] {
            assert_eq!(kind.as_str().parse::<MediaKind>().unwrap(), kind);
        }
        assert!("folder".parse::<MediaKind>().is_err());
    }

    #[test]
    fn perceptual_hash_only_sticks_to_images() {
        let image = record(MediaKind::Image).with_perceptual_hash(Some("ff00".into()));
        assert_eq!(image.perceptual_hash(), Some("ff00"));

        let video = record(MediaKind::Video).with_perceptual_hash(Some("ff00".into()));
        assert_eq!(video.perceptual_hash(), None);
    }

    #[test]
    fn empty_hashes_are_treated_as_absent() {
        let rec = record(MediaKind::Image)
            .with_content_hash(Some(String::new()))
            .with_perceptual_hash(Some(String::new()));
        assert_eq!(rec.content_hash, None);
        assert_eq!(rec.perceptual_hash(), None);
    }

    #[test]
    fn full_path_joins_parent_and_name() {
        assert_eq!(record(MediaKind::Image).full_path(), "/drive/root:/a.jpg");
    }
}
