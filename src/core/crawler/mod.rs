//! # Crawler Module
//!
//! Enumerates the remote drive and fills the catalog.
//!
//! ## How It Works
//! 1. Clear the catalog
//! 2. List folders level by level from a FIFO worklist, starting at the root
//! 3. Folder children are either recorded as empty or appended to the worklist
//! 4. File children are classified by MIME type, optionally previewed and
//!    hashed, then inserted
//! 5. Emit a summary and exactly one `Finished` event
//!
//! A [`CrawlControl`] handle pauses, resumes or stops the walk between
//! child items.

mod control;
mod emptiness;

pub use control::CrawlControl;
pub use emptiness::EmptinessProbe;

use crate::core::catalog::{CatalogStore, CatalogTable, EmptyFolderRecord, MediaKind, MediaRecord};
use crate::core::hasher::{HasherConfig, PerceptualHash, PerceptualHasher, DEFAULT_HASH_SIZE};
use crate::core::remote::{DriveApi, DriveItem, FolderRef, ItemPayload};
use crate::error::{CatalogError, RemoteError};
use crate::events::{CrawlEvent, CrawlOutcome, CrawlReport, Event, EventSender};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Folders with at least this many direct children skip the emptiness probe
pub const DEFAULT_EMPTY_PROBE_MAX_CHILDREN: u64 = 5;

/// Item categories a crawl can record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedKind {
    Image,
    Video,
    Document,
    EmptyFolder,
}

impl TrackedKind {
    pub const ALL: [TrackedKind; 4] = [
        TrackedKind::Image,
        TrackedKind::Video,
        TrackedKind::Document,
        TrackedKind::EmptyFolder,
    ];
}

impl From<MediaKind> for TrackedKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => TrackedKind::Image,
            MediaKind::Video => TrackedKind::Video,
            MediaKind::Document => TrackedKind::Document,
        }
    }
}

impl FromStr for TrackedKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" | "images" => Ok(TrackedKind::Image),
            "video" | "videos" => Ok(TrackedKind::Video),
            "document" | "documents" => Ok(TrackedKind::Document),
            "empty-folder" | "empty-folders" => Ok(TrackedKind::EmptyFolder),
            other => Err(format!("unknown item kind '{other}'")),
        }
    }
}

/// Crawl settings
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    root: FolderRef,
    tracked: HashSet<TrackedKind>,
    preview: bool,
    empty_probe_max_children: u64,
    hash_size: u32,
}

impl CrawlConfig {
    /// Whole drive, every kind, no preview
    pub fn new() -> Self {
        Self {
            root: FolderRef::Root,
            tracked: TrackedKind::ALL.into_iter().collect(),
            preview: false,
            empty_probe_max_children: DEFAULT_EMPTY_PROBE_MAX_CHILDREN,
            hash_size: DEFAULT_HASH_SIZE,
        }
    }

    /// Start from a folder other than the drive root
    pub fn root(mut self, root: FolderRef) -> Self {
        self.root = root;
        self
    }

    /// Replace the tracked kinds
    pub fn tracked_kinds(mut self, kinds: impl IntoIterator<Item = TrackedKind>) -> Self {
        self.tracked = kinds.into_iter().collect();
        self
    }

    /// Fetch thumbnails, emit previews and hash images
    pub fn preview(mut self, enabled: bool) -> Self {
        self.preview = enabled;
        self
    }

    pub fn empty_probe_max_children(mut self, max: u64) -> Self {
        self.empty_probe_max_children = max;
        self
    }

    /// Perceptual hash edge length
    pub fn hash_size(mut self, size: u32) -> Self {
        self.hash_size = size;
        self
    }

    pub fn tracks(&self, kind: TrackedKind) -> bool {
        self.tracked.contains(&kind)
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct WalkStats {
    folders_visited: usize,
    folder_failures: usize,
    auth_reported: bool,
}

/// Walks one drive into one catalog file
pub struct Crawler {
    drive: Arc<dyn DriveApi>,
    catalog_path: PathBuf,
    config: CrawlConfig,
    control: CrawlControl,
    hasher: PerceptualHasher,
}

impl Crawler {
    pub fn new(drive: Arc<dyn DriveApi>, catalog_path: impl Into<PathBuf>, config: CrawlConfig) -> Self {
        let hasher = HasherConfig::new().hash_size(config.hash_size).build();
        Self {
            drive,
            catalog_path: catalog_path.into(),
            config,
            control: CrawlControl::new(),
            hasher,
        }
    }

    /// Handle for pausing, resuming or stopping this crawler
    pub fn control(&self) -> CrawlControl {
        self.control.clone()
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Run the crawl to completion, stop, or store failure
    ///
    /// Never returns an error: failures are reported through `events`
    /// and the outcome in the returned report, which is also sent as
    /// the single `Finished` event.
    pub fn run(&self, events: &EventSender) -> CrawlReport {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();
        info!(%run_id, root = self.config.root.id(), preview = self.config.preview, "Crawl started");
        events.send(Event::Crawl(CrawlEvent::Started {
            run_id: run_id.clone(),
        }));

        let mut stats = WalkStats::default();
        let (outcome, store) = match self.open_cleared() {
            Ok(store) => match self.walk(&store, events, &mut stats) {
                Ok(outcome) => (outcome, Some(store)),
                Err(e) => {
                    self.report_store_failure(&e, events);
                    (CrawlOutcome::Failed, Some(store))
                }
            },
            Err(e) => {
                self.report_store_failure(&e, events);
                (CrawlOutcome::Failed, None)
            }
        };

        let count = |table: CatalogTable| {
            store
                .as_ref()
                .and_then(|s| s.count(table).ok())
                .unwrap_or(0)
        };

        let report = CrawlReport {
            run_id,
            outcome,
            folders_visited: stats.folders_visited,
            media_rows: count(CatalogTable::Media),
            empty_folder_rows: count(CatalogTable::EmptyFolders),
            folder_failures: stats.folder_failures,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            run_id = %report.run_id,
            outcome = ?report.outcome,
            folders = report.folders_visited,
            media = report.media_rows,
            empty_folders = report.empty_folder_rows,
            "Crawl finished"
        );
        events.progress(report.to_text());
        events.send(Event::Crawl(CrawlEvent::Finished {
            report: report.clone(),
        }));

        report
    }

    fn open_cleared(&self) -> Result<CatalogStore, CatalogError> {
        let store = CatalogStore::open(&self.catalog_path)?;
        store.clear()?;
        Ok(store)
    }

    fn report_store_failure(&self, e: &CatalogError, events: &EventSender) {
        error!(error = %e, "Catalog failure, aborting crawl");
        events.progress(format!("Crawl aborted: {e}"));
    }

    fn walk(
        &self,
        store: &CatalogStore,
        events: &EventSender,
        stats: &mut WalkStats,
    ) -> Result<CrawlOutcome, CatalogError> {
        let mut worklist = VecDeque::from([self.config.root.clone()]);
        let mut listed: HashSet<FolderRef> = HashSet::new();
        let mut probe = EmptinessProbe::new(self.drive.as_ref());

        while let Some(folder) = worklist.pop_front() {
            if !self.control.checkpoint() {
                info!("Crawl stopped");
                return Ok(CrawlOutcome::Stopped);
            }

            if !listed.insert(folder.clone()) {
                debug!(folder = folder.id(), "Folder already listed, skipping");
                continue;
            }

            let children = match self.drive.list_children(&folder) {
                Ok(children) => children,
                Err(e) => {
                    self.report_listing_failure(&folder, &e, events, stats);
                    continue;
                }
            };
            stats.folders_visited += 1;
            debug!(folder = folder.id(), children = children.len(), "Listed folder");

            for child in &children {
                if !self.control.checkpoint() {
                    info!("Crawl stopped");
                    return Ok(CrawlOutcome::Stopped);
                }

                match &child.payload {
                    ItemPayload::Folder { child_count } => {
                        self.visit_folder(child, *child_count, &mut probe, &mut worklist, store, events)?
                    }
                    ItemPayload::File { mime_type, sha256 } => {
                        self.visit_file(child, mime_type, sha256.clone(), store, events)?
                    }
                    ItemPayload::Other => debug!(id = %child.id, "Skipping item without file or folder facet"),
                }
            }
        }

        Ok(CrawlOutcome::Completed)
    }

    fn report_listing_failure(
        &self,
        folder: &FolderRef,
        e: &RemoteError,
        events: &EventSender,
        stats: &mut WalkStats,
    ) {
        stats.folder_failures += 1;
        warn!(folder = folder.id(), error = %e, "Folder listing failed, skipping");

        if e.is_auth() && !stats.auth_reported {
            stats.auth_reported = true;
            events.progress(format!("Authentication failed: {e}"));
        }

        events.send(Event::Crawl(CrawlEvent::FolderFailed {
            folder_id: folder.id().to_string(),
            message: e.to_string(),
        }));
    }

    fn visit_folder(
        &self,
        item: &DriveItem,
        child_count: u64,
        probe: &mut EmptinessProbe<'_>,
        worklist: &mut VecDeque<FolderRef>,
        store: &CatalogStore,
        events: &EventSender,
    ) -> Result<(), CatalogError> {
        if self.config.tracks(TrackedKind::EmptyFolder) {
            let empty = child_count == 0
                || (child_count < self.config.empty_probe_max_children
                    && probe.is_effectively_empty(&item.id));

            if empty {
                let record = EmptyFolderRecord {
                    id: item.id.clone(),
                    name: item.name.clone(),
                    size: item.size,
                    path: item.parent_path.clone(),
                };
                store.insert_empty_folder(&record)?;
                debug!(id = %item.id, "Recorded empty folder");
                events.progress(progress_line(item, "Empty folder"));
                return Ok(());
            }
        }

        worklist.push_back(FolderRef::Item(item.id.clone()));
        Ok(())
    }

    fn visit_file(
        &self,
        item: &DriveItem,
        mime_type: &str,
        sha256: Option<String>,
        store: &CatalogStore,
        events: &EventSender,
    ) -> Result<(), CatalogError> {
        let Some(kind) = MediaKind::from_mime(mime_type) else {
            debug!(id = %item.id, mime_type, "Untracked MIME type");
            return Ok(());
        };
        if !self.config.tracks(kind.into()) {
            return Ok(());
        }

        let perceptual = if self.config.preview {
            self.preview(item, kind, events)
        } else {
            None
        };

        let record = MediaRecord::new(
            item.id.clone(),
            kind,
            item.name.clone(),
            item.size,
            item.parent_path.clone(),
            item.created_at,
            item.modified_at,
        )
        .with_content_hash(sha256)
        .with_perceptual_hash(perceptual);

        if !store.insert(&record)? {
            debug!(id = %item.id, "Item already cataloged in this run");
        }
        events.progress(progress_line(item, &kind.to_string()));
        Ok(())
    }

    /// Fetch the thumbnail, publish it and hash it when it is an image
    fn preview(&self, item: &DriveItem, kind: MediaKind, events: &EventSender) -> Option<String> {
        let bytes = match self.drive.thumbnail(&item.id) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(id = %item.id, error = %e, "Thumbnail unavailable");
                return None;
            }
        };

        let hash = if kind == MediaKind::Image {
            match self.hasher.hash_bytes(&bytes) {
                Ok(hash) => Some(hash.to_hex()),
                Err(e) => {
                    warn!(id = %item.id, error = %e, "Perceptual hash failed");
                    None
                }
            }
        } else {
            None
        };

        events.send(Event::Crawl(CrawlEvent::Preview {
            item_id: item.id.clone(),
            bytes,
        }));
        hash
    }
}

/// One progress line per recorded item
pub fn progress_line(item: &DriveItem, kind: &str) -> String {
    format!(
        "Name: {} | ID: {} | Type: {} | Path: {}/{}",
        item.name, item.id, kind, item.parent_path, item.name
    )
}
