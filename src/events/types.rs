//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};

/// All events emitted by background workers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Crawler events
    Crawl(CrawlEvent),
    /// Detector events
    Detect(DetectEvent),
}

/// Events during a crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CrawlEvent {
    /// Crawl has started
    Started { run_id: String },
    /// Human-readable progress line, one per cataloged item
    Progress { text: String },
    /// Raw thumbnail bytes for the preview pane
    Preview { item_id: String, bytes: Vec<u8> },
    /// A folder listing failed; its children were skipped
    FolderFailed { folder_id: String, message: String },
    /// Terminal event, emitted exactly once per run
    Finished { report: CrawlReport },
}

/// How a crawl ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlOutcome {
    /// The worklist was drained
    Completed,
    /// The controller requested a stop
    Stopped,
    /// The catalog store failed and the crawl was aborted
    Failed,
}

/// Report of one crawl run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    /// Identifier for correlating logs of one run
    pub run_id: String,
    pub outcome: CrawlOutcome,
    /// Folders whose children were listed
    pub folders_visited: usize,
    /// Rows in the media table at the end of the run
    pub media_rows: usize,
    /// Rows in the empty-folder table at the end of the run
    pub empty_folder_rows: usize,
    /// Folder listings that failed
    pub folder_failures: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl CrawlReport {
    /// Multi-line text shown as the final progress message
    pub fn to_text(&self) -> String {
        format!(
            "Folders visited: {}\nCataloged files: {}\nEmpty folders: {}\nCrawl finished in {:.2} seconds",
            self.folders_visited,
            self.media_rows,
            self.empty_folder_rows,
            self.duration_ms as f64 / 1000.0
        )
    }
}

/// The detectors a session can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DetectorKind {
    Exact,
    Visual,
    Useless,
    EmptyFolders,
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorKind::Exact => write!(f, "exact-match"),
            DetectorKind::Visual => write!(f, "visual-similarity"),
            DetectorKind::Useless => write!(f, "useless-file"),
            DetectorKind::EmptyFolders => write!(f, "empty-folder"),
        }
    }
}

/// Events from a detector run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DetectEvent {
    /// Detection has started
    Started { kind: DetectorKind },
    /// One finding, or the single "nothing found" sentinel line
    Line {
        kind: DetectorKind,
        text: String,
        /// Remote ids the line refers to (empty for the sentinel)
        item_ids: Vec<String>,
    },
    /// Detection finished with this many findings
    Finished { kind: DetectorKind, findings: usize },
    /// Detection aborted
    Failed { kind: DetectorKind, message: String },
}
