//! # Core Module
//!
//! The UI-agnostic catalog and detection engine.
//!
//! ## Modules
//! - `remote` - Drive API boundary and its Graph and in-memory backends
//! - `catalog` - SQLite record set built by a crawl
//! - `hasher` - Perceptual hashes of thumbnails
//! - `crawler` - Level-order walk of the drive into the catalog
//! - `detector` - Exact, visual and useless-file detection
//! - `reporter` - Text lines for findings
//! - `session` - Background workers and the one-at-a-time policy

pub mod catalog;
pub mod crawler;
pub mod detector;
pub mod hasher;
pub mod remote;
pub mod reporter;
pub mod session;

// Re-export commonly used types
pub use catalog::{CatalogStore, MediaKind, MediaRecord};
pub use crawler::{CrawlConfig, CrawlControl, Crawler, TrackedKind};
pub use detector::{DuplicatePair, Findings};
pub use hasher::PerceptualHash;
pub use remote::{DriveApi, FolderRef};
pub use session::Session;
