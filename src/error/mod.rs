//! # Error Module
//!
//! Error types for the drive catalog and detectors.
//!
//! ## Design Principles
//! - **Never panic** on remote data - return errors instead
//! - **Include context** - item ids, paths, status codes
//! - **Classify** - transient remote failures are distinguishable from
//!   credential and store failures, because callers treat them differently

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum DriveDedupError {
    #[error("Remote drive error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Detection error: {0}")]
    Detect(#[from] DetectError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A {job} is already running")]
    Busy { job: String },

    #[error("Background worker panicked: {0}")]
    Worker(String),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by the remote drive API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("No access token available. Sign in again and retry.")]
    Unauthenticated,

    #[error("Item not found: {item_id}")]
    NotFound { item_id: String },

    #[error("Request to {endpoint} failed with status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Network error calling {endpoint}: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Malformed response from {endpoint}: {reason}")]
    Malformed { endpoint: String, reason: String },
}

impl RemoteError {
    /// True when the failure comes from the credential, not the item
    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Unauthenticated)
            || matches!(self, RemoteError::Status { status: 401 | 403, .. })
    }
}

/// Errors from the local catalog store
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to open catalog database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Catalog query failed: {0}")]
    QueryFailed(String),

    #[error("Catalog corruption detected at {path}. Delete this file and crawl again.")]
    Corrupted { path: PathBuf },
}

impl From<rusqlite::Error> for CatalogError {
    fn from(error: rusqlite::Error) -> Self {
        CatalogError::QueryFailed(error.to_string())
    }
}

/// Errors that occur while hashing thumbnails
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to decode thumbnail: {reason}")]
    DecodeError { reason: String },

    #[error("Thumbnail is empty")]
    EmptyImage,

    #[error("Invalid perceptual hash '{value}'")]
    InvalidHex { value: String },

    #[error("Hash computation failed: {0}")]
    ComputationFailed(String),
}

/// Errors raised by the detectors
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Invalid threshold: {value} (must be 0-100)")]
    InvalidThreshold { value: u32 },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, DriveDedupError>;
