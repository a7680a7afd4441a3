//! # Remote Module
//!
//! Boundary to the cloud drive's item graph.
//!
//! ## Backends
//! - `GraphClient` - Microsoft Graph over HTTPS (blocking reqwest)
//! - `InMemoryDrive` - a scripted drive for tests and offline runs
//!
//! A missing credential makes every call fail with
//! [`RemoteError::Unauthenticated`]; nothing partially succeeds.

mod credentials;
mod graph;
mod memory;

pub use credentials::{EnvToken, NoToken, StaticToken, TokenProvider, TOKEN_ENV_VAR};
pub use graph::{GraphClient, GraphClientBuilder, GRAPH_BASE_URL};
pub use memory::InMemoryDrive;

use crate::error::RemoteError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A folder the crawler can list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FolderRef {
    /// The drive root
    Root,
    /// Any other folder, by remote id
    Item(String),
}

impl FolderRef {
    /// Relative Graph endpoint listing this folder's children
    pub fn children_endpoint(&self) -> String {
        match self {
            FolderRef::Root => "me/drive/root/children".to_string(),
            FolderRef::Item(id) => format!("me/drive/items/{id}/children"),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            FolderRef::Root => "root",
            FolderRef::Item(id) => id,
        }
    }
}

/// What kind of item a child is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemPayload {
    Folder {
        /// Direct children as reported by the drive
        child_count: u64,
    },
    File {
        mime_type: String,
        /// Content digest, when the drive computed one
        sha256: Option<String>,
    },
    /// Packages, notebooks and other facets the catalog ignores
    Other,
}

/// One child of a listed folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub size: u64,
    /// Parent folder path (e.g. `/drive/root:/Pictures`)
    pub parent_path: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub payload: ItemPayload,
}

/// Result of a delete call that reached the drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteOutcome {
    /// The item was deleted now
    Deleted,
    /// The drive no longer had the item (404)
    AlreadyGone,
}

/// Trait for drive backends
pub trait DriveApi: Send + Sync {
    /// List the direct children of a folder, following pagination
    ///
    /// Malformed children are dropped by the backend, not reported as
    /// an error.
    fn list_children(&self, folder: &FolderRef) -> Result<Vec<DriveItem>, RemoteError>;

    /// Fetch the encoded bytes of an item's large thumbnail
    fn thumbnail(&self, item_id: &str) -> Result<Vec<u8>, RemoteError>;

    /// Delete an item
    fn delete_item(&self, item_id: &str) -> Result<DeleteOutcome, RemoteError>;
}
