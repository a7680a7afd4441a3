//! Recursive "contains no files" probe.

use crate::core::remote::{DriveApi, FolderRef, ItemPayload};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Decides whether a folder holds no files at any depth
///
/// Each folder id is probed at most once per crawl. Asking again about
/// an id that was already probed answers "not empty", which also ends
/// any cycle in the folder graph.
pub struct EmptinessProbe<'a> {
    drive: &'a dyn DriveApi,
    probed: HashSet<String>,
}

impl<'a> EmptinessProbe<'a> {
    pub fn new(drive: &'a dyn DriveApi) -> Self {
        Self {
            drive,
            probed: HashSet::new(),
        }
    }

    /// Number of folders listed by the probe so far
    pub fn probed_count(&self) -> usize {
        self.probed.len()
    }

    pub fn is_effectively_empty(&mut self, folder_id: &str) -> bool {
        if !self.probed.insert(folder_id.to_string()) {
            debug!(folder_id, "Folder already probed, treating as not empty");
            return false;
        }

        let children = match self.drive.list_children(&FolderRef::Item(folder_id.to_string())) {
            Ok(children) => children,
            Err(e) => {
                warn!(folder_id, error = %e, "Emptiness probe failed, treating as not empty");
                return false;
            }
        };

        // A non-zero child count with nothing listed is inconsistent
        if children.is_empty() {
            return false;
        }

        for child in &children {
            match child.payload {
                ItemPayload::Folder { child_count: 0 } => continue,
                ItemPayload::Folder { .. } => {
                    if !self.is_effectively_empty(&child.id) {
                        return false;
                    }
                }
                ItemPayload::File { .. } | ItemPayload::Other => return false,
            }
        }

        debug!(folder_id, "Folder is effectively empty");
        true
    }
}
