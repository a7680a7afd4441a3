//! Scripted in-memory drive.

use super::credentials::TokenProvider;
use super::{DeleteOutcome, DriveApi, DriveItem, FolderRef, ItemPayload};
use crate::error::RemoteError;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory drive for tests and offline runs
///
/// Folders are keyed by [`FolderRef`]; a folder that was never given
/// children lists as empty. A folder id may appear as a child of several
/// folders, including its own descendants, to model shared and cyclic
/// graphs.
#[derive(Default)]
pub struct InMemoryDrive {
    folders: Mutex<HashMap<FolderRef, Vec<DriveItem>>>,
    thumbnails: Mutex<HashMap<String, Vec<u8>>>,
    failing: Mutex<HashSet<FolderRef>>,
    deleted: Mutex<HashSet<String>>,
    listings: AtomicUsize,
    tokens: Option<Box<dyn TokenProvider>>,
}

impl InMemoryDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a token from `tokens` on every call
    pub fn with_tokens(mut self, tokens: Box<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Append a child to `parent`
    pub fn add_child(&self, parent: FolderRef, item: DriveItem) {
        lock(&self.folders).entry(parent).or_default().push(item);
    }

    /// Register the bytes returned for an item's thumbnail
    pub fn set_thumbnail(&self, item_id: impl Into<String>, bytes: Vec<u8>) {
        lock(&self.thumbnails).insert(item_id.into(), bytes);
    }

    /// Make every listing of `folder` fail with a 500
    pub fn fail_listing(&self, folder: FolderRef) {
        lock(&self.failing).insert(folder);
    }

    /// How many listings were served (failed ones included)
    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    /// Whether `delete_item` removed this id
    pub fn was_deleted(&self, item_id: &str) -> bool {
        lock(&self.deleted).contains(item_id)
    }

    fn authorize(&self) -> Result<(), RemoteError> {
        match &self.tokens {
            Some(tokens) if tokens.access_token().is_none() => Err(RemoteError::Unauthenticated),
            _ => Ok(()),
        }
    }

    /// Build a folder child
    pub fn folder(id: &str, name: &str, parent_path: &str, child_count: u64) -> DriveItem {
        DriveItem {
            id: id.to_string(),
            name: name.to_string(),
            size: 0,
            parent_path: parent_path.to_string(),
            created_at: fixed_time(),
            modified_at: fixed_time(),
            payload: ItemPayload::Folder { child_count },
        }
    }

    /// Build a file child
    pub fn file(
        id: &str,
        name: &str,
        parent_path: &str,
        mime_type: &str,
        size: u64,
        sha256: Option<&str>,
    ) -> DriveItem {
        DriveItem {
            id: id.to_string(),
            name: name.to_string(),
            size,
            parent_path: parent_path.to_string(),
            created_at: fixed_time(),
            modified_at: fixed_time(),
            payload: ItemPayload::File {
                mime_type: mime_type.to_string(),
                sha256: sha256.map(str::to_string),
            },
        }
    }
}

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl DriveApi for InMemoryDrive {
    fn list_children(&self, folder: &FolderRef) -> Result<Vec<DriveItem>, RemoteError> {
        self.authorize()?;
        self.listings.fetch_add(1, Ordering::SeqCst);

        if lock(&self.failing).contains(folder) {
            return Err(RemoteError::Status {
                endpoint: folder.children_endpoint(),
                status: 500,
            });
        }

        let deleted = lock(&self.deleted);
        Ok(lock(&self.folders)
            .get(folder)
            .map(|children| {
                children
                    .iter()
                    .filter(|c| !deleted.contains(&c.id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn thumbnail(&self, item_id: &str) -> Result<Vec<u8>, RemoteError> {
        self.authorize()?;
        lock(&self.thumbnails)
            .get(item_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound {
                item_id: item_id.to_string(),
            })
    }

    fn delete_item(&self, item_id: &str) -> Result<DeleteOutcome, RemoteError> {
        self.authorize()?;

        let known = lock(&self.folders)
            .values()
            .flatten()
            .any(|item| item.id == item_id);

        if !known || !lock(&self.deleted).insert(item_id.to_string()) {
            return Ok(DeleteOutcome::AlreadyGone);
        }

        Ok(DeleteOutcome::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::remote::{NoToken, StaticToken};

    fn drive() -> InMemoryDrive {
        let drive = InMemoryDrive::new();
        drive.add_child(FolderRef::Root, InMemoryDrive::folder("F", "Pics", "/drive/root:", 1));
        drive.add_child(
            FolderRef::Item("F".into()),
            InMemoryDrive::file("A", "a.jpg", "/drive/root:/Pics", "image/jpeg", 10, None),
        );
        drive
    }

    #[test]
    fn lists_registered_children() {
        let drive = drive();
        let root = drive.list_children(&FolderRef::Root).unwrap();

        assert_eq!(root.len(), 1);
        assert!(matches!(root[0].payload, ItemPayload::Folder { child_count: 1 }));
        assert_eq!(drive.list_children(&FolderRef::Item("F".into())).unwrap()[0].id, "A");
        assert!(drive.list_children(&FolderRef::Item("nope".into())).unwrap().is_empty());
        assert_eq!(drive.listing_count(), 3);
    }

    #[test]
    fn failing_folder_returns_status_error() {
        let drive = drive();
        drive.fail_listing(FolderRef::Root);

        assert!(matches!(
            drive.list_children(&FolderRef::Root),
            Err(RemoteError::Status { status: 500, .. })
        ));
    }

    #[test]
    fn delete_then_delete_again_is_already_gone() {
        let drive = drive();

        assert_eq!(drive.delete_item("A").unwrap(), DeleteOutcome::Deleted);
        assert_eq!(drive.delete_item("A").unwrap(), DeleteOutcome::AlreadyGone);
        assert!(drive.was_deleted("A"));
        assert!(drive.list_children(&FolderRef::Item("F".into())).unwrap().is_empty());
    }

    #[test]
    fn missing_thumbnail_is_not_found() {
        let drive = drive();
        drive.set_thumbnail("A", vec![1, 2, 3]);

        assert_eq!(drive.thumbnail("A").unwrap(), vec![1, 2, 3]);
        assert!(matches!(drive.thumbnail("B"), Err(RemoteError::NotFound { .. })));
    }

    #[test]
    fn token_provider_gates_calls() {
        let signed_out = drive().with_tokens(Box::new(NoToken));
        assert_eq!(
            signed_out.list_children(&FolderRef::Root),
            Err(RemoteError::Unauthenticated)
        );
        assert_eq!(signed_out.listing_count(), 0);

        let signed_in = drive().with_tokens(Box::new(StaticToken::new("t")));
        assert!(signed_in.list_children(&FolderRef::Root).is_ok());
    }
}
