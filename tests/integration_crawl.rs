//! Integration tests for the crawler.
//!
//! These tests drive a full crawl against an in-memory drive and a real
//! SQLite catalog in a temp directory:
//! - Stop mid-crawl and restart
//! - Missing credentials
//! - Cycles and shared subtrees
//! - Pause mid-walk, then resume or stop
//! - Session slot reuse

use drive_dedup::core::catalog::CatalogStore;
use drive_dedup::core::crawler::{CrawlConfig, CrawlControl, Crawler, TrackedKind};
use drive_dedup::core::remote::{
    DeleteOutcome, DriveApi, DriveItem, FolderRef, GraphClient, InMemoryDrive, NoToken,
};
use drive_dedup::core::session::Session;
use drive_dedup::error::RemoteError;
use drive_dedup::events::{null_sender, CrawlEvent, CrawlOutcome, CrawlReport, Event, EventChannel};
use crossbeam_channel::{unbounded, Receiver};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tempfile::TempDir;

const ROOT: &str = "/drive/root:";

fn image(id: &str, name: &str, parent: &str) -> DriveItem {
    InMemoryDrive::file(id, name, parent, "image/jpeg", 2048, None)
}

fn media_ids(store: &CatalogStore) -> Vec<String> {
    store
        .all_media_records()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect()
}

type ListingAction = Box<dyn Fn(&CrawlControl) + Send + Sync>;

/// Acts on the crawl's control the moment a given folder is listed
struct OnListing {
    inner: InMemoryDrive,
    trigger: FolderRef,
    control: OnceLock<CrawlControl>,
    action: ListingAction,
}

impl OnListing {
    fn new(inner: InMemoryDrive, trigger: &str, action: ListingAction) -> Self {
        Self {
            inner,
            trigger: FolderRef::Item(trigger.into()),
            control: OnceLock::new(),
            action,
        }
    }
}

impl DriveApi for OnListing {
    fn list_children(&self, folder: &FolderRef) -> Result<Vec<DriveItem>, RemoteError> {
        if folder == &self.trigger {
            if let Some(control) = self.control.get() {
                (self.action)(control);
            }
        }
        self.inner.list_children(folder)
    }

    fn thumbnail(&self, item_id: &str) -> Result<Vec<u8>, RemoteError> {
        self.inner.thumbnail(item_id)
    }

    fn delete_item(&self, item_id: &str) -> Result<DeleteOutcome, RemoteError> {
        self.inner.delete_item(item_id)
    }
}

fn two_level_drive() -> InMemoryDrive {
    let drive = InMemoryDrive::new();
    drive.add_child(FolderRef::Root, InMemoryDrive::folder("F", "Pictures", ROOT, 2));
    drive.add_child(FolderRef::Root, image("R1", "a.jpg", ROOT));
    drive.add_child(FolderRef::Root, image("R2", "b.jpg", ROOT));
    let pics = "/drive/root:/Pictures";
    drive.add_child(FolderRef::Item("F".into()), image("F1", "c.jpg", pics));
    drive.add_child(FolderRef::Item("F".into()), image("F2", "d.jpg", pics));
    drive
}

#[test]
fn stop_mid_crawl_keeps_only_earlier_rows() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("catalog.db");

    let drive = Arc::new(OnListing::new(two_level_drive(), "F", Box::new(|c| c.stop())));
    let config = CrawlConfig::new().tracked_kinds([TrackedKind::Image]);
    let crawler = Crawler::new(drive.clone(), &path, config);
    drive.control.set(crawler.control()).unwrap();

    let report = crawler.run(&null_sender());

    assert_eq!(report.outcome, CrawlOutcome::Stopped);
    assert_eq!(report.media_rows, 2);
    let store = CatalogStore::open(&path).unwrap();
    assert_eq!(media_ids(&store), vec!["R1", "R2"]);
}

#[test]
fn new_crawl_after_stop_starts_from_cleared_catalog() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("catalog.db");
    let config = CrawlConfig::new().tracked_kinds([TrackedKind::Image]);

    let stopped = Crawler::new(Arc::new(two_level_drive()), &path, config.clone());
    stopped.control().stop();
    assert_eq!(stopped.run(&null_sender()).media_rows, 0);

    let report = Crawler::new(Arc::new(two_level_drive()), &path, config).run(&null_sender());

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    let store = CatalogStore::open(&path).unwrap();
    assert_eq!(media_ids(&store), vec!["R1", "R2", "F1", "F2"]);
}

#[test]
fn missing_credential_completes_with_empty_catalog() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("catalog.db");

    // Never reaches the network: the token check fails first
    let client = GraphClient::builder(Box::new(NoToken))
        .base_url("http://127.0.0.1:9/")
        .build()
        .unwrap();

    let (sender, receiver) = EventChannel::new();
    let report = Crawler::new(Arc::new(client), &path, CrawlConfig::new()).run(&sender);
    drop(sender);

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.media_rows, 0);
    assert_eq!(report.empty_folder_rows, 0);
    assert_eq!(report.folder_failures, 1);

    let texts: Vec<String> = receiver
        .iter()
        .filter_map(|e| match e {
            Event::Crawl(CrawlEvent::Progress { text }) => Some(text),
            _ => None,
        })
        .collect();
    assert!(texts.iter().any(|t| t.starts_with("Authentication failed")));
}

#[test]
fn cycles_and_shared_subtrees_are_walked_once() {
    let drive = InMemoryDrive::new();
    drive.add_child(FolderRef::Root, InMemoryDrive::folder("A", "a", ROOT, 2));
    drive.add_child(FolderRef::Root, InMemoryDrive::folder("B", "b", ROOT, 2));
    drive.add_child(FolderRef::Item("A".into()), InMemoryDrive::folder("S", "shared", "/a", 1));
    drive.add_child(FolderRef::Item("A".into()), InMemoryDrive::folder("B", "b", "/a", 2));
    drive.add_child(FolderRef::Item("B".into()), InMemoryDrive::folder("S", "shared", "/b", 1));
    drive.add_child(FolderRef::Item("B".into()), InMemoryDrive::folder("A", "a", "/b", 2));
    drive.add_child(FolderRef::Item("S".into()), image("X", "x.jpg", "/shared"));
    let drive = Arc::new(drive);

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("catalog.db");
    let report = Crawler::new(drive.clone(), &path, CrawlConfig::new()).run(&null_sender());

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.folders_visited, 4);
    assert_eq!(report.media_rows, 1);
    assert_eq!(report.empty_folder_rows, 0);
}

/// Starts a crawl that pauses itself while listing folder F, and returns
/// once the pause has happened
fn crawl_paused_at_pictures(path: &Path) -> (CrawlControl, JoinHandle<CrawlReport>) {
    let (paused_tx, paused_rx): (_, Receiver<()>) = unbounded();
    let drive = Arc::new(OnListing::new(
        two_level_drive(),
        "F",
        Box::new(move |c| {
            c.pause();
            paused_tx.send(()).ok();
        }),
    ));
    let config = CrawlConfig::new().tracked_kinds([TrackedKind::Image]);
    let crawler = Crawler::new(drive.clone(), path, config);
    let control = crawler.control();
    drive.control.set(control.clone()).unwrap();

    let handle = thread::spawn(move || crawler.run(&null_sender()));
    paused_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    (control, handle)
}

#[test]
fn paused_crawl_holds_still_then_resumes_without_skipping() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("catalog.db");
    let (control, handle) = crawl_paused_at_pictures(&path);

    // the next child checkpoint blocks, so F1 and F2 cannot land
    thread::sleep(Duration::from_millis(200));
    let store = CatalogStore::open(&path).unwrap();
    assert_eq!(media_ids(&store), vec!["R1", "R2"]);
    assert!(!handle.is_finished());
    assert!(control.is_paused());

    control.resume();
    let report = handle.join().unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.media_rows, 4);
    assert_eq!(media_ids(&store), vec!["R1", "R2", "F1", "F2"]);
}

#[test]
fn stop_while_paused_ends_with_earlier_rows_only() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("catalog.db");
    let (control, handle) = crawl_paused_at_pictures(&path);

    control.stop();
    let report = handle.join().unwrap();

    assert_eq!(report.outcome, CrawlOutcome::Stopped);
    assert_eq!(report.media_rows, 2);
    let store = CatalogStore::open(&path).unwrap();
    assert_eq!(media_ids(&store), vec!["R1", "R2"]);
}

#[test]
fn session_crawl_slot_is_free_after_join() {
    let temp_dir = TempDir::new().unwrap();
    let session = Session::new(temp_dir.path().join("catalog.db"), Arc::new(two_level_drive()));

    let report = session
        .start_crawl(CrawlConfig::new(), null_sender())
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(report.outcome, CrawlOutcome::Completed);
    assert_eq!(report.media_rows, 4);

    let again = session.start_crawl(CrawlConfig::new(), null_sender()).unwrap();
    assert_eq!(again.join().unwrap().media_rows, 4);
}

#[test]
fn session_stop_leaves_a_traversal_prefix() {
    let temp_dir = TempDir::new().unwrap();
    let session = Session::new(temp_dir.path().join("catalog.db"), Arc::new(two_level_drive()));

    let handle = session.start_crawl(CrawlConfig::new(), null_sender()).unwrap();
    handle.stop();
    let report = handle.join().unwrap();

    // stop raced the worker: whatever landed is a prefix of the traversal
    let ids = media_ids(&session.catalog().unwrap());
    let order = ["R1", "R2", "F1", "F2"];
    assert_eq!(ids, order[..ids.len()].to_vec());
    assert_eq!(report.media_rows, ids.len());
}
