//! Background workers and the one-at-a-time policy.
//!
//! A [`Session`] owns the drive client and the catalog location. It
//! starts the crawler and the detectors on their own threads, each with
//! its own catalog handle, and refuses to start a second crawl or a
//! second detector of the same kind while one is in flight.

use crate::core::catalog::CatalogStore;
use crate::core::crawler::{CrawlConfig, CrawlControl, Crawler};
use crate::core::detector::{
    DuplicatePair, ExactMatchDetector, UselessDetector, UselessMode, UselessOptions, VisualDetector,
};
use crate::core::remote::{DeleteOutcome, DriveApi};
use crate::core::reporter::{empty_folder_findings, empty_folder_text, pair_text, render, useless_text};
use crate::error::{DetectError, DriveDedupError, Result};
use crate::events::{CrawlReport, DetectEvent, DetectorKind, Event, EventSender};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Crawl,
    Detector(DetectorKind),
}

impl Slot {
    fn job_name(&self) -> String {
        match self {
            Slot::Crawl => "crawl".to_string(),
            Slot::Detector(kind) => format!("{kind} detection"),
        }
    }
}

type BusySlots = Arc<Mutex<HashSet<Slot>>>;

/// Holds a slot until dropped
struct SlotGuard {
    busy: BusySlots,
    slot: Slot,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.slot);
    }
}

/// A crawl running on its own thread
pub struct CrawlHandle {
    control: CrawlControl,
    handle: JoinHandle<CrawlReport>,
}

impl CrawlHandle {
    pub fn control(&self) -> &CrawlControl {
        &self.control
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the crawl; the crawl slot is free once this returns
    pub fn join(self) -> Result<CrawlReport> {
        self.handle
            .join()
            .map_err(|_| DriveDedupError::Worker("crawler thread panicked".to_string()))
    }
}

/// A detector running on its own thread
pub struct DetectorHandle {
    kind: DetectorKind,
    handle: JoinHandle<Result<usize>>,
}

impl DetectorHandle {
    pub fn kind(&self) -> DetectorKind {
        self.kind
    }

    /// Wait for the detector and return its finding count
    pub fn join(self) -> Result<usize> {
        self.handle
            .join()
            .map_err(|_| DriveDedupError::Worker(format!("{} detector panicked", self.kind)))?
    }
}

/// Text lines plus the number of real findings behind them
type Rendered = (Vec<(String, Vec<String>)>, usize);

/// Controller-side entry point
pub struct Session {
    catalog_path: PathBuf,
    drive: Arc<dyn DriveApi>,
    busy: BusySlots,
}

impl Session {
    pub fn new(catalog_path: impl Into<PathBuf>, drive: Arc<dyn DriveApi>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            drive,
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn catalog_path(&self) -> &Path {
        &self.catalog_path
    }

    /// Open a fresh catalog handle
    pub fn catalog(&self) -> Result<CatalogStore> {
        Ok(CatalogStore::open(&self.catalog_path)?)
    }

    fn claim(&self, slot: Slot) -> Result<SlotGuard> {
        let mut busy = self.busy.lock().unwrap_or_else(|e| e.into_inner());
        if !busy.insert(slot) {
            return Err(DriveDedupError::Busy {
                job: slot.job_name(),
            });
        }
        Ok(SlotGuard {
            busy: Arc::clone(&self.busy),
            slot,
        })
    }

    /// Start a crawl; fails with `Busy` while another crawl is running
    pub fn start_crawl(&self, config: CrawlConfig, events: EventSender) -> Result<CrawlHandle> {
        let guard = self.claim(Slot::Crawl)?;
        let crawler = Crawler::new(Arc::clone(&self.drive), self.catalog_path.clone(), config);
        let control = crawler.control();

        let handle = thread::spawn(move || {
            let _guard = guard;
            crawler.run(&events)
        });

        Ok(CrawlHandle { control, handle })
    }

    pub fn start_exact(&self, events: EventSender) -> Result<DetectorHandle> {
        let path = self.catalog_path.clone();
        self.spawn_detector(DetectorKind::Exact, events, move || {
            let store = CatalogStore::open(&path)?;
            let findings = ExactMatchDetector::new(store).find_exact_duplicates()?;
            Ok((render(&findings, pair_text, DuplicatePair::ids), findings.len()))
        })
    }

    pub fn start_visual(&self, threshold: u32, events: EventSender) -> Result<DetectorHandle> {
        if threshold > 100 {
            return Err(DetectError::InvalidThreshold { value: threshold }.into());
        }

        let path = self.catalog_path.clone();
        self.spawn_detector(DetectorKind::Visual, events, move || {
            let store = CatalogStore::open(&path)?;
            let findings = VisualDetector::new(store).find_visual_duplicates(threshold)?;
            Ok((render(&findings, pair_text, DuplicatePair::ids), findings.len()))
        })
    }

    pub fn start_useless(
        &self,
        mode: UselessMode,
        options: UselessOptions,
        events: EventSender,
    ) -> Result<DetectorHandle> {
        let path = self.catalog_path.clone();
        self.spawn_detector(DetectorKind::Useless, events, move || {
            let store = CatalogStore::open(&path)?;
            let findings = UselessDetector::load(&store)?.find_useless(mode, options);
            let lines = render(
                &findings,
                |c| useless_text(c, &options),
                |c| vec![c.item.id.clone()],
            );
            Ok((lines, findings.len()))
        })
    }

    pub fn start_empty_folders(&self, events: EventSender) -> Result<DetectorHandle> {
        let path = self.catalog_path.clone();
        self.spawn_detector(DetectorKind::EmptyFolders, events, move || {
            let store = CatalogStore::open(&path)?;
            let findings = empty_folder_findings(store.all_empty_folders()?);
            let lines = render(&findings, empty_folder_text, |f| vec![f.id.clone()]);
            Ok((lines, findings.len()))
        })
    }

    fn spawn_detector<F>(&self, kind: DetectorKind, events: EventSender, job: F) -> Result<DetectorHandle>
    where
        F: FnOnce() -> Result<Rendered> + Send + 'static,
    {
        let guard = self.claim(Slot::Detector(kind))?;

        let handle = thread::spawn(move || {
            events.send(Event::Detect(DetectEvent::Started { kind }));
            let outcome = job();
            // Free the slot before the terminal event so a listener can restart at once
            drop(guard);

            match outcome {
                Ok((lines, findings)) => {
                    for (text, ids) in lines {
                        events.line(kind, text, ids);
                    }
                    info!(%kind, findings, "Detector finished");
                    events.send(Event::Detect(DetectEvent::Finished { kind, findings }));
                    Ok(findings)
                }
                Err(e) => {
                    error!(%kind, error = %e, "Detector failed");
                    events.send(Event::Detect(DetectEvent::Failed {
                        kind,
                        message: e.to_string(),
                    }));
                    Err(e)
                }
            }
        });

        Ok(DetectorHandle { kind, handle })
    }

    /// Delete an item on the drive, then drop its catalog row
    ///
    /// The row is kept when the remote call fails.
    pub fn delete_item(&self, item_id: &str) -> Result<DeleteOutcome> {
        let outcome = self.drive.delete_item(item_id)?;
        let removed = self.catalog()?.remove(item_id)?;
        info!(item_id, ?outcome, removed, "Deleted item");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{MediaKind, MediaRecord};
    use crate::core::detector::NO_EXACT_DUPLICATES;
    use crate::core::remote::{FolderRef, InMemoryDrive};
    use crate::events::{EventChannel, EventReceiver};
    use chrono::Utc;
    use tempfile::TempDir;

    fn session() -> (TempDir, Arc<InMemoryDrive>, Session) {
        let dir = TempDir::new().unwrap();
        let drive = Arc::new(InMemoryDrive::new());
        let session = Session::new(dir.path().join("catalog.db"), drive.clone());
        (dir, drive, session)
    }

    fn detect_lines(receiver: &EventReceiver) -> Vec<String> {
        receiver
            .iter()
            .filter_map(|e| match e {
                Event::Detect(DetectEvent::Line { text, .. }) => Some(text),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_catalog_exact_run_emits_sentinel() {
        let (_dir, _drive, session) = session();
        let (sender, receiver) = EventChannel::new();

        let findings = session.start_exact(sender).unwrap().join().unwrap();

        assert_eq!(findings, 0);
        assert_eq!(detect_lines(&receiver), vec![NO_EXACT_DUPLICATES.to_string()]);
    }

    #[test]
    fn second_detector_of_same_kind_is_busy() {
        let (_dir, _drive, session) = session();
        let first = session.claim(Slot::Detector(DetectorKind::Visual)).unwrap();

        let err = session
            .start_visual(10, crate::events::null_sender())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "A visual-similarity detection is already running");

        // other kinds are unaffected
        let exact = session.start_exact(crate::events::null_sender()).unwrap();
        assert_eq!(exact.join().unwrap(), 0);

        drop(first);
        let visual = session.start_visual(10, crate::events::null_sender()).unwrap();
        assert_eq!(visual.kind(), DetectorKind::Visual);
        assert_eq!(visual.join().unwrap(), 0);
    }

    #[test]
    fn slot_is_released_after_join() {
        let (_dir, _drive, session) = session();
        session.start_exact(crate::events::null_sender()).unwrap().join().unwrap();
        let again = session.start_exact(crate::events::null_sender()).unwrap();
        assert!(again.join().is_ok());
    }

    #[test]
    fn only_one_crawl_at_a_time() {
        let (_dir, _drive, session) = session();
        let _held = session.claim(Slot::Crawl).unwrap();

        let err = session
            .start_crawl(CrawlConfig::new(), crate::events::null_sender())
            .err()
            .unwrap();
        assert!(matches!(err, DriveDedupError::Busy { .. }));
    }

    #[test]
    fn invalid_threshold_is_rejected_up_front() {
        let (_dir, _drive, session) = session();
        assert!(matches!(
            session.start_visual(150, crate::events::null_sender()),
            Err(DriveDedupError::Detect(DetectError::InvalidThreshold { value: 150 }))
        ));
    }

    #[test]
    fn useless_run_with_extreme_age_still_finishes() {
        let (_dir, _drive, session) = session();
        let now = Utc::now();
        session
            .catalog()
            .unwrap()
            .insert(&MediaRecord::new("A", MediaKind::Document, "a.pdf", 10, "/drive/root:", now, now))
            .unwrap();
        let (sender, receiver) = EventChannel::new();

        let options = UselessOptions {
            size_threshold: 1000,
            age_years: u32::MAX,
        };
        let findings = session
            .start_useless(UselessMode::All, options, sender)
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(findings, 1);
        let finished = receiver
            .iter()
            .filter(|e| matches!(e, Event::Detect(DetectEvent::Finished { findings: 1, .. })))
            .count();
        assert_eq!(finished, 1);
    }

    #[test]
    fn delete_removes_catalog_row() {
        let (_dir, drive, session) = session();
        drive.add_child(
            FolderRef::Root,
            InMemoryDrive::file("A", "a.jpg", "/drive/root:", "image/jpeg", 1, None),
        );
        let now = Utc::now();
        session
            .catalog()
            .unwrap()
            .insert(&MediaRecord::new("A", MediaKind::Image, "a.jpg", 1, "/drive/root:", now, now))
            .unwrap();

        assert_eq!(session.delete_item("A").unwrap(), DeleteOutcome::Deleted);
        assert!(session.catalog().unwrap().all_media_records().unwrap().is_empty());
        assert_eq!(session.delete_item("A").unwrap(), DeleteOutcome::AlreadyGone);
    }

    #[test]
    fn failed_delete_keeps_row() {
        let dir = TempDir::new().unwrap();
        let drive = Arc::new(InMemoryDrive::new().with_tokens(Box::new(crate::core::remote::NoToken)));
        let session = Session::new(dir.path().join("catalog.db"), drive);
        let now = Utc::now();
        session
            .catalog()
            .unwrap()
            .insert(&MediaRecord::new("A", MediaKind::Image, "a.jpg", 1, "/drive/root:", now, now))
            .unwrap();

        assert!(session.delete_item("A").is_err());
        assert_eq!(session.catalog().unwrap().all_media_records().unwrap().len(), 1);
    }
}
