//! Exact-key duplicate detection.

use super::{Criterion, DuplicatePair, Findings, PairKey};
use crate::core::catalog::{CatalogStore, DuplicateKey};
use crate::error::DetectError;
use std::collections::HashSet;
use tracing::{debug, info};

/// Sentinel line when no exact duplicate exists
pub const NO_EXACT_DUPLICATES: &str = "No duplicates found";

/// Query order; a pair found by an earlier key is not repeated by a later one
const PASSES: [(DuplicateKey, Criterion); 3] = [
    (DuplicateKey::NameAndSize, Criterion::NameAndSize),
    (DuplicateKey::Size, Criterion::Size),
    (DuplicateKey::ContentHash, Criterion::Hash),
];

/// Pairs records sharing name and size, size, or content digest
pub struct ExactMatchDetector {
    store: CatalogStore,
}

impl ExactMatchDetector {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    pub fn find_exact_duplicates(&self) -> Result<Findings<DuplicatePair>, DetectError> {
        let mut seen: HashSet<PairKey> = HashSet::new();
        let mut pairs = Vec::new();

        for (key, criterion) in PASSES {
            let rows = self.store.find_duplicates_by_key(key)?;

            debug_assert!(rows.len() % 2 == 0, "duplicate groups hold exactly two rows");
            for chunk in rows.chunks_exact(2) {
                let (a, b) = (&chunk[0], &chunk[1]);
                if seen.insert(PairKey::new(&a.id, &b.id)) {
                    pairs.push(DuplicatePair::exact(a.clone(), b.clone(), criterion));
                } else {
                    debug!(a = %a.id, b = %b.id, ?criterion, "Pair already reported");
                }
            }
        }

        info!(pairs = pairs.len(), "Exact-match detection finished");
        Ok(Findings::from_vec(pairs, NO_EXACT_DUPLICATES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::{MediaKind, MediaRecord};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, CatalogStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = CatalogStore::open(&temp_dir.path().join("catalog.db")).unwrap();
        (temp_dir, store)
    }

    fn media(id: &str, name: &str, size: u64, hash: Option<&str>) -> MediaRecord {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        MediaRecord::new(id, MediaKind::Image, name, size, "/drive/root:", at, at)
            .with_content_hash(hash.map(str::to_string))
    }

    fn detect(records: &[MediaRecord]) -> (TempDir, Findings<DuplicatePair>) {
        let (dir, store) = open_temp();
        for record in records {
            store.insert(record).unwrap();
        }
        let findings = ExactMatchDetector::new(store).find_exact_duplicates().unwrap();
        (dir, findings)
    }

    #[test]
    fn same_name_and_size_is_reported_once() {
        let (_dir, findings) = detect(&[
            media("A", "IMG_01.jpg", 2048, None),
            media("B", "IMG_01.jpg", 2048, None),
        ]);

        let pairs = findings.items();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].criterion, Criterion::NameAndSize);
        assert_eq!(pairs[0].key(), PairKey::new("A", "B"));
    }

    #[test]
    fn earlier_criterion_wins() {
        let (_dir, findings) = detect(&[
            media("A", "x.jpg", 100, Some("H")),
            media("B", "x.jpg", 100, Some("H")),
        ]);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings.items()[0].criterion, Criterion::NameAndSize);
    }

    #[test]
    fn each_criterion_contributes_in_order() {
        let (_dir, findings) = detect(&[
            media("A", "a.jpg", 10, None),
            media("B", "a.jpg", 10, None),
            media("C", "c.jpg", 20, None),
            media("D", "d.jpg", 20, None),
            media("E", "e.jpg", 30, Some("H")),
            media("F", "f.jpg", 31, Some("H")),
        ]);

        let criteria: Vec<Criterion> = findings.items().iter().map(|p| p.criterion).collect();
        assert_eq!(criteria, vec![Criterion::NameAndSize, Criterion::Size, Criterion::Hash]);
    }

    #[test]
    fn no_unordered_pair_appears_twice() {
        let (_dir, findings) = detect(&[
            media("A", "a.jpg", 10, Some("H1")),
            media("B", "a.jpg", 10, Some("H1")),
            media("C", "c.jpg", 20, Some("H2")),
            media("D", "d.jpg", 20, Some("H2")),
        ]);

        let keys: HashSet<PairKey> = findings.items().iter().map(|p| p.key()).collect();
        assert_eq!(keys.len(), findings.len());
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn groups_of_three_are_not_reported() {
        let (_dir, findings) = detect(&[
            media("A", "a.jpg", 10, None),
            media("B", "a.jpg", 10, None),
            media("C", "a.jpg", 10, None),
        ]);

        assert!(findings.is_empty());
    }

    #[test]
    fn empty_catalog_yields_sentinel() {
        let (_dir, findings) = detect(&[]);
        assert_eq!(
            findings,
            Findings::Nothing {
                message: NO_EXACT_DUPLICATES.to_string()
            }
        );
    }
}
