//! Perceptual-similarity duplicate detection.
//!
//! Every unordered pair of hashed images is compared once, so the cost
//! grows with the square of the hashed-image count. The outer loop runs
//! on the rayon pool; results keep the sequential pair order.

use super::{DuplicatePair, Findings};
use crate::core::catalog::{CatalogStore, MediaRecord};
use crate::core::hasher::{ImageHashValue, PerceptualHash};
use crate::error::DetectError;
use rayon::prelude::*;
use tracing::{info, warn};

/// Sentinel text when no visual duplicate exists
pub const NO_VISUAL_DUPLICATES: &str =
    "No duplicates found!\nCheck that image preview (perceptual hashing) was enabled during the crawl.";

/// Largest accepted Hamming distance threshold
const MAX_THRESHOLD: u32 = 100;

const CLUSTER_BITS: u32 = 4;
/// Matching bits for a cluster to count as similar (75%)
const CLUSTER_MATCH: u32 = 3;

/// Pairs images whose perceptual hashes are close
pub struct VisualDetector {
    store: CatalogStore,
}

impl VisualDetector {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    /// Report every pair with Hamming distance `<= threshold`
    pub fn find_visual_duplicates(&self, threshold: u32) -> Result<Findings<DuplicatePair>, DetectError> {
        if threshold > MAX_THRESHOLD {
            return Err(DetectError::InvalidThreshold { value: threshold });
        }

        let entries = parse_hashes(self.store.all_with_perceptual_hash()?);
        let n = entries.len();
        info!(images = n, threshold, "Comparing perceptual hashes");

        let pairs: Vec<DuplicatePair> = (0..n)
            .into_par_iter()
            .flat_map_iter(|i| {
                let entries = &entries;
                ((i + 1)..n).filter_map(move |j| {
                    let (a, hash_a) = &entries[i];
                    let (b, hash_b) = &entries[j];
                    let distance = hash_a.distance(hash_b);
                    (distance <= threshold).then(|| {
                        let score = similarity_score(hash_a, hash_b, distance);
                        DuplicatePair::visual(a.clone(), b.clone(), distance, score)
                    })
                })
            })
            .collect();

        info!(pairs = pairs.len(), "Visual detection finished");
        Ok(Findings::from_vec(pairs, NO_VISUAL_DUPLICATES))
    }
}

/// Decode stored hashes, dropping invalid hex and mismatched widths
///
/// The first valid hash fixes the width.
fn parse_hashes(records: Vec<MediaRecord>) -> Vec<(MediaRecord, ImageHashValue)> {
    let mut width: Option<u32> = None;
    let mut entries = Vec::with_capacity(records.len());

    for record in records {
        let Some(hex) = record.perceptual_hash() else {
            continue;
        };
        let hash = match ImageHashValue::from_hex(hex) {
            Ok(hash) => hash,
            Err(e) => {
                warn!(id = %record.id, error = %e, "Skipping record with unreadable hash");
                continue;
            }
        };

        let bits = hash.bit_count();
        match width {
            None => width = Some(bits),
            Some(expected) if expected != bits => {
                warn!(id = %record.id, bits, expected, "Skipping record with mismatched hash width");
                continue;
            }
            Some(_) => {}
        }

        entries.push((record, hash));
    }

    entries
}

/// Similarity percentage for two hashes at the given Hamming distance
///
/// Blends three measures: distance over width (50%), matching bit
/// positions (30%) and 4-bit clusters with at least 3 matching bits
/// (20%). When any measure is zero the distance measure alone is used.
pub fn similarity_score(a: &ImageHashValue, b: &ImageHashValue, distance: u32) -> f64 {
    let bits = a.bit_count().min(b.bit_count());
    if bits == 0 {
        return 0.0;
    }
    let width = f64::from(bits);

    let base = ((width - f64::from(distance)) / width * 100.0).max(0.0);

    let matching = (0..bits).filter(|&i| a.bit(i) == b.bit(i)).count();
    let fine = matching as f64 / width * 100.0;

    let total_clusters = bits / CLUSTER_BITS;
    let clusters = if total_clusters == 0 {
        0.0
    } else {
        let similar = (0..bits)
            .step_by(CLUSTER_BITS as usize)
            .filter(|&start| {
                let end = (start + CLUSTER_BITS).min(bits);
                (start..end).filter(|&i| a.bit(i) == b.bit(i)).count() as u32 >= CLUSTER_MATCH
            })
            .count();
        similar as f64 / f64::from(total_clusters) * 100.0
    };

    if base > 0.0 && fine > 0.0 && clusters > 0.0 {
        base * 0.5 + fine * 0.3 + clusters * 0.2
    } else {
        base
    }
}
