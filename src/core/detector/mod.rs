//! # Detector Module
//!
//! Finds duplicate and low-value files in the catalog.
//!
//! ## Detectors
//! - [`ExactMatchDetector`] - equal name and size, equal size, equal content digest
//! - [`VisualDetector`] - perceptual hashes within a Hamming distance threshold
//! - [`UselessDetector`] - extension blacklist, size floor, age ceiling
//!
//! Every detector returns [`Findings`]: either the findings in report
//! order, or a single "nothing found" message.

mod exact;
mod useless;
mod visual;

pub use exact::{ExactMatchDetector, NO_EXACT_DUPLICATES};
pub use useless::{
    UselessDetector, UselessMode, UselessOptions, DEFAULT_AGE_YEARS, DEFAULT_SIZE_THRESHOLD,
    NO_USELESS_FILES, USELESS_EXTENSIONS,
};
pub use visual::{similarity_score, VisualDetector, NO_VISUAL_DUPLICATES};

use crate::core::catalog::MediaRecord;
use serde::{Deserialize, Serialize};

/// Result of one detector run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Findings<T> {
    /// At least one finding, in report order
    Found(Vec<T>),
    /// Nothing matched; `message` is the line to show instead
    Nothing { message: String },
}

impl<T> Findings<T> {
    pub(crate) fn from_vec(items: Vec<T>, empty_message: &str) -> Self {
        if items.is_empty() {
            Findings::Nothing {
                message: empty_message.to_string(),
            }
        } else {
            Findings::Found(items)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Findings::Found(items) => items.len(),
            Findings::Nothing { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The findings, empty when nothing was found
    pub fn items(&self) -> &[T] {
        match self {
            Findings::Found(items) => items,
            Findings::Nothing { .. } => &[],
        }
    }
}

/// Why two records were paired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Criterion {
    NameAndSize,
    Size,
    Hash,
    Visual,
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Criterion::NameAndSize => write!(f, "name and size"),
            Criterion::Size => write!(f, "size"),
            Criterion::Hash => write!(f, "content hash"),
            Criterion::Visual => write!(f, "visual similarity"),
        }
    }
}

/// Order-independent identity of a pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(String, String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            PairKey(a.to_string(), b.to_string())
        } else {
            PairKey(b.to_string(), a.to_string())
        }
    }
}

/// Two records believed to be duplicates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicatePair {
    pub item_a: MediaRecord,
    pub item_b: MediaRecord,
    pub criterion: Criterion,
    /// Hamming distance, visual pairs only
    pub distance: Option<u32>,
    /// Similarity percentage, visual pairs only
    pub score: Option<f64>,
}

impl DuplicatePair {
    pub fn exact(item_a: MediaRecord, item_b: MediaRecord, criterion: Criterion) -> Self {
        Self {
            item_a,
            item_b,
            criterion,
            distance: None,
            score: None,
        }
    }

    pub fn visual(item_a: MediaRecord, item_b: MediaRecord, distance: u32, score: f64) -> Self {
        Self {
            item_a,
            item_b,
            criterion: Criterion::Visual,
            distance: Some(distance),
            score: Some(score),
        }
    }

    pub fn key(&self) -> PairKey {
        PairKey::new(&self.item_a.id, &self.item_b.id)
    }

    pub fn ids(&self) -> Vec<String> {
        vec![self.item_a.id.clone(), self.item_b.id.clone()]
    }
}

/// Rule that flagged a useless file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UselessReason {
    Extension,
    SmallSize,
    OldAge,
}

impl std::fmt::Display for UselessReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UselessReason::Extension => write!(f, "useless extension"),
            UselessReason::SmallSize => write!(f, "small size"),
            UselessReason::OldAge => write!(f, "old age"),
        }
    }
}

/// A record flagged by one useless-file rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UselessCandidate {
    pub item: MediaRecord,
    pub reason: UselessReason,
}
