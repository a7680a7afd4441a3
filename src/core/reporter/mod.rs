//! # Reporter Module
//!
//! Turns detector findings into the text lines shown to the user.
//!
//! One finding becomes one multi-line block; a run with no finding
//! becomes the detector's sentinel message. Long names and paths are
//! wrapped with [`wrap_display`].

mod wrap;

pub use wrap::{wrap_display, DISPLAY_WIDTH};

use crate::core::catalog::EmptyFolderRecord;
use crate::core::detector::{
    Criterion, DuplicatePair, Findings, UselessCandidate, UselessOptions, UselessReason,
};

/// Sentinel line when the catalog holds no empty folder
pub const NO_EMPTY_FOLDERS: &str = "No empty folder found!";

fn wrap(text: &str) -> String {
    wrap_display(text, DISPLAY_WIDTH)
}

/// Text block for a duplicate pair
pub fn pair_text(pair: &DuplicatePair) -> String {
    let (a, b) = (&pair.item_a, &pair.item_b);

    let detail = match (pair.criterion, pair.distance, pair.score) {
        (Criterion::Visual, Some(distance), Some(score)) => {
            format!("Similarity: {score:.2}% | Distance: {distance}")
        }
        (criterion, _, _) => format!("Criterion: {criterion}"),
    };

    format!(
        "{} ↔ {}\n{detail}\nTypes: {} - {} | Sizes: {} - {}\nIDs: {} - {}\nPaths: {} - {}\n",
        wrap(&a.name),
        wrap(&b.name),
        a.kind,
        b.kind,
        a.size,
        b.size,
        a.id,
        b.id,
        wrap(&a.full_path()),
        wrap(&b.full_path()),
    )
}

/// Text block for a useless-file candidate
pub fn useless_text(candidate: &UselessCandidate, options: &UselessOptions) -> String {
    let item = &candidate.item;
    let heading = match candidate.reason {
        UselessReason::Extension => "=== File with a useless extension ===".to_string(),
        UselessReason::SmallSize => format!(
            "=== Very small file (< {} KB) ===",
            options.size_threshold as f64 / 1000.0
        ),
        UselessReason::OldAge => format!(
            "=== File last modified more than {} years ago ===",
            options.age_years
        ),
    };

    format!(
        "{heading}\n\nName: {}\nSize: {}\nID: {}\nPath:\n{}\nLast modified: {}\n",
        wrap(&item.name),
        item.size,
        item.id,
        wrap(&item.full_path()),
        item.modified_at.to_rfc3339(),
    )
}

/// Text block for an empty folder
pub fn empty_folder_text(folder: &EmptyFolderRecord) -> String {
    format!(
        "Name: {}\nID: {}\nPath:\n{}\n",
        wrap(&folder.name),
        folder.id,
        wrap(&folder.full_path()),
    )
}

/// Empty folders as findings, with the sentinel when there are none
pub fn empty_folder_findings(folders: Vec<EmptyFolderRecord>) -> Findings<EmptyFolderRecord> {
    if folders.is_empty() {
        Findings::Nothing {
            message: NO_EMPTY_FOLDERS.to_string(),
        }
    } else {
        Findings::Found(folders)
    }
}

/// Render findings as `(text, item ids)` lines
///
/// A sentinel renders as a single line with no ids.
pub fn render<T>(
    findings: &Findings<T>,
    text: impl Fn(&T) -> String,
    ids: impl Fn(&T) -> Vec<String>,
) -> Vec<(String, Vec<String>)> {
    match findings {
        Findings::Found(items) => items.iter().map(|item| (text(item), ids(item))).collect(),
        Findings::Nothing { message } => vec![(message.clone(), Vec::new())],
    }
}
