//! Heuristic detection of low-value files.

use super::{Findings, UselessCandidate, UselessReason};
use crate::core::catalog::{CatalogStore, MediaRecord};
use crate::error::DetectError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Sentinel line when no rule matched
pub const NO_USELESS_FILES: &str = "No useless file found!";

/// Default size floor in bytes
pub const DEFAULT_SIZE_THRESHOLD: u64 = 1000;

/// Default age ceiling in 365-day years
pub const DEFAULT_AGE_YEARS: u32 = 4;

/// Name suffixes of temporary, cache and system files (case-sensitive)
pub const USELESS_EXTENSIONS: [&str; 16] = [
    ".gifs",
    ".tmp",
    ".temp",
    ".cache",
    ".bak",
    ".old",
    ".log",
    ".dmp",
    ".crash",
    ".crdownload",
    ".partial",
    "._",
    ".thumb",
    ".DS_store",
    ".localized",
    ".ini",
];

/// Which rules a run applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UselessMode {
    Extension,
    SmallSize,
    OldAge,
    SizeAndExtension,
    All,
}

impl UselessMode {
    /// Rules in the order they run
    pub fn passes(&self) -> &'static [UselessReason] {
        match self {
            UselessMode::Extension => &[UselessReason::Extension],
            UselessMode::SmallSize => &[UselessReason::SmallSize],
            UselessMode::OldAge => &[UselessReason::OldAge],
            UselessMode::SizeAndExtension => &[UselessReason::Extension, UselessReason::SmallSize],
            UselessMode::All => &[
                UselessReason::Extension,
                UselessReason::SmallSize,
                UselessReason::OldAge,
            ],
        }
    }
}

/// Rule parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UselessOptions {
    /// Files strictly smaller than this many bytes are flagged
    pub size_threshold: u64,
    /// Files last modified more than this many years ago are flagged
    pub age_years: u32,
}

impl Default for UselessOptions {
    fn default() -> Self {
        Self {
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            age_years: DEFAULT_AGE_YEARS,
        }
    }
}

/// Applies the useless-file rules to a catalog snapshot
pub struct UselessDetector {
    records: Vec<MediaRecord>,
}

impl UselessDetector {
    /// Load every media record once
    pub fn load(store: &CatalogStore) -> Result<Self, DetectError> {
        let records = store.all_media_records()?;
        debug!(records = records.len(), "Loaded catalog for useless-file rules");
        Ok(Self { records })
    }

    pub fn from_records(records: Vec<MediaRecord>) -> Self {
        Self { records }
    }

    pub fn find_useless(&self, mode: UselessMode, options: UselessOptions) -> Findings<UselessCandidate> {
        self.find_useless_at(Utc::now(), mode, options)
    }

    /// Same as [`find_useless`](Self::find_useless) with a fixed clock
    pub fn find_useless_at(
        &self,
        now: DateTime<Utc>,
        mode: UselessMode,
        options: UselessOptions,
    ) -> Findings<UselessCandidate> {
        let cutoff = if mode.passes().contains(&UselessReason::OldAge) {
            age_cutoff(now, options.age_years)
        } else {
            None
        };
        let mut seen: HashSet<(String, UselessReason)> = HashSet::new();
        let mut candidates = Vec::new();

        for &reason in mode.passes() {
            for record in &self.records {
                let flagged = match reason {
                    UselessReason::Extension => has_useless_extension(&record.name),
                    UselessReason::SmallSize => record.size < options.size_threshold,
                    UselessReason::OldAge => cutoff.is_some_and(|cutoff| record.modified_at < cutoff),
                };

                if flagged && seen.insert((record.id.clone(), reason)) {
                    candidates.push(UselessCandidate {
                        item: record.clone(),
                        reason,
                    });
                }
            }
        }

        info!(?mode, candidates = candidates.len(), "Useless-file detection finished");
        Findings::from_vec(candidates, NO_USELESS_FILES)
    }
}

/// `now` minus `years` 365-day years, or `None` when that predates every
/// representable timestamp (nothing can be older)
fn age_cutoff(now: DateTime<Utc>, years: u32) -> Option<DateTime<Utc>> {
    let age = Duration::try_days(365 * i64::from(years))?;
    now.checked_sub_signed(age)
}

pub fn has_useless_extension(name: &str) -> bool {
    USELESS_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}
