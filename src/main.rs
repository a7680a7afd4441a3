//! # drive-dedup CLI
//!
//! Command-line controller for the drive catalog and duplicate detectors.
//!
//! ## Usage
//! ```bash
//! drive-dedup crawl --kinds images,videos --preview
//! drive-dedup visual --threshold 10
//! drive-dedup useless --mode all --output json
//! ```

mod cli;

use drive_dedup::Result;

fn main() -> Result<()> {
    cli::run()
}
