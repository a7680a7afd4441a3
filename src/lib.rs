//! # Drive Dedup
//!
//! Catalogs a remote cloud drive and explains which files are duplicates
//! or clutter.
//!
//! ## Core Philosophy
//! - **Never auto-delete** - every deletion is an explicit operator action
//! - **Show WHY** - each finding carries the criterion that produced it
//! - **Survive the network** - a failing folder never aborts a crawl
//!
//! ## Architecture
//! The library is split into a core engine (UI-agnostic) and presentation layers:
//! - `core` - Remote client, catalog, crawler and detectors
//! - `events` - Ordered message stream toward the controller
//! - `error` - Error taxonomy
//! - `cli` - Command-line controller (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{DriveDedupError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point (CLI or GUI).
/// `default_level` is used when `RUST_LOG` is not set.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default tracing subscriber");
}
