//! # CLI Module
//!
//! Command-line controller for the drive catalog.
//!
//! ## Usage
//! ```bash
//! # Catalog the whole drive, hashing image thumbnails
//! drive-dedup crawl --preview
//!
//! # Run a detector over the last crawl
//! drive-dedup exact
//! drive-dedup visual --threshold 5
//! drive-dedup useless --mode size-and-extension --max-size 2000
//!
//! # JSON output
//! drive-dedup stats --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use drive_dedup::core::crawler::{CrawlConfig, TrackedKind, DEFAULT_EMPTY_PROBE_MAX_CHILDREN};
use drive_dedup::core::detector::{UselessMode, UselessOptions, DEFAULT_AGE_YEARS, DEFAULT_SIZE_THRESHOLD};
use drive_dedup::core::remote::{DeleteOutcome, GraphClient, NoToken, StaticToken, TokenProvider};
use drive_dedup::core::session::{DetectorHandle, Session};
use drive_dedup::error::{DriveDedupError, Result};
use drive_dedup::events::{CrawlEvent, CrawlOutcome, CrawlReport, DetectEvent, Event, EventChannel, EventReceiver};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Drive Dedup - catalog a cloud drive and find what to clean up
#[derive(Parser, Debug)]
#[command(name = "drive-dedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Catalog database path
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Access token for the drive API
    #[arg(long, global = true, env = "DRIVE_DEDUP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// Verbose output (debug logs, every progress line)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Walk the drive and rebuild the catalog
    Crawl {
        /// Item kinds to record (defaults to all)
        #[arg(short, long, value_delimiter = ',')]
        kinds: Vec<KindArg>,

        /// Fetch thumbnails and hash images for visual detection
        #[arg(short, long)]
        preview: bool,

        /// Only probe folders with fewer direct children than this for emptiness
        #[arg(long, default_value_t = DEFAULT_EMPTY_PROBE_MAX_CHILDREN)]
        probe_max_children: u64,
    },

    /// Pair files by name and size, size, or content hash
    Exact,

    /// Pair images whose perceptual hashes are close
    Visual {
        /// Maximum Hamming distance (0-100, lower = stricter)
        #[arg(short, long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(0..=100))]
        threshold: u32,
    },

    /// Flag temporary, tiny or old files
    Useless {
        /// Rules to apply
        #[arg(short, long, default_value = "all")]
        mode: ModeArg,

        /// Size floor in bytes
        #[arg(long, default_value_t = DEFAULT_SIZE_THRESHOLD)]
        max_size: u64,

        /// Age ceiling in years (0-200)
        #[arg(long, default_value_t = DEFAULT_AGE_YEARS, value_parser = clap::value_parser!(u32).range(0..=200))]
        years: u32,
    },

    /// List folders that hold no files at any depth
    EmptyFolders,

    /// Show catalog totals
    Stats,

    /// Delete one item on the drive and drop it from the catalog
    Delete {
        /// Remote item id
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Images,
    Videos,
    Documents,
    EmptyFolders,
}

impl From<KindArg> for TrackedKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Images => TrackedKind::Image,
            KindArg::Videos => TrackedKind::Video,
            KindArg::Documents => TrackedKind::Document,
            KindArg::EmptyFolders => TrackedKind::EmptyFolder,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Temporary and system file extensions
    Extension,
    /// Files under the size floor
    Size,
    /// Files older than the age ceiling
    Age,
    /// Extension and size rules
    SizeAndExtension,
    /// Every rule
    All,
}

impl From<ModeArg> for UselessMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Extension => UselessMode::Extension,
            ModeArg::Size => UselessMode::SmallSize,
            ModeArg::Age => UselessMode::OldAge,
            ModeArg::SizeAndExtension => UselessMode::SizeAndExtension,
            ModeArg::All => UselessMode::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// One detector line in JSON output
#[derive(Debug, Serialize)]
struct LineOutput {
    text: String,
    item_ids: Vec<String>,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    drive_dedup::init_tracing(if cli.verbose { "debug" } else { "warn" });

    let catalog = cli.catalog.clone().unwrap_or_else(default_catalog_path);
    let tokens: Box<dyn TokenProvider> = match cli.token.clone() {
        Some(token) => Box::new(StaticToken::new(token)),
        None => Box::new(NoToken),
    };
    let drive = GraphClient::builder(tokens).build()?;
    let session = Session::new(catalog, Arc::new(drive));
    let term = Term::stderr();

    match cli.command {
        Commands::Crawl {
            kinds,
            preview,
            probe_max_children,
        } => {
            let mut config = CrawlConfig::new()
                .preview(preview)
                .empty_probe_max_children(probe_max_children);
            if !kinds.is_empty() {
                config = config.tracked_kinds(kinds.into_iter().map(TrackedKind::from));
            }
            run_crawl(&session, config, cli.output, cli.verbose, &term)
        }
        Commands::Exact => {
            let (sender, receiver) = EventChannel::new();
            let handle = session.start_exact(sender)?;
            print_detector(handle, &receiver, cli.output, &term)
        }
        Commands::Visual { threshold } => {
            let (sender, receiver) = EventChannel::new();
            let handle = session.start_visual(threshold, sender)?;
            print_detector(handle, &receiver, cli.output, &term)
        }
        Commands::Useless {
            mode,
            max_size,
            years,
        } => {
            let options = UselessOptions {
                size_threshold: max_size,
                age_years: years,
            };
            let (sender, receiver) = EventChannel::new();
            let handle = session.start_useless(mode.into(), options, sender)?;
            print_detector(handle, &receiver, cli.output, &term)
        }
        Commands::EmptyFolders => {
            let (sender, receiver) = EventChannel::new();
            let handle = session.start_empty_folders(sender)?;
            print_detector(handle, &receiver, cli.output, &term)
        }
        Commands::Stats => run_stats(&session, cli.output, &term),
        Commands::Delete { id } => run_delete(&session, &id, cli.output, &term),
    }
}

fn default_catalog_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("drive-dedup")
        .join("catalog.db")
}

fn spinner(enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(template);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_crawl(
    session: &Session,
    config: CrawlConfig,
    output: OutputFormat,
    verbose: bool,
    term: &Term,
) -> Result<()> {
    let pretty = output == OutputFormat::Pretty;
    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("Drive Dedup").bold().cyan(),
            style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
        term.write_line(&format!("  Catalog: {}", session.catalog_path().display()))
            .ok();
        term.write_line("").ok();
    }

    // Bounded so previews cannot pile up behind a slow terminal
    let (sender, receiver) = EventChannel::bounded(256);
    let handle = session.start_crawl(config, sender)?;

    let progress = spinner(pretty);
    let progress_clone = progress.clone();
    let event_thread = thread::spawn(move || {
        let mut previews = 0usize;
        for event in receiver.iter() {
            let Some(ref pb) = progress_clone else {
                continue;
            };
            match event {
                Event::Crawl(CrawlEvent::Progress { text }) => {
                    if text.starts_with("Name:") {
                        if verbose {
                            pb.println(&text);
                        }
                        pb.set_message(text);
                    } else {
                        pb.println(text);
                    }
                }
                Event::Crawl(CrawlEvent::Preview { .. }) => previews += 1,
                Event::Crawl(CrawlEvent::FolderFailed { folder_id, message }) => {
                    pb.println(format!(
                        "{} folder {} skipped: {}",
                        style("!").yellow().bold(),
                        folder_id,
                        message
                    ));
                }
                Event::Crawl(CrawlEvent::Finished { .. }) => pb.finish_and_clear(),
                _ => {}
            }
        }
        previews
    });

    let report = handle.join()?;
    let previews = event_thread.join().unwrap_or(0);

    match output {
        OutputFormat::Pretty => print_crawl_report(term, &report, previews),
        OutputFormat::Json => print_json(&report)?,
    }

    if report.outcome == CrawlOutcome::Failed {
        return Err(DriveDedupError::Config(
            "crawl aborted, see the messages above".to_string(),
        ));
    }
    Ok(())
}

fn print_crawl_report(term: &Term, report: &CrawlReport, previews: usize) {
    let (mark, title) = match report.outcome {
        CrawlOutcome::Completed => (style("✓").green().bold(), "Crawl Complete"),
        CrawlOutcome::Stopped => (style("■").yellow().bold(), "Crawl Stopped"),
        CrawlOutcome::Failed => (style("✗").red().bold(), "Crawl Failed"),
    };

    term.write_line(&format!("{mark} {title}")).ok();
    term.write_line("").ok();
    for line in report.to_text().lines() {
        term.write_line(&format!("  {line}")).ok();
    }
    if previews > 0 {
        term.write_line(&format!("  {} thumbnails fetched", style(previews).cyan()))
            .ok();
    }
    if report.folder_failures > 0 {
        term.write_line(&format!(
            "  {} folders could not be listed",
            style(report.folder_failures).yellow()
        ))
        .ok();
    }
}

fn print_detector(
    handle: DetectorHandle,
    receiver: &EventReceiver,
    output: OutputFormat,
    term: &Term,
) -> Result<()> {
    let kind = handle.kind();
    let progress = spinner(output == OutputFormat::Pretty);
    if let Some(ref pb) = progress {
        pb.set_message(format!("Running {kind} detection..."));
    }

    // The worker owns the sender; the stream ends when it returns
    let lines: Vec<LineOutput> = receiver
        .iter()
        .filter_map(|event| match event {
            Event::Detect(DetectEvent::Line { text, item_ids, .. }) => Some(LineOutput { text, item_ids }),
            _ => None,
        })
        .collect();

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    let findings = handle.join()?;

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "detector": kind.to_string(),
            "findings": findings,
            "lines": lines,
        }))?,
        OutputFormat::Pretty => {
            term.write_line(&format!(
                "{} {} detection: {} findings",
                style("✓").green().bold(),
                kind,
                style(findings).cyan()
            ))
            .ok();
            term.write_line("").ok();

            for line in &lines {
                println!("{}", line.text.trim_end());
                println!();
            }

            if findings > 0 {
                term.write_line(&format!(
                    "{}",
                    style("Nothing was deleted. Review carefully, then use `drive-dedup delete <id>`.").dim()
                ))
                .ok();
            }
        }
    }

    Ok(())
}

fn run_stats(session: &Session, output: OutputFormat, term: &Term) -> Result<()> {
    let stats = session.catalog()?.stats()?;

    match output {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Pretty => {
            term.write_line(&format!("{}", style("Catalog").bold().underlined()))
                .ok();
            term.write_line(&format!("  {} images ({} hashed)", style(stats.images).cyan(), stats.hashed_images))
                .ok();
            term.write_line(&format!("  {} videos", style(stats.videos).cyan()))
                .ok();
            term.write_line(&format!("  {} documents", style(stats.documents).cyan()))
                .ok();
            term.write_line(&format!("  {} empty folders", style(stats.empty_folders).cyan()))
                .ok();
            term.write_line(&format!(
                "  {} across {} files",
                style(format_bytes(stats.total_size_bytes)).yellow(),
                stats.total_files()
            ))
            .ok();
        }
    }

    Ok(())
}

fn run_delete(session: &Session, id: &str, output: OutputFormat, term: &Term) -> Result<()> {
    let outcome = session.delete_item(id)?;

    match output {
        OutputFormat::Json => print_json(&serde_json::json!({ "id": id, "outcome": outcome }))?,
        OutputFormat::Pretty => {
            let text = match outcome {
                DeleteOutcome::Deleted => format!("{} Deleted {}", style("✓").green().bold(), id),
                DeleteOutcome::AlreadyGone => format!(
                    "{} {} was already gone; removed from the catalog",
                    style("✓").yellow().bold(),
                    id
                ),
            };
            term.write_line(&text).ok();
        }
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn years_is_bounded() {
        let ok = Cli::try_parse_from(["drive-dedup", "useless", "--years", "200"]).unwrap();
        assert!(matches!(ok.command, Commands::Useless { years: 200, .. }));

        assert!(Cli::try_parse_from(["drive-dedup", "useless", "--years", "201"]).is_err());
        assert!(Cli::try_parse_from(["drive-dedup", "useless", "--years", "4294967295"]).is_err());
    }

    #[test]
    fn threshold_is_bounded() {
        assert!(Cli::try_parse_from(["drive-dedup", "visual", "--threshold", "100"]).is_ok());
        assert!(Cli::try_parse_from(["drive-dedup", "visual", "--threshold", "101"]).is_err());
    }

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
