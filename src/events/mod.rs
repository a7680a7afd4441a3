//! # Events Module
//!
//! Ordered message stream from background workers to the controller.
//!
//! ## Design
//! The crawler and the detectors run on their own threads and report
//! everything (progress text, preview bytes, findings, completion) through
//! a channel. The controller never blocks a worker; a worker never blocks
//! on the controller except through the crawl pause gate.
//!
//! ## Example
//! ```rust,ignore
//! let (sender, receiver) = EventChannel::new();
//!
//! std::thread::spawn(move || {
//!     for event in receiver.iter() {
//!         match event {
//!             Event::Crawl(CrawlEvent::Progress { text }) => println!("{text}"),
//!             Event::Crawl(CrawlEvent::Finished { report }) => println!("{} rows", report.media_rows),
//!             _ => {}
//!         }
//!     }
//! });
//!
//! crawler.run(&sender);
//! ```

mod channel;
mod types;

pub use channel::{null_sender, EventChannel, EventReceiver, EventSender};
pub use types::*;
