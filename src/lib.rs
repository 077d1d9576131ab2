//! # wordfeed
//!
//! Paginated word streaming over a line-framed TCP protocol.
//!
//! A server tokenizes one document into an ordered [`WordStore`] and serves
//! it page by page. Clients pull pages by offset, count word frequencies,
//! and write one artifact file each.
//!
//! ## Wire format
//!
//! - Request: `<offset>\n`
//! - Batch: `w1,w2,...,wp,\n`, the last batch of the final page carries
//!   `EOF` before the newline
//! - Offset past the end: `$$\n`
//! - Malformed request: `ERR <message>\n`
//!
//! ## Example
//!
//! ```ignore
//! use wordfeed::{ConnectionManager, LoadHarness, PageSettings, WordStore};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> wordfeed::error::Result<()> {
//!     let store = WordStore::open("words.txt")?;
//!     let bind_addr: std::net::SocketAddr = ([127, 0, 0, 1], 0).into();
//!     let manager = ConnectionManager::bind(bind_addr, store, PageSettings::new(10, 3)?).await?;
//!     let addr = manager.local_addr()?;
//!     tokio::spawn(manager.run(CancellationToken::new()));
//!
//!     let report = LoadHarness::new(addr, 10, 4, "out")?.run().await?;
//!     println!("{} words received", report.total_words());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod frequency;
pub mod harness;
pub mod protocol;
pub mod server;
pub mod stats;
pub mod store;
pub mod writer;

mod client;

pub use client::{SessionDriver, SessionOutcome, SessionReport};
pub use config::{Config, PageSettings};
pub use engine::{EngineState, ProtocolEngine, SessionSummary};
pub use error::WordfeedError;
pub use frequency::FrequencyTable;
pub use harness::{HarnessReport, LoadHarness};
pub use server::{ConnectionManager, ServeStats};
pub use stats::CompletionStats;
pub use store::WordStore;
