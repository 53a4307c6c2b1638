//! # Scholar Fetch
//!
//! Search academic sources and download papers, getting past the mirrors,
//! redirect pages and embedded viewers that usually stand between a DOI and
//! its PDF.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (PaperRecord, SearchResult, DownloadOutcome, etc.)
//! - [`sources`]: Source adapters with a trait-based architecture
//! - [`dispatch`]: Routes a query to a source and normalizes every outcome
//! - [`download`]: Mirror resolution and the download engine
//! - [`utils`]: HTTP client, retry, cancellation and identifier helpers
//! - [`config`]: Configuration management
//! - [`ui`]: Terminal output for the command-line front end

pub mod config;
pub mod dispatch;
pub mod download;
pub mod models;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use dispatch::{DispatchResponse, DispatchStatus, SearchDispatcher};
pub use download::{DownloadEngine, MirrorResolver, ProgressSink};
pub use models::{DownloadOutcome, DownloadRequest, PaperRecord, SearchResult};
pub use sources::{Source, SourceRegistry};
pub use utils::CancelFlag;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
