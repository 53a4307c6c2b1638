//! Core data models for paper records, searches and downloads.

mod download;
mod error;
mod paper;
mod search;

pub use download::{DocumentId, DownloadOutcome, DownloadRequest};
pub use error::ErrorKind;
pub use paper::{
    opaque_id, Identifier, PaperBuilder, PaperRecord, RecordKind, SourceType, UNKNOWN_AUTHORS,
    UNKNOWN_TITLE, UNKNOWN_YEAR,
};
pub use search::{SearchQuery, SearchResponse, SearchResult, DEFAULT_MAX_RESULTS};
