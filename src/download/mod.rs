//! Document retrieval.
//!
//! [`MirrorResolver`] turns identifiers into ordered candidate URLs and
//! [`DownloadEngine`] walks them until one yields a plausible PDF.

mod engine;
mod error;
pub mod filename;
mod mirrors;
mod progress;
pub mod unwrap;

pub use engine::{DownloadEngine, DownloadSettings};
pub use error::DownloadError;
pub use mirrors::MirrorResolver;
pub use progress::{percent, NoProgress, ProgressSink};
