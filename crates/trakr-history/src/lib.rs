//! Trakr-History: build timeline persistence for trakr
//!
//! This crate owns the on-disk representation of each tracked project's
//! build history: an ordered list of build records, most recent first.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: ordering, deduplication and never losing or rewriting data the
//! store cannot read.
//!
//! ## Key Components
//!
//! - `BuildRecord`: one build's test counts (or unknown, for a failed fetch)
//! - `History`: ordered records with the head-dedup merge rule
//! - `HistoryStore`: persistence trait, with `FsHistoryStore` and the
//!   in-memory `fakes::MemoryHistoryStore`

mod error;
pub mod fakes;
mod history;
mod record;
pub mod store;

pub use error::HistoryError;
pub use history::History;
pub use record::{BuildRecord, ProjectCode, TestCounts, UNKNOWN_COUNT};
pub use store::{FsHistoryStore, HistoryStore};

/// Result type for trakr-history operations
pub type Result<T> = std::result::Result<T, HistoryError>;
