//! Durable per-user state.
//!
//! Both stores keep an authoritative in-memory copy behind a lock and
//! flush the whole record with an atomic replace on every mutation.

mod clock;
mod history;
mod quota;
mod record;

use std::path::PathBuf;

use thiserror::Error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use history::HistoryStore;
pub use quota::{QuotaStore, UserQuota};
pub use record::JsonRecord;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read record {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Record {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write record {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
