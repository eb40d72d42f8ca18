//! Per-user history of served pool indices.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{JsonRecord, StorageError};

type HistoryMap = BTreeMap<String, BTreeSet<usize>>;

/// Durable user → seen-indices store.
///
/// On disk each user maps to a sorted JSON array of indices. Duplicates in
/// a hand-edited file collapse on load.
pub struct HistoryStore {
    record: JsonRecord,
    history: Mutex<HistoryMap>,
}

impl HistoryStore {
    /// Opens the store, loading existing history from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing record cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let record = JsonRecord::new(path);
        let history: HistoryMap = record.load()?;

        info!(
            "Loaded history for {} users from {}",
            history.len(),
            record.path().display()
        );

        Ok(Self {
            record,
            history: Mutex::new(history),
        })
    }

    /// Adds `index` to the user's seen set.
    pub async fn mark_seen(&self, user: &str, index: usize) -> Result<(), StorageError> {
        self.transact(user, |seen| {
            seen.insert(index);
        })
        .await
    }

    /// Returns the user's seen set, empty if nothing was recorded.
    pub async fn seen_set(&self, user: &str) -> BTreeSet<usize> {
        self.history
            .lock()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    /// Clears the user's seen set.
    pub async fn reset(&self, user: &str) -> Result<(), StorageError> {
        self.transact(user, |seen| seen.clear()).await
    }

    /// Runs `f` on the user's seen set as one serialized read-modify-write.
    ///
    /// The record is flushed once if `f` changed the set. If the flush fails
    /// the in-memory set is restored and the error returned.
    pub async fn transact<R>(
        &self,
        user: &str,
        f: impl FnOnce(&mut BTreeSet<usize>) -> R,
    ) -> Result<R, StorageError> {
        let mut history = self.history.lock().await;
        let previous = history.get(user).cloned();

        let mut seen = previous.clone().unwrap_or_default();
        let output = f(&mut seen);

        let changed = match &previous {
            Some(p) => *p != seen,
            None => !seen.is_empty(),
        };
        if !changed {
            return Ok(output);
        }

        history.insert(user.to_owned(), seen);

        if let Err(e) = self.record.save(&*history) {
            warn!("Failed to save history: {}", e);
            match previous {
                Some(p) => history.insert(user.to_owned(), p),
                None => history.remove(user),
            };
            return Err(e);
        }

        Ok(output)
    }
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("path", &self.record.path())
            .finish_non_exhaustive()
    }
}
