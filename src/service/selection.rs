//! Non-repeating random selection from the content pool.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ContentPool;
use crate::storage::{HistoryStore, StorageError};

/// Draws pool items for a user without repeats inside a cycle.
///
/// A cycle ends when every index has been served; the next draw clears the
/// user's history and picks from the full pool again. That draw may repeat
/// the last item of the previous cycle.
pub struct SelectionService {
    pool: Arc<ContentPool>,
    history: Arc<HistoryStore>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl SelectionService {
    /// Creates a selection service seeded from OS entropy.
    #[must_use]
    pub fn new(pool: Arc<ContentPool>, history: Arc<HistoryStore>) -> Self {
        Self::with_rng(pool, history, StdRng::from_entropy())
    }

    /// Creates a selection service with an explicit random source.
    #[must_use]
    pub fn with_rng(
        pool: Arc<ContentPool>,
        history: Arc<HistoryStore>,
        rng: impl RngCore + Send + 'static,
    ) -> Self {
        Self {
            pool,
            history,
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// Picks the next item for `user` and records it as seen.
    ///
    /// Exhaustion reset, choice, and mark-seen happen in a single history
    /// transaction.
    pub async fn draw(&self, user: &str) -> Result<String, StorageError> {
        let (_, item) = self.pick(user).await?;
        Ok(item)
    }

    /// Like [`SelectionService::draw`], also returning the pool index served.
    pub async fn pick(&self, user: &str) -> Result<(usize, String), StorageError> {
        let mut rng = self.rng.lock().await;
        let rng = &mut *rng;
        let size = self.pool.len();

        let (index, was_reset) = self
            .history
            .transact(user, |seen| {
                // Drop indices left over from a larger pool.
                seen.retain(|&i| i < size);

                let mut available: Vec<usize> = (0..size).filter(|i| !seen.contains(i)).collect();
                let was_reset = available.is_empty();
                if was_reset {
                    seen.clear();
                    available = (0..size).collect();
                }

                let index = available[rng.gen_range(0..available.len())];
                seen.insert(index);
                (index, was_reset)
            })
            .await?;

        if was_reset {
            debug!("Pool exhausted for {}, history reset", user);
        }
        debug!("Drew item {} of {} for {}", index, size, user);

        Ok((index, self.pool.item_at(index).to_owned()))
    }

    /// Returns `index` to the user's current cycle after a draw that was
    /// never delivered.
    pub async fn forget(&self, user: &str, index: usize) -> Result<(), StorageError> {
        self.history
            .transact(user, |seen| {
                seen.remove(&index);
            })
            .await
    }

    /// Returns the history store.
    #[must_use]
    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }
}

impl std::fmt::Debug for SelectionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionService")
            .field("pool_size", &self.pool.len())
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}
