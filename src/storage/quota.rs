//! Per-user daily draw quota.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{Clock, JsonRecord, StorageError};

/// One user's quota for a single UTC day, as persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserQuota {
    /// UTC day this quota belongs to (`YYYY-MM-DD` on disk).
    pub date: NaiveDate,

    /// Draws left for that day.
    pub left: u32,
}

type QuotaMap = BTreeMap<String, UserQuota>;

/// Durable user → remaining-draws store with lazy daily rollover.
///
/// Every access first checks the stored date against the clock and resets
/// the record to the daily limit when the UTC day has changed. All
/// read-modify-write sequences run under one lock and end with an atomic
/// flush of the whole record.
pub struct QuotaStore {
    record: JsonRecord,
    daily_limit: u32,
    clock: Arc<dyn Clock>,
    quotas: Mutex<QuotaMap>,
}

impl QuotaStore {
    /// Opens the store, loading existing quotas from `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing record cannot be read or parsed.
    pub fn open(
        path: impl Into<PathBuf>,
        daily_limit: u32,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let record = JsonRecord::new(path);
        let quotas: QuotaMap = record.load()?;

        info!(
            "Loaded quotas for {} users from {}",
            quotas.len(),
            record.path().display()
        );

        Ok(Self {
            record,
            daily_limit,
            clock,
            quotas: Mutex::new(quotas),
        })
    }

    /// Returns the configured daily limit.
    #[must_use]
    pub const fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    /// Returns the user's remaining draws for today, creating or rolling
    /// over the record as needed.
    pub async fn get(&self, user: &str) -> Result<u32, StorageError> {
        self.update(user, |_| false).await
    }

    /// Consumes one draw if any are left. At zero this is a no-op.
    ///
    /// Returns the remaining count after the operation.
    pub async fn decrement(&self, user: &str) -> Result<u32, StorageError> {
        self.update(user, |quota| {
            if quota.left > 0 {
                quota.left -= 1;
                true
            } else {
                false
            }
        })
        .await
    }

    /// Adds `count` draws on top of today's quota, uncapped.
    ///
    /// Returns the remaining count after the operation.
    pub async fn grant(&self, user: &str, count: u32) -> Result<u32, StorageError> {
        self.update(user, |quota| {
            quota.left = quota.left.saturating_add(count);
            count > 0
        })
        .await
    }

    /// Returns a copy of the stored record without applying rollover.
    pub async fn snapshot(&self, user: &str) -> Option<UserQuota> {
        self.quotas.lock().await.get(user).copied()
    }

    /// Applies rollover, then `apply`, and flushes if anything changed.
    ///
    /// `apply` returns whether it modified the quota. On a failed flush the
    /// in-memory record is restored so memory never runs ahead of disk.
    async fn update(
        &self,
        user: &str,
        apply: impl FnOnce(&mut UserQuota) -> bool,
    ) -> Result<u32, StorageError> {
        let mut quotas = self.quotas.lock().await;
        let today = self.clock.today();
        let previous = quotas.get(user).copied();

        let rolled_over = previous.is_none_or(|q| q.date != today);
        if rolled_over {
            debug!(
                "Resetting quota for {} to {} (day {})",
                user, self.daily_limit, today
            );
        }

        let mut quota = match previous {
            Some(q) if !rolled_over => q,
            _ => UserQuota {
                date: today,
                left: self.daily_limit,
            },
        };

        let modified = apply(&mut quota);
        let left = quota.left;

        if rolled_over || modified {
            quotas.insert(user.to_owned(), quota);

            if let Err(e) = self.record.save(&*quotas) {
                warn!("Failed to save quotas: {}", e);
                match previous {
                    Some(q) => quotas.insert(user.to_owned(), q),
                    None => quotas.remove(user),
                };
                return Err(e);
            }
        }

        Ok(left)
    }
}

impl std::fmt::Debug for QuotaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaStore")
            .field("path", &self.record.path())
            .field("daily_limit", &self.daily_limit)
            .finish_non_exhaustive()
    }
}
