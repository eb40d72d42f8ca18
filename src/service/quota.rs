//! Quota-gated drawing and credits.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::SelectionService;
use crate::storage::{QuotaStore, StorageError};

/// Errors returned by [`QuotaService`].
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Credit amount must be at least 1")]
    InvalidCredit,
}

/// A successful draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    /// The served item.
    pub item: String,

    /// Draws left after this one.
    pub remaining: u32,
}

/// Outcome of [`QuotaService::try_consume_and_draw`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOutcome {
    /// An item was served and one draw consumed.
    Drawn(Draw),

    /// No draws left today; nothing was served or consumed.
    Denied,
}

/// The call surface used by the command adapters.
///
/// Every operation on a given user runs under that user's lock, so a
/// check → draw → decrement sequence cannot interleave with another one
/// for the same user.
pub struct QuotaService {
    quota: Arc<QuotaStore>,
    selection: Arc<SelectionService>,
    credit_amount: u32,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl QuotaService {
    /// Creates a new quota service.
    #[must_use]
    pub fn new(
        quota: Arc<QuotaStore>,
        selection: Arc<SelectionService>,
        credit_amount: u32,
    ) -> Self {
        Self {
            quota,
            selection,
            credit_amount,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the user's remaining draws for today.
    pub async fn remaining(&self, user: &str) -> Result<u32, QuotaError> {
        Ok(self.quota.get(user).await?)
    }

    /// Serves one item and consumes one draw, or returns
    /// [`DrawOutcome::Denied`] when none are left.
    ///
    /// On any storage failure nothing is consumed and the item stays in the
    /// user's current cycle.
    pub async fn try_consume_and_draw(&self, user: &str) -> Result<DrawOutcome, QuotaError> {
        let lock = self.user_lock(user).await;
        let result = {
            let _guard = lock.lock().await;
            self.consume_and_draw_locked(user).await
        };
        self.release_user_lock(user, lock).await;
        result
    }

    async fn consume_and_draw_locked(&self, user: &str) -> Result<DrawOutcome, QuotaError> {
        if self.quota.get(user).await? == 0 {
            debug!("Draw denied for {}: no draws left", user);
            return Ok(DrawOutcome::Denied);
        }

        let (index, item) = self.selection.pick(user).await?;

        let remaining = match self.quota.decrement(user).await {
            Ok(remaining) => remaining,
            Err(e) => {
                if let Err(undo) = self.selection.forget(user, index).await {
                    warn!("Failed to return item {} to {}'s cycle: {}", index, user, undo);
                }
                return Err(e.into());
            }
        };

        Ok(DrawOutcome::Drawn(Draw { item, remaining }))
    }

    /// Adds `count` draws to the user's quota.
    ///
    /// Returns the remaining count after the credit.
    pub async fn credit(&self, user: &str, count: u32) -> Result<u32, QuotaError> {
        if count == 0 {
            return Err(QuotaError::InvalidCredit);
        }

        let lock = self.user_lock(user).await;
        let result = {
            let _guard = lock.lock().await;
            self.quota.grant(user, count).await
        };
        self.release_user_lock(user, lock).await;

        let remaining = result?;
        info!("Credited {} draws to {}, now {}", count, user, remaining);
        Ok(remaining)
    }

    /// Credits the configured per-purchase amount.
    pub async fn credit_purchase(&self, user: &str) -> Result<u32, QuotaError> {
        self.credit(user, self.credit_amount).await
    }

    /// Draws credited per purchase.
    #[must_use]
    pub const fn credit_amount(&self) -> u32 {
        self.credit_amount
    }

    /// Daily draw limit.
    #[must_use]
    pub fn daily_limit(&self) -> u32 {
        self.quota.daily_limit()
    }

    async fn user_lock(&self, user: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        Arc::clone(locks.entry(user.to_owned()).or_default())
    }

    /// Drops the user's lock entry once no other task holds or awaits it.
    ///
    /// Clones are only taken under the map lock, so a count of two (map +
    /// `lock`) checked under that lock means nobody else can be waiting.
    async fn release_user_lock(&self, user: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.user_locks.lock().await;
        let unshared = locks
            .get(user)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
        if unshared {
            locks.remove(user);
        }
    }
}

impl std::fmt::Debug for QuotaService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaService")
            .field("quota", &self.quota)
            .field("selection", &self.selection)
            .field("credit_amount", &self.credit_amount)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::rngs::mock::StepRng;

    use super::*;
    use crate::config::ContentPool;
    use crate::storage::{FixedClock, HistoryStore};

    struct Fixture {
        dir: tempfile::TempDir,
        clock: Arc<FixedClock>,
        service: Arc<QuotaService>,
    }

    fn fixture(items: &[&str], daily_limit: u32, rng: impl rand::RngCore + Send + 'static) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()));
        let quota = Arc::new(
            QuotaStore::open(dir.path().join("user_limits.json"), daily_limit, clock.clone())
                .unwrap(),
        );
        let history = Arc::new(HistoryStore::open(dir.path().join("user_history.json")).unwrap());
        let pool = Arc::new(ContentPool::from_items(items).unwrap());
        let selection = Arc::new(SelectionService::with_rng(pool, history, rng));

        Fixture {
            dir,
            clock,
            service: Arc::new(QuotaService::new(quota, selection, 5)),
        }
    }

    fn drawn(outcome: DrawOutcome) -> Draw {
        match outcome {
            DrawOutcome::Drawn(draw) => draw,
            DrawOutcome::Denied => panic!("expected a draw, got Denied"),
        }
    }

    #[tokio::test]
    async fn test_example_walkthrough() {
        let fx = fixture(&["A", "B", "C"], 2, StdRng::seed_from_u64(11));
        let service = &fx.service;

        let first = drawn(service.try_consume_and_draw("u").await.unwrap());
        let second = drawn(service.try_consume_and_draw("u").await.unwrap());
        assert_ne!(first.item, second.item);
        assert_eq!(first.remaining, 1);
        assert_eq!(second.remaining, 0);

        assert_eq!(
            service.try_consume_and_draw("u").await.unwrap(),
            DrawOutcome::Denied
        );

        assert_eq!(service.credit("u", 5).await.unwrap(), 5);

        // Third draw completes the cycle with the one unseen item.
        let third = drawn(service.try_consume_and_draw("u").await.unwrap());
        let items: HashSet<_> = [first.item, second.item, third.item].into_iter().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(third.remaining, 4);

        // Fourth draw starts a new cycle.
        drawn(service.try_consume_and_draw("u").await.unwrap());
        assert_eq!(
            service.selection.history().seen_set("u").await.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_denied_consumes_nothing() {
        let fx = fixture(&["A", "B"], 1, StepRng::new(0, 0));

        drawn(fx.service.try_consume_and_draw("u").await.unwrap());
        assert_eq!(
            fx.service.try_consume_and_draw("u").await.unwrap(),
            DrawOutcome::Denied
        );
        assert_eq!(fx.service.remaining("u").await.unwrap(), 0);
        assert_eq!(fx.service.selection.history().seen_set("u").await.len(), 1);
    }

    #[tokio::test]
    async fn test_credit_adds_exactly() {
        let fx = fixture(&["A"], 5, StepRng::new(0, 0));

        drawn(fx.service.try_consume_and_draw("u").await.unwrap());
        let before = fx.service.remaining("u").await.unwrap();
        fx.service.credit("u", 5).await.unwrap();
        assert_eq!(fx.service.remaining("u").await.unwrap(), before + 5);
    }

    #[tokio::test]
    async fn test_credit_applies_rollover_first() {
        let fx = fixture(&["A"], 5, StepRng::new(0, 0));

        for _ in 0..5 {
            drawn(fx.service.try_consume_and_draw("u").await.unwrap());
        }
        fx.clock.advance_days(1);
        assert_eq!(fx.service.credit("u", 5).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_draw_after_rollover() {
        let fx = fixture(&["A", "B"], 1, StepRng::new(0, 0));

        drawn(fx.service.try_consume_and_draw("u").await.unwrap());
        assert_eq!(
            fx.service.try_consume_and_draw("u").await.unwrap(),
            DrawOutcome::Denied
        );

        fx.clock.advance_days(1);
        let draw = drawn(fx.service.try_consume_and_draw("u").await.unwrap());
        assert_eq!(draw.item, "B");
        assert_eq!(draw.remaining, 0);
    }

    #[tokio::test]
    async fn test_zero_credit_is_rejected() {
        let fx = fixture(&["A"], 5, StepRng::new(0, 0));
        assert!(matches!(
            fx.service.credit("u", 0).await,
            Err(QuotaError::InvalidCredit)
        ));
        assert_eq!(fx.service.remaining("u").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_credit_purchase_uses_configured_amount() {
        let fx = fixture(&["A"], 5, StepRng::new(0, 0));
        assert_eq!(fx.service.credit_purchase("u").await.unwrap(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_draws_respect_quota() {
        let items: Vec<String> = (0..50).map(|i| format!("item-{i}")).collect();
        let refs: Vec<&str> = items.iter().map(String::as_str).collect();
        let fx = fixture(&refs, 3, StdRng::seed_from_u64(5));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let service = Arc::clone(&fx.service);
                tokio::spawn(async move { service.try_consume_and_draw("u").await.unwrap() })
            })
            .collect();

        let mut successes = Vec::new();
        let mut denied = 0;
        for handle in handles {
            match handle.await.unwrap() {
                DrawOutcome::Drawn(draw) => successes.push(draw),
                DrawOutcome::Denied => denied += 1,
            }
        }

        assert_eq!(successes.len(), 3);
        assert_eq!(denied, 9);
        assert_eq!(fx.service.remaining("u").await.unwrap(), 0);

        let mut remaining: Vec<u32> = successes.iter().map(|d| d.remaining).collect();
        remaining.sort_unstable();
        assert_eq!(remaining, [0, 1, 2]);

        let distinct: HashSet<_> = successes.iter().map(|d| d.item.clone()).collect();
        assert_eq!(distinct.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_charge_returns_item_to_cycle() {
        let fx = fixture(&["A", "B"], 5, StepRng::new(0, 0));
        assert_eq!(fx.service.remaining("u").await.unwrap(), 5);

        // Only the quota flush can fail now; the history record still writes.
        let blocker = fx.dir.path().join("user_limits.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        let result = fx.service.try_consume_and_draw("u").await;
        assert!(matches!(
            result,
            Err(QuotaError::Storage(StorageError::Write { .. }))
        ));
        assert!(fx.service.selection.history().seen_set("u").await.is_empty());

        std::fs::remove_dir(&blocker).unwrap();
        assert_eq!(fx.service.remaining("u").await.unwrap(), 5);

        let draw = drawn(fx.service.try_consume_and_draw("u").await.unwrap());
        assert_eq!(draw.item, "A");
        assert_eq!(draw.remaining, 4);
    }

    #[tokio::test]
    async fn test_user_locks_are_released() {
        let fx = fixture(&["A", "B"], 1, StepRng::new(0, 0));

        drawn(fx.service.try_consume_and_draw("u").await.unwrap());
        assert_eq!(
            fx.service.try_consume_and_draw("u").await.unwrap(),
            DrawOutcome::Denied
        );
        fx.service.credit("v", 3).await.unwrap();
        assert!(fx.service.credit("w", 0).await.is_err());

        assert!(fx.service.user_locks.lock().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_user_locks_are_released_after_contention() {
        let fx = fixture(&["A", "B", "C"], 2, StdRng::seed_from_u64(9));

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let service = Arc::clone(&fx.service);
                let user = format!("user-{}", i % 4);
                tokio::spawn(async move { service.try_consume_and_draw(&user).await.unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(fx.service.user_locks.lock().await.is_empty());
        for i in 0..4 {
            let user = format!("user-{i}");
            assert_eq!(fx.service.remaining(&user).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_remaining_never_negative() {
        let fx = fixture(&["A", "B"], 2, StepRng::new(0, 0));
        for _ in 0..6 {
            let _ = fx.service.try_consume_and_draw("u").await.unwrap();
            assert!(fx.service.remaining("u").await.unwrap() <= 2);
        }
        assert_eq!(fx.service.remaining("u").await.unwrap(), 0);
    }
}
